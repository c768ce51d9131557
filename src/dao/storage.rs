use std::error::Error as StdError;

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed or is unreachable.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Operation-level description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A uniqueness constraint rejected the write.
    ///
    /// Votes carry a unique index on `(poll_id, student_id)`; this variant is
    /// the authoritative duplicate-vote signal, the service-level pre-check
    /// is only advisory.
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl StdError + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
