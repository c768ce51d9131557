//! Postgres-backed [`PollStore`](crate::dao::poll_store::PollStore).

mod error;
pub mod store;

pub use error::PgDaoError;
pub use store::PostgresPollStore;

use crate::dao::storage::StorageError;

impl From<PgDaoError> for StorageError {
    fn from(err: PgDaoError) -> Self {
        if err.is_unique_violation() {
            return StorageError::Duplicate(err.to_string());
        }
        StorageError::unavailable(err.to_string(), err)
    }
}
