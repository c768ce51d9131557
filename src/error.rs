use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
///
/// The vote-time variants carry the exact message shown to clients; internal
/// storage failures are collapsed before they reach a client.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("{0}")]
    Validation(String),
    /// An unexpired active poll already exists.
    #[error("cannot create a new poll while one is active")]
    Conflict,
    /// Requested resource was not found.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The poll is no longer accepting votes.
    #[error("poll has ended")]
    Expired,
    /// The option does not belong to the targeted poll.
    #[error("option does not belong to this poll")]
    InvalidOption,
    /// The student already voted on this poll.
    #[error("you have already voted on this poll")]
    DuplicateVote,
}

impl ServiceError {
    /// Whether the failure is internal (storage) rather than caused by the
    /// request. Internal detail must never reach a client verbatim.
    pub fn is_internal(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_) | ServiceError::Degraded)
    }

    /// Message safe to send to the originating client, with internal
    /// failures collapsed to a generic one.
    pub fn client_message(&self, action: &str) -> String {
        if self.is_internal() {
            error!(error = %self, "failed to {action}");
            format!("failed to {action}")
        } else {
            self.to_string()
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate(_) => ServiceError::DuplicateVote,
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::Validation(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Internal server error with a client-safe message.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Collapse a service error for an HTTP handler, logging internal detail.
    pub fn from_service(err: ServiceError, action: &str) -> Self {
        match err {
            ServiceError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            err if err.is_internal() => AppError::Internal(err.client_message(action)),
            err => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            error: self.to_string(),
        });

        (status, payload).into_response()
    }
}
