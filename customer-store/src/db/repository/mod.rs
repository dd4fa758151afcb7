//! Repository Module
//!
//! Typed record stores on top of [`DocumentBackend`](crate::db::backend::DocumentBackend).

pub mod customer;

pub use customer::{CustomerPage, CustomerRepository, PageCursor};

use crate::db::backend::BackendError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
}

impl From<BackendError> for RepoError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { collection, id } => {
                RepoError::NotFound(format!("{collection}/{id}"))
            }
            BackendError::Unavailable(msg) => RepoError::Unavailable(msg),
            other => RepoError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        RepoError::Database(format!("Malformed document: {err}"))
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(resource) => AppError::not_found(resource),
            RepoError::Database(msg) => AppError::database(msg),
            RepoError::Unavailable(msg) => AppError::with_message(ErrorCode::BackendUnavailable, msg),
            RepoError::InvalidCursor(msg) => AppError::with_message(ErrorCode::InvalidCursor, msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_mapping() {
        let err: RepoError = BackendError::not_found("customers", "a1").into();
        assert!(matches!(err, RepoError::NotFound(ref s) if s == "customers/a1"));
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::NotFound);
        assert_eq!(app.message, "customers/a1 not found");
        assert!(!app.is_retryable());

        let err: RepoError = BackendError::Unavailable("offline".into()).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::BackendUnavailable);
        assert!(app.is_retryable());

        let err: RepoError = BackendError::Aborted("conflict".into()).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
    }
}
