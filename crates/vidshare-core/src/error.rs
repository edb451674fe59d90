//! Error types module
//!
//! `AppError` is the error type of the record store. The `Database` variant and
//! `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::VideoStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            AppError::Database(err) => !matches!(
                err,
                SqlxError::RowNotFound | SqlxError::ColumnDecode { .. } | SqlxError::TypeNotFound { .. }
            ),
            #[cfg(not(feature = "sqlx"))]
            AppError::Database(_) => true,
            AppError::Internal(_) => true,
            AppError::NotFound(_) | AppError::InvalidTransition { .. } | AppError::InvalidInput(_) => {
                false
            }
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_error_names_both_states() {
        let err = AppError::InvalidTransition {
            from: VideoStatus::HlsEncodingCompleted,
            to: VideoStatus::ThumbnailGenerated,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition: HLS_ENCODING_COMPLETED -> THUMBNAIL_GENERATED"
        );
        assert!(!err.is_recoverable());
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn pool_errors_are_recoverable() {
        assert!(AppError::from(SqlxError::PoolTimedOut).is_recoverable());
        assert!(!AppError::from(SqlxError::RowNotFound).is_recoverable());
    }
}
