//! Error types for database access.

use thiserror::Error;

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    #[error("Connection to {0} timed out")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Bulk insert into {table} failed: {message}")]
    Copy { table: String, message: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
