//! Error types for the migration crate.

use chrono::{DateTime, Utc};
use thiserror::Error;

use obs_common::ObsError;
use storage::StorageError;

/// Errors that can occur while dumping or importing.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to read or write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Record(#[from] ObsError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Conversion failed for observation at {obstime}: {message}")]
    Conversion {
        obstime: DateTime<Utc>,
        message: String,
    },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Invalid product offsets: {0}")]
    InvalidOffsets(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
