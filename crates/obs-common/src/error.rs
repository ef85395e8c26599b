//! Error types for shared observation handling.

use thiserror::Error;

/// Result type alias using ObsError.
pub type ObsResult<T> = Result<T, ObsError>;

/// Errors raised while decoding labels, timestamps and dump records.
#[derive(Debug, Error)]
pub enum ObsError {
    // === Label Errors ===
    #[error("Invalid label filename '{name}': {reason}")]
    InvalidFilename { name: String, reason: String },

    #[error("Invalid integer '{value}' for label field '{field}'")]
    InvalidLabelField { field: &'static str, value: String },

    // === Record Errors ===
    #[error("Invalid timestamp: {0}")]
    InvalidTime(String),

    #[error("Invalid number '{value}' in column '{column}'")]
    InvalidNumber { column: &'static str, value: String },

    #[error("Record has {found} fields, expected at least {expected}")]
    MissingFields { expected: usize, found: usize },

    #[error("Invalid flag string '{0}': expected 16 hexadecimal characters")]
    InvalidFlag(String),

    #[error("Invalid row count line '{0}'")]
    InvalidCount(String),

    // === Configuration Errors ===
    #[error("Invalid ISO-8601 period: {0}")]
    InvalidPeriod(String),

    // === I/O Errors ===
    #[error("Failed to read or write dump file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
