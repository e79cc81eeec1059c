//! Error types for aeroguard-store.

use std::path::PathBuf;

/// Result type for aeroguard-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in aeroguard-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV encoding or decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to create the storage directory.
    #[error("Failed to create storage directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored timestamp could not be decoded.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Stored data is present but not a valid history record.
    #[error("Corrupt history data: {0}")]
    Corrupt(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
