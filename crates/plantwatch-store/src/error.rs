//! Error types for plantwatch-store.

use std::path::PathBuf;

/// Result type for plantwatch-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in plantwatch-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create a database or export directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid timestamp stored in the database.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// CSV export error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Timestamp formatting error during export.
    #[error("Time formatting error: {0}")]
    Format(#[from] time::error::Format),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
