//! Local data persistence for plantwatch sensor readings.
//!
//! This crate provides SQLite-based storage for timestamped readings,
//! enabling history queries, retention cleanup, and CSV export.
//!
//! # Features
//!
//! - Store readings with timestamps assigned at persistence time
//! - Query by time range, with pagination and ordering
//! - Purge by age or wholesale, with row counts reported
//! - Statistics (totals, time span, duplicates) and windowed averages
//! - CSV export with export-file pruning
//!
//! # Example
//!
//! ```
//! use plantwatch_store::{ReadingQuery, Store};
//! use plantwatch_types::Reading;
//!
//! let store = Store::open_in_memory()?;
//! store.insert_reading(&Reading {
//!     temperature: 24.0,
//!     humidity: 55.0,
//!     light: 420,
//!     soil: 1900,
//! })?;
//!
//! let recent = store.query_readings(&ReadingQuery::new().limit(10))?;
//! assert_eq!(recent.len(), 1);
//! # Ok::<(), plantwatch_store::Error>(())
//! ```

mod error;
mod export;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use export::{DEFAULT_EXPORTS_KEPT, ExportSummary, export_csv, prune_exports, summarize};
pub use models::{Averages, Statistics, StoredReading};
pub use queries::ReadingQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/plantwatch/data.db`
/// - macOS: `~/Library/Application Support/plantwatch/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\plantwatch\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("plantwatch")
        .join("data.db")
}

/// Default directory for CSV exports.
pub fn default_export_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("plantwatch")
        .join("exports")
}
