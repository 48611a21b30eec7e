//! Platform-agnostic types for plantwatch environmental monitoring.
//!
//! This crate defines the data model shared by every other plantwatch crate:
//! the [`Reading`] delivered by a sensor device, the [`Thresholds`] and
//! [`QuietHours`] that configure alerting, and the [`AlertRecord`] /
//! [`MonitoringState`] pair that the threshold monitor maintains.
//!
//! # Example
//!
//! ```
//! use plantwatch_types::{QuietHours, Reading, Thresholds};
//!
//! let reading = Reading {
//!     temperature: 31.5,
//!     humidity: 48.0,
//!     light: 75,
//!     soil: 2100,
//! };
//!
//! let thresholds = Thresholds::default();
//! assert!(thresholds.temperature_breached(reading.temperature));
//! assert!(thresholds.light_breached(reading.light));
//!
//! // 22:00 - 07:00 wraps across midnight
//! let quiet = QuietHours::default();
//! assert!(quiet.contains(23));
//! assert!(!quiet.contains(12));
//! ```

mod types;

pub use types::{
    AlertKind, AlertRecord, MAX_ALERT_HISTORY, MonitoringState, QuietHours, Reading, Thresholds,
};
