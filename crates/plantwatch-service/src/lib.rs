//! Polling service, threshold monitoring and cleanup for plantwatch.
//!
//! This crate glues the device client and the store into a running
//! session:
//!
//! - [`config`]: TOML configuration with validation and platform paths
//! - [`repository`]: shared data access over the client and the store
//! - [`monitor`]: threshold checks, quiet hours, cooldown, alert history
//! - [`coordinator`]: display and snapshot polling loops
//! - [`cleanup`]: retention purges on a persistent schedule
//! - [`notify`]: notification delivery seam

pub mod cleanup;
pub mod config;
pub mod coordinator;
pub mod monitor;
pub mod notify;
pub mod repository;

pub use cleanup::{CleanupPreview, CleanupReport, CleanupTask};
pub use config::{Config, ConfigError};
pub use coordinator::{Coordinator, DisplayState};
pub use monitor::SensorMonitor;
pub use notify::{LogNotifier, Notifier};
pub use repository::Repository;
