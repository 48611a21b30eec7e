//! Service configuration.
//!
//! Settings live in `~/.config/plantwatch/config.toml`, grouped per
//! concern. Monitor settings (thresholds, quiet hours, cooldown) are kept
//! in their own file by [`crate::monitor`] so that alerting configuration
//! can change without touching the polling setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor device settings.
    pub device: DeviceConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Polling and auto-save settings.
    pub polling: PollingConfig,
    /// Retention cleanup settings.
    pub cleanup: CleanupConfig,
}

impl Config {
    /// Load configuration from the default path, or defaults if absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.device.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.polling.validate());
        errors.extend(self.cleanup.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Sensor device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base URL of the sensor device, e.g. "http://192.168.4.1".
    pub base_url: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.4.1".to_string(),
        }
    }
}

impl DeviceConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.base_url.is_empty() {
            errors.push(ValidationError {
                field: "device.base_url".to_string(),
                message: "base URL cannot be empty".to_string(),
            });
        } else if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            errors.push(ValidationError {
                field: "device.base_url".to_string(),
                message: format!(
                    "base URL '{}' must start with http:// or https://",
                    self.base_url
                ),
            });
        }

        errors
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Directory CSV exports are written to.
    pub export_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: plantwatch_store::default_db_path(),
            export_dir: plantwatch_store::default_export_dir(),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }
        if self.export_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.export_dir".to_string(),
                message: "export directory cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Minimum display update interval in seconds.
pub const MIN_UPDATE_INTERVAL: u64 = 1;
/// Maximum display update interval in seconds (1 hour).
pub const MAX_UPDATE_INTERVAL: u64 = 3600;
/// Minimum auto-save interval in minutes.
pub const MIN_AUTO_SAVE_INTERVAL: u64 = 1;
/// Maximum auto-save interval in minutes.
pub const MAX_AUTO_SAVE_INTERVAL: u64 = 60;

/// Polling and auto-save settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Display refresh interval in seconds.
    pub update_interval_secs: u64,
    /// Whether the periodic snapshot task runs.
    pub auto_save: bool,
    /// Snapshot interval in minutes.
    pub auto_save_interval_minutes: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 2,
            auto_save: true,
            auto_save_interval_minutes: 1,
        }
    }
}

impl PollingConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(MIN_UPDATE_INTERVAL..=MAX_UPDATE_INTERVAL).contains(&self.update_interval_secs) {
            errors.push(ValidationError {
                field: "polling.update_interval_secs".to_string(),
                message: format!(
                    "update interval {} is out of range ({}-{} seconds)",
                    self.update_interval_secs, MIN_UPDATE_INTERVAL, MAX_UPDATE_INTERVAL
                ),
            });
        }

        if !(MIN_AUTO_SAVE_INTERVAL..=MAX_AUTO_SAVE_INTERVAL)
            .contains(&self.auto_save_interval_minutes)
        {
            errors.push(ValidationError {
                field: "polling.auto_save_interval_minutes".to_string(),
                message: format!(
                    "auto-save interval {} is out of range ({}-{} minutes)",
                    self.auto_save_interval_minutes, MIN_AUTO_SAVE_INTERVAL, MAX_AUTO_SAVE_INTERVAL
                ),
            });
        }

        errors
    }
}

/// Retention cleanup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Whether the background cleanup task runs.
    pub enabled: bool,
    /// Readings older than this many days are purged.
    pub retention_days: u32,
    /// Days between cleanup runs.
    pub interval_days: u32,
    /// Hours between "is a cleanup due" checks.
    pub check_interval_hours: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 30,
            interval_days: 30,
            check_interval_hours: 6,
        }
    }
}

impl CleanupConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.retention_days == 0 {
            errors.push(ValidationError {
                field: "cleanup.retention_days".to_string(),
                message: "retention must be at least 1 day".to_string(),
            });
        }
        if self.interval_days == 0 {
            errors.push(ValidationError {
                field: "cleanup.interval_days".to_string(),
                message: "cleanup interval must be at least 1 day".to_string(),
            });
        }
        if self.check_interval_hours == 0 {
            errors.push(ValidationError {
                field: "cleanup.check_interval_hours".to_string(),
                message: "check interval must be at least 1 hour".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path, e.g. `polling.update_interval_secs`.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default monitor settings file path.
pub fn default_monitor_settings_path() -> PathBuf {
    config_dir().join("monitor.toml")
}

/// Default path of the cleanup last-run marker.
pub fn default_cleanup_marker_path() -> PathBuf {
    config_dir().join("last_cleanup")
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plantwatch")
}
