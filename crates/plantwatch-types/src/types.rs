//! Core data types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

/// One environmental measurement as delivered by the sensor device.
///
/// The wire format carries no id and no timestamp; a timestamp is assigned
/// by the store at persistence time. Unknown fields in the device response
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Air temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Light level (raw sensor units).
    pub light: i32,
    /// Soil moisture (raw sensor units).
    pub soil: i32,
}

/// The dimension an alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    Temperature,
    Humidity,
    Light,
    Soil,
}

impl AlertKind {
    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Temperature => "temperature",
            AlertKind::Humidity => "humidity",
            AlertKind::Light => "light",
            AlertKind::Soil => "soil",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single recorded threshold breach.
///
/// Alert records are appended to [`MonitoringState::alert_history`] whether
/// or not a notification was emitted for them; history is exhaustive,
/// notifications are rate-limited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// When the breach was observed.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Which dimension breached.
    pub kind: AlertKind,
    /// Short description, e.g. "temperature too high".
    pub message: String,
    /// The offending value with its threshold, e.g. "31.5°C (threshold: 29°C)".
    pub value: String,
}

impl AlertRecord {
    /// One-line summary in `MM-DD HH:MM - message: value` form.
    pub fn summary(&self) -> String {
        let fmt = format_description!("[month]-[day] [hour]:[minute]");
        let when = self
            .timestamp
            .format(fmt)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());
        format!("{} - {}: {}", when, self.message, self.value)
    }
}

/// Configured alert boundaries.
///
/// Temperature alerts fire when the reading rises *above* the threshold,
/// light alerts when it falls *below*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Upper bound for temperature in degrees Celsius.
    pub temperature: i32,
    /// Lower bound for light level.
    pub light: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature: 29,
            light: 100,
        }
    }
}

impl Thresholds {
    /// Whether a temperature value breaches the upper bound.
    pub fn temperature_breached(&self, value: f64) -> bool {
        value > self.temperature as f64
    }

    /// Whether a light value breaches the lower bound.
    pub fn light_breached(&self, value: i32) -> bool {
        value < self.light
    }
}

/// A daily window during which breaches are recorded but never notified.
///
/// When `start_hour > end_hour` the window wraps across midnight
/// (e.g. 22:00 - 07:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    /// First quiet hour, 0-23.
    pub start_hour: u8,
    /// First hour after the quiet window, 0-23.
    pub end_hour: u8,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start_hour: 22,
            end_hour: 7,
        }
    }
}

impl QuietHours {
    /// Whether the given local hour falls inside the quiet window.
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour > self.end_hour {
            hour >= self.start_hour || hour < self.end_hour
        } else {
            hour >= self.start_hour && hour < self.end_hour
        }
    }
}

/// Maximum number of alert records retained in memory; oldest dropped first.
pub const MAX_ALERT_HISTORY: usize = 50;

/// The threshold monitor's observable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringState {
    /// Global on/off switch for breach checking.
    pub enabled: bool,
    /// Configured alert boundaries.
    pub thresholds: Thresholds,
    /// Window during which notifications are suppressed.
    pub quiet_hours: QuietHours,
    /// Minimum minutes between two notifications of the same kind.
    pub cooldown_minutes: u64,
    /// The most recent alert records, capped at [`MAX_ALERT_HISTORY`].
    pub alert_history: Vec<AlertRecord>,
}

impl Default for MonitoringState {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: Thresholds::default(),
            quiet_hours: QuietHours::default(),
            cooldown_minutes: 5,
            alert_history: Vec::new(),
        }
    }
}

impl MonitoringState {
    /// Append alert records, keeping only the newest [`MAX_ALERT_HISTORY`].
    pub fn record_alerts(&mut self, alerts: impl IntoIterator<Item = AlertRecord>) {
        self.alert_history.extend(alerts);
        if self.alert_history.len() > MAX_ALERT_HISTORY {
            let excess = self.alert_history.len() - MAX_ALERT_HISTORY;
            self.alert_history.drain(..excess);
        }
    }

    /// Number of alerts recorded at or after `since`.
    pub fn alerts_since(&self, since: OffsetDateTime) -> usize {
        self.alert_history
            .iter()
            .filter(|a| a.timestamp >= since)
            .count()
    }
}
