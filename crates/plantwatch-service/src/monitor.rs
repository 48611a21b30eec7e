//! Threshold monitor.
//!
//! [`SensorMonitor`] evaluates each incoming reading against the
//! configured thresholds and decides, per alert kind, whether to emit a
//! notification. Two rules gate emission without affecting history:
//!
//! - **Quiet hours** suppress everything, including history recording.
//! - **Cooldown** suppresses only the notification; the breach is still
//!   appended to the alert history. History is exhaustive, notifications
//!   are rate-limited.
//!
//! The monitor is an explicitly-owned, single-writer state holder.
//! Observers subscribe to a `watch` channel; settings mutations are
//! mirrored synchronously to a TOML settings file when one is configured.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, UtcOffset};
use tokio::sync::watch;
use tracing::{debug, warn};

use plantwatch_types::{AlertKind, AlertRecord, MonitoringState, QuietHours, Reading, Thresholds};

use crate::notify::Notifier;

/// Durable monitor settings, mirrored to `monitor.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub enabled: bool,
    pub thresholds: Thresholds,
    pub quiet_hours: QuietHours,
    pub cooldown_minutes: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let state = MonitoringState::default();
        Self {
            enabled: state.enabled,
            thresholds: state.thresholds,
            quiet_hours: state.quiet_hours,
            cooldown_minutes: state.cooldown_minutes,
        }
    }
}

/// Evaluates readings against thresholds and emits rate-limited alerts.
pub struct SensorMonitor {
    state_tx: watch::Sender<MonitoringState>,
    last_notified: HashMap<AlertKind, OffsetDateTime>,
    notifier: Box<dyn Notifier>,
    settings_path: Option<PathBuf>,
}

impl SensorMonitor {
    /// Create a monitor with default settings and no persistence.
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        let (state_tx, _) = watch::channel(MonitoringState::default());
        Self {
            state_tx,
            last_notified: HashMap::new(),
            notifier,
            settings_path: None,
        }
    }

    /// Create a monitor whose settings are loaded from and mirrored to
    /// the given TOML file.
    pub fn with_settings_file(notifier: Box<dyn Notifier>, path: PathBuf) -> Self {
        let settings = load_settings(&path);
        let state = MonitoringState {
            enabled: settings.enabled,
            thresholds: settings.thresholds,
            quiet_hours: settings.quiet_hours,
            cooldown_minutes: settings.cooldown_minutes,
            alert_history: Vec::new(),
        };
        let (state_tx, _) = watch::channel(state);
        Self {
            state_tx,
            last_notified: HashMap::new(),
            notifier,
            settings_path: Some(path),
        }
    }

    /// Subscribe to monitoring state changes.
    pub fn subscribe(&self) -> watch::Receiver<MonitoringState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> MonitoringState {
        self.state_tx.borrow().clone()
    }

    /// Evaluate a reading at the current local time.
    pub fn check_reading(&mut self, reading: &Reading) -> Vec<AlertRecord> {
        self.check_reading_at(reading, now_local())
    }

    /// Evaluate a reading as of `now`.
    ///
    /// Returns the alert records produced (possibly empty). `now` must be
    /// in the timezone whose hour the quiet-hours window refers to.
    pub fn check_reading_at(&mut self, reading: &Reading, now: OffsetDateTime) -> Vec<AlertRecord> {
        let state = self.state_tx.borrow().clone();

        if !state.enabled || state.quiet_hours.contains(now.hour()) {
            return Vec::new();
        }

        let mut alerts = Vec::new();

        if state.thresholds.temperature_breached(reading.temperature) {
            alerts.push(AlertRecord {
                timestamp: now,
                kind: AlertKind::Temperature,
                message: "temperature too high".to_string(),
                value: format!(
                    "{:.1}°C (threshold: {}°C)",
                    reading.temperature, state.thresholds.temperature
                ),
            });
        }

        if state.thresholds.light_breached(reading.light) {
            alerts.push(AlertRecord {
                timestamp: now,
                kind: AlertKind::Light,
                message: "light too low".to_string(),
                value: format!("{} (threshold: {})", reading.light, state.thresholds.light),
            });
        }

        if alerts.is_empty() {
            return alerts;
        }

        let cooldown = Duration::minutes(state.cooldown_minutes as i64);
        for alert in &alerts {
            let within_cooldown = self
                .last_notified
                .get(&alert.kind)
                .is_some_and(|last| now - *last <= cooldown);

            if within_cooldown {
                debug!(kind = %alert.kind, "breach within cooldown, notification suppressed");
                continue;
            }

            let (title, body) = notification_text(alert.kind, reading);
            self.notifier.notify(alert.kind, &title, &body);
            self.last_notified.insert(alert.kind, now);
        }

        self.state_tx
            .send_modify(|s| s.record_alerts(alerts.iter().cloned()));

        alerts
    }

    /// Enable or disable breach checking.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state_tx.send_modify(|s| s.enabled = enabled);
        self.persist();
    }

    /// Update alert thresholds; effective on the next check.
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.state_tx.send_modify(|s| s.thresholds = thresholds);
        self.persist();
    }

    /// Update the quiet-hours window; effective on the next check.
    pub fn set_quiet_hours(&mut self, quiet_hours: QuietHours) {
        self.state_tx.send_modify(|s| s.quiet_hours = quiet_hours);
        self.persist();
    }

    /// Update the per-kind notification cooldown.
    pub fn set_cooldown_minutes(&mut self, minutes: u64) {
        self.state_tx.send_modify(|s| s.cooldown_minutes = minutes);
        self.persist();
    }

    /// Drop all alert records.
    pub fn clear_alert_history(&mut self) {
        self.state_tx.send_modify(|s| s.alert_history.clear());
    }

    /// One summary line per recorded alert, oldest first.
    pub fn formatted_history(&self) -> Vec<String> {
        self.state_tx
            .borrow()
            .alert_history
            .iter()
            .map(|a| a.summary())
            .collect()
    }

    fn persist(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };

        let state = self.state_tx.borrow();
        let settings = MonitorSettings {
            enabled: state.enabled,
            thresholds: state.thresholds,
            quiet_hours: state.quiet_hours,
            cooldown_minutes: state.cooldown_minutes,
        };
        drop(state);

        if let Err(e) = write_settings(path, &settings) {
            warn!("Failed to persist monitor settings to {}: {}", path.display(), e);
        }
    }
}

fn notification_text(kind: AlertKind, reading: &Reading) -> (String, String) {
    match kind {
        AlertKind::Temperature => (
            "High temperature warning".to_string(),
            format!(
                "Current temperature: {:.1}°C, consider cooling the environment",
                reading.temperature
            ),
        ),
        AlertKind::Light => (
            "Low light warning".to_string(),
            format!(
                "Current light level: {}, consider supplemental lighting",
                reading.light
            ),
        ),
        AlertKind::Humidity => (
            "Humidity warning".to_string(),
            format!("Current humidity: {:.1}%", reading.humidity),
        ),
        AlertKind::Soil => (
            "Soil moisture warning".to_string(),
            format!("Current soil moisture: {}", reading.soil),
        ),
    }
}

fn load_settings(path: &PathBuf) -> MonitorSettings {
    if !path.exists() {
        return MonitorSettings::default();
    }
    match std::fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|content| {
        toml::from_str::<MonitorSettings>(&content).map_err(|e| e.to_string())
    }) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Failed to load monitor settings from {}: {}", path.display(), e);
            MonitorSettings::default()
        }
    }
}

fn write_settings(path: &PathBuf, settings: &MonitorSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(settings)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, content)
}

fn now_local() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    match UtcOffset::current_local_offset() {
        Ok(offset) => now.to_offset(offset),
        Err(_) => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use time::macros::datetime;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<AlertKind>>,
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier(Arc<Recorder>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, kind: AlertKind, _title: &str, _body: &str) {
            self.0.sent.lock().unwrap().push(kind);
        }
    }

    fn monitor_with_recorder() -> (SensorMonitor, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let monitor = SensorMonitor::new(Box::new(notifier.clone()));
        (monitor, notifier)
    }

    fn breaching_reading() -> Reading {
        // Breaches both defaults: temp > 29, light < 100
        Reading {
            temperature: 35.0,
            humidity: 50.0,
            light: 50,
            soil: 1800,
        }
    }

    fn normal_reading() -> Reading {
        Reading {
            temperature: 22.0,
            humidity: 50.0,
            light: 500,
            soil: 1800,
        }
    }

    #[test]
    fn breach_records_alerts_and_notifies() {
        let (mut monitor, notifier) = monitor_with_recorder();
        let at_1400 = datetime!(2025-06-01 14:00:00 UTC);

        let alerts = monitor.check_reading_at(&breaching_reading(), at_1400);

        assert_eq!(alerts.len(), 2);
        let state = monitor.state();
        assert_eq!(state.alert_history.len(), 2);
        assert_eq!(
            *notifier.0.sent.lock().unwrap(),
            vec![AlertKind::Temperature, AlertKind::Light]
        );
    }

    #[test]
    fn repeat_breach_within_cooldown_records_but_does_not_notify() {
        let (mut monitor, notifier) = monitor_with_recorder();

        monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 14:00:00 UTC));
        monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 14:02:00 UTC));

        // History grows, notifications do not
        assert_eq!(monitor.state().alert_history.len(), 4);
        assert_eq!(notifier.0.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn breach_after_cooldown_notifies_again() {
        let (mut monitor, notifier) = monitor_with_recorder();

        monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 14:00:00 UTC));
        monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 14:06:00 UTC));

        assert_eq!(notifier.0.sent.lock().unwrap().len(), 4);
    }

    #[test]
    fn cooldown_is_tracked_per_kind() {
        let (mut monitor, notifier) = monitor_with_recorder();

        // Temperature-only breach at 14:00
        let mut hot = normal_reading();
        hot.temperature = 35.0;
        monitor.check_reading_at(&hot, datetime!(2025-06-01 14:00:00 UTC));

        // Light-only breach two minutes later still notifies: its kind
        // has no cooldown running
        let mut dark = normal_reading();
        dark.light = 10;
        monitor.check_reading_at(&dark, datetime!(2025-06-01 14:02:00 UTC));

        assert_eq!(
            *notifier.0.sent.lock().unwrap(),
            vec![AlertKind::Temperature, AlertKind::Light]
        );
    }

    #[test]
    fn quiet_hours_suppress_history_and_notifications() {
        let (mut monitor, notifier) = monitor_with_recorder();

        let alerts =
            monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 23:00:00 UTC));

        assert!(alerts.is_empty());
        assert!(monitor.state().alert_history.is_empty());
        assert!(notifier.0.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn disabled_monitor_does_nothing() {
        let (mut monitor, notifier) = monitor_with_recorder();
        monitor.set_enabled(false);

        let alerts =
            monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 14:00:00 UTC));

        assert!(alerts.is_empty());
        assert!(monitor.state().alert_history.is_empty());
        assert!(notifier.0.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn normal_reading_produces_nothing() {
        let (mut monitor, notifier) = monitor_with_recorder();

        let alerts =
            monitor.check_reading_at(&normal_reading(), datetime!(2025-06-01 14:00:00 UTC));

        assert!(alerts.is_empty());
        assert!(notifier.0.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn history_never_exceeds_cap() {
        let (mut monitor, _) = monitor_with_recorder();
        let base = datetime!(2025-06-01 08:00:00 UTC);

        for i in 0..100 {
            monitor.check_reading_at(&breaching_reading(), base + Duration::minutes(i));
            assert!(monitor.state().alert_history.len() <= plantwatch_types::MAX_ALERT_HISTORY);
        }

        assert_eq!(
            monitor.state().alert_history.len(),
            plantwatch_types::MAX_ALERT_HISTORY
        );
    }

    #[test]
    fn threshold_updates_take_effect_on_next_check() {
        let (mut monitor, notifier) = monitor_with_recorder();

        // 25°C does not breach the default 29°C bound
        let mut mild = normal_reading();
        mild.temperature = 25.0;
        monitor.check_reading_at(&mild, datetime!(2025-06-01 14:00:00 UTC));
        assert!(notifier.0.sent.lock().unwrap().is_empty());

        monitor.set_thresholds(Thresholds {
            temperature: 20,
            light: 100,
        });
        monitor.check_reading_at(&mild, datetime!(2025-06-01 14:01:00 UTC));
        assert_eq!(
            *notifier.0.sent.lock().unwrap(),
            vec![AlertKind::Temperature]
        );
    }

    #[test]
    fn clear_alert_history_empties_state() {
        let (mut monitor, _) = monitor_with_recorder();
        monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 14:00:00 UTC));
        assert!(!monitor.state().alert_history.is_empty());

        monitor.clear_alert_history();
        assert!(monitor.state().alert_history.is_empty());
    }

    #[test]
    fn settings_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");

        {
            let notifier = RecordingNotifier::default();
            let mut monitor =
                SensorMonitor::with_settings_file(Box::new(notifier), path.clone());
            monitor.set_thresholds(Thresholds {
                temperature: 31,
                light: 250,
            });
            monitor.set_quiet_hours(QuietHours {
                start_hour: 21,
                end_hour: 8,
            });
            monitor.set_cooldown_minutes(10);
            monitor.set_enabled(false);
        }

        let notifier = RecordingNotifier::default();
        let monitor = SensorMonitor::with_settings_file(Box::new(notifier), path);
        let state = monitor.state();
        assert_eq!(state.thresholds.temperature, 31);
        assert_eq!(state.thresholds.light, 250);
        assert_eq!(state.quiet_hours.start_hour, 21);
        assert_eq!(state.cooldown_minutes, 10);
        assert!(!state.enabled);
    }

    #[test]
    fn corrupt_settings_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "not { valid toml").unwrap();

        let notifier = RecordingNotifier::default();
        let monitor = SensorMonitor::with_settings_file(Box::new(notifier), path);
        assert_eq!(monitor.state().thresholds, Thresholds::default());
    }

    #[test]
    fn subscriber_sees_alert_updates() {
        let (mut monitor, _) = monitor_with_recorder();
        let rx = monitor.subscribe();

        monitor.check_reading_at(&breaching_reading(), datetime!(2025-06-01 14:00:00 UTC));

        assert_eq!(rx.borrow().alert_history.len(), 2);
    }
}
