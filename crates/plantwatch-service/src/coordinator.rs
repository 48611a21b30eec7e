//! Polling coordinator.
//!
//! [`Coordinator`] owns the two background loops of a running session:
//!
//! - the **display loop** refreshes the live reading every few seconds
//!   and feeds it to the threshold monitor (no persistence),
//! - the **save loop** persists a snapshot of the latest displayed
//!   reading on a longer interval.
//!
//! Fetches are deduplicated with a `try_lock` gate: if a poll fires
//! while the previous fetch is still in flight, the new one is dropped
//! rather than queued. Fetch errors are surfaced on the display only
//! until the first reading arrives; after that the last good reading
//! stays up and later failures are logged but not shown.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use plantwatch_types::Reading;

use crate::config::PollingConfig;
use crate::monitor::SensorMonitor;
use crate::repository::Repository;

/// Everything a live display needs to render one frame.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    /// Most recent successfully fetched reading.
    pub reading: Option<Reading>,
    /// When `reading` was fetched.
    pub last_update: Option<OffsetDateTime>,
    /// When a snapshot was last persisted.
    pub last_save: Option<OffsetDateTime>,
    /// Snapshots persisted this session.
    pub save_count: u64,
    /// Fetch error to show, if no reading has ever arrived.
    pub error: Option<String>,
    /// Alerts recorded in the last hour.
    pub recent_alert_count: usize,
    /// Whether the latest reading breached a threshold.
    pub has_active_alerts: bool,
}

/// Drives the display and snapshot loops for one device session.
pub struct Coordinator {
    repository: Arc<Repository>,
    monitor: Arc<Mutex<SensorMonitor>>,
    display_tx: watch::Sender<DisplayState>,
    fetch_gate: Mutex<()>,
    stop_tx: watch::Sender<bool>,
    polling_tx: watch::Sender<PollingConfig>,
}

impl Coordinator {
    pub fn new(
        repository: Arc<Repository>,
        monitor: Arc<Mutex<SensorMonitor>>,
        polling: PollingConfig,
    ) -> Self {
        let (display_tx, _) = watch::channel(DisplayState::default());
        let (stop_tx, _) = watch::channel(false);
        let (polling_tx, _) = watch::channel(polling);
        Self {
            repository,
            monitor,
            display_tx,
            fetch_gate: Mutex::new(()),
            stop_tx,
            polling_tx,
        }
    }

    /// Subscribe to display state updates.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display_tx.subscribe()
    }

    /// Snapshot of the current display state.
    pub fn display_state(&self) -> DisplayState {
        self.display_tx.borrow().clone()
    }

    pub fn monitor(&self) -> Arc<Mutex<SensorMonitor>> {
        Arc::clone(&self.monitor)
    }

    pub fn repository(&self) -> Arc<Repository> {
        Arc::clone(&self.repository)
    }

    /// Current polling configuration.
    pub fn polling(&self) -> PollingConfig {
        self.polling_tx.borrow().clone()
    }

    /// Spawn the display and snapshot loops.
    pub fn start(self: &Arc<Self>) {
        let polling = self.polling();

        let coordinator = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        let period = std::time::Duration::from_secs(polling.update_interval_secs.max(1));
        tokio::spawn(async move {
            coordinator.initial_load().await;

            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; the initial load
            // already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => coordinator.display_tick().await,
                    _ = stop_rx.changed() => {
                        info!("Display loop stopping");
                        break;
                    }
                }
            }
        });

        if polling.auto_save {
            let coordinator = Arc::clone(self);
            let mut stop_rx = self.stop_tx.subscribe();
            let period =
                std::time::Duration::from_secs(polling.auto_save_interval_minutes.max(1) * 60);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = ticker.tick() => coordinator.save_tick().await,
                        _ = stop_rx.changed() => {
                            info!("Snapshot loop stopping");
                            break;
                        }
                    }
                }
            });
        }
    }

    /// Signal both loops to stop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop the running loops and respawn them with new polling settings.
    ///
    /// Display state (last reading, save counters, alert history) carries
    /// over; only the loop intervals change.
    pub fn restart(self: &Arc<Self>, polling: PollingConfig) {
        info!(
            interval_secs = polling.update_interval_secs,
            auto_save = polling.auto_save,
            "restarting polling loops"
        );
        let _ = self.stop_tx.send(true);
        self.polling_tx.send_replace(polling);
        self.start();
    }

    /// Clear any displayed error and fetch again.
    pub async fn manual_retry(&self) {
        self.display_tx.send_modify(|s| s.error = None);
        self.initial_load().await;
    }

    /// First fetch of a session: persist the reading so history starts
    /// immediately, and surface failure on the display.
    pub async fn initial_load(&self) {
        let Ok(_guard) = self.fetch_gate.try_lock() else {
            debug!("fetch already in flight, skipping initial load");
            return;
        };

        match self.repository.fetch_and_persist().await {
            Ok(reading) => {
                let alerts = self.monitor.lock().await.check_reading(&reading);
                let now = OffsetDateTime::now_utc();
                let recent = self
                    .monitor
                    .lock()
                    .await
                    .state()
                    .alerts_since(now - Duration::hours(1));
                self.display_tx.send_modify(|s| {
                    s.reading = Some(reading);
                    s.last_update = Some(now);
                    s.last_save = Some(now);
                    s.save_count += 1;
                    s.error = None;
                    s.recent_alert_count = recent;
                    s.has_active_alerts = !alerts.is_empty();
                });
            }
            Err(e) => {
                warn!("Initial fetch failed: {}", e);
                // Same policy as the display loop: a session that already
                // has a reading keeps showing it instead of the error.
                if self.display_tx.borrow().reading.is_none() {
                    let message = describe_error(&e);
                    self.display_tx.send_modify(|s| s.error = Some(message));
                }
            }
        }
    }

    /// One display refresh: fetch without persisting, run the monitor,
    /// publish the new state.
    pub async fn display_tick(&self) {
        let Ok(_guard) = self.fetch_gate.try_lock() else {
            debug!("fetch already in flight, skipping tick");
            return;
        };

        match self.repository.fetch_only().await {
            Ok(reading) => {
                let alerts = self.monitor.lock().await.check_reading(&reading);
                let now = OffsetDateTime::now_utc();
                let recent = self
                    .monitor
                    .lock()
                    .await
                    .state()
                    .alerts_since(now - Duration::hours(1));
                self.display_tx.send_modify(|s| {
                    s.reading = Some(reading);
                    s.last_update = Some(now);
                    s.error = None;
                    s.recent_alert_count = recent;
                    s.has_active_alerts = !alerts.is_empty();
                });
            }
            Err(e) => {
                warn!("Fetch failed: {}", e);
                // Keep showing the last good reading; only a session that
                // has never seen one gets the error on screen.
                if self.display_tx.borrow().reading.is_none() {
                    let message = describe_error(&e);
                    self.display_tx.send_modify(|s| s.error = Some(message));
                }
            }
        }
    }

    /// One snapshot: persist the latest displayed reading, if any.
    pub async fn save_tick(&self) {
        let reading = self.display_tx.borrow().reading;
        let Some(reading) = reading else {
            debug!("no reading yet, skipping snapshot");
            return;
        };

        match self.repository.save_snapshot(&reading).await {
            Ok(_) => {
                let now = OffsetDateTime::now_utc();
                self.display_tx.send_modify(|s| {
                    s.last_save = Some(now);
                    s.save_count += 1;
                });
            }
            Err(e) => warn!("Snapshot failed: {}", e),
        }
    }
}

/// Human-readable message for a fetch failure.
pub fn describe_error(error: &plantwatch_client::Error) -> String {
    match error {
        plantwatch_client::Error::NotReachable { source, .. } if source.is_timeout() => {
            "connection timed out - check the network".to_string()
        }
        plantwatch_client::Error::NotReachable { source, .. } if source.is_connect() => {
            "connection refused - check that the device is up".to_string()
        }
        other => format!("network error: {}", other),
    }
}
