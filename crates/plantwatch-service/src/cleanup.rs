//! Scheduled data cleanup.
//!
//! [`CleanupTask`] purges readings past the retention window and prunes
//! old CSV exports. The last run is recorded as epoch milliseconds in a
//! marker file, so runs stay spaced across process restarts. A
//! background loop re-checks on a short interval; the marker decides
//! whether a run is actually due.

use std::path::PathBuf;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use plantwatch_store::{DEFAULT_EXPORTS_KEPT, prune_exports};

use crate::config::CleanupConfig;
use crate::repository::Repository;

/// What one cleanup run removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupReport {
    pub purged_rows: usize,
    pub pruned_exports: usize,
}

/// What a cleanup run would remove, without removing it.
#[derive(Debug, Clone, Copy)]
pub struct CleanupPreview {
    pub rows: u64,
    /// Rough on-disk size of those rows.
    pub estimated_bytes: u64,
}

/// Retention cleanup with a persistent last-run marker.
pub struct CleanupTask {
    repository: Arc<Repository>,
    config: CleanupConfig,
    marker_path: PathBuf,
    stop_tx: watch::Sender<bool>,
}

// Approximate bytes per row: four numeric columns plus rowid overhead.
const ESTIMATED_ROW_BYTES: u64 = 60;

impl CleanupTask {
    pub fn new(repository: Arc<Repository>, config: CleanupConfig, marker_path: PathBuf) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            repository,
            config,
            marker_path,
            stop_tx,
        }
    }

    /// Spawn the periodic due-check loop.
    pub fn start(self: &Arc<Self>) {
        if !self.config.enabled {
            debug!("cleanup disabled, not starting");
            return;
        }

        let task = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        tokio::spawn(async move {
            let period =
                std::time::Duration::from_secs(task.config.check_interval_hours.max(1) * 3600);
            let mut ticker = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = task.run_if_due().await {
                            warn!("Cleanup run failed: {}", e);
                        }
                    }
                    _ = stop_rx.changed() => {
                        info!("Cleanup loop stopping");
                        break;
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Run a cleanup if the configured interval has elapsed since the
    /// last recorded run. Returns `None` when nothing was due.
    pub async fn run_if_due(&self) -> plantwatch_store::Result<Option<CleanupReport>> {
        let now = OffsetDateTime::now_utc();
        if !self.is_due(now) {
            debug!("cleanup not due");
            return Ok(None);
        }
        self.perform(now).await.map(Some)
    }

    /// Run a cleanup unconditionally and record the run time.
    pub async fn perform(&self, now: OffsetDateTime) -> plantwatch_store::Result<CleanupReport> {
        let cutoff = now - Duration::days(i64::from(self.config.retention_days));
        let purged_rows = self.repository.purge_older_than(cutoff).await?;
        let pruned_exports = prune_exports(self.repository.export_dir(), DEFAULT_EXPORTS_KEPT)?;

        self.write_marker(now);
        info!(
            purged_rows,
            pruned_exports,
            retention_days = self.config.retention_days,
            "cleanup complete"
        );
        Ok(CleanupReport {
            purged_rows,
            pruned_exports,
        })
    }

    /// Estimate what a cleanup run at `now` would remove.
    pub async fn preview(&self, now: OffsetDateTime) -> plantwatch_store::Result<CleanupPreview> {
        let cutoff = now - Duration::days(i64::from(self.config.retention_days));
        let rows = self.repository.count_before(cutoff).await?;
        Ok(CleanupPreview {
            rows,
            estimated_bytes: rows * ESTIMATED_ROW_BYTES,
        })
    }

    fn is_due(&self, now: OffsetDateTime) -> bool {
        let Some(last) = self.read_marker() else {
            return true;
        };
        now - last > Duration::days(i64::from(self.config.interval_days))
    }

    fn read_marker(&self) -> Option<OffsetDateTime> {
        let content = std::fs::read_to_string(&self.marker_path).ok()?;
        let millis: i64 = content.trim().parse().ok()?;
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
    }

    fn write_marker(&self, now: OffsetDateTime) {
        let millis = (now.unix_timestamp_nanos() / 1_000_000) as i64;
        if let Some(parent) = self.marker_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create marker directory: {}", e);
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.marker_path, millis.to_string()) {
            warn!(
                "Failed to write cleanup marker {}: {}",
                self.marker_path.display(),
                e
            );
        }
    }
}
