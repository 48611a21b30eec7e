//! End-to-end session tests for plantwatch-service.
//!
//! These run against an in-memory store and a scripted sensor source,
//! exercising one whole monitoring session: initial load, display
//! refresh, threshold alerts, snapshots, export and cleanup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use plantwatch_client::SensorSource;
use plantwatch_service::cleanup::CleanupTask;
use plantwatch_service::config::{CleanupConfig, PollingConfig};
use plantwatch_service::coordinator::Coordinator;
use plantwatch_service::monitor::SensorMonitor;
use plantwatch_service::notify::{LogNotifier, Notifier};
use plantwatch_service::repository::Repository;
use plantwatch_store::{ReadingQuery, Store};
use plantwatch_types::{AlertKind, QuietHours, Reading};

struct SequenceSource {
    readings: Vec<Reading>,
    cursor: AtomicU32,
}

impl SequenceSource {
    fn new(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            cursor: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SensorSource for SequenceSource {
    async fn fetch_reading(&self) -> plantwatch_client::Result<Reading> {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) as usize;
        let i = i.min(self.readings.len() - 1);
        Ok(self.readings[i])
    }

    async fn set_thresholds(&self, _: i32, _: i32) -> plantwatch_client::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CountingNotifier(Arc<AtomicU32>);

impl Notifier for CountingNotifier {
    fn notify(&self, _kind: AlertKind, _title: &str, _body: &str) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn normal() -> Reading {
    Reading {
        temperature: 23.0,
        humidity: 55.0,
        light: 450,
        soil: 1850,
    }
}

fn hot() -> Reading {
    Reading {
        temperature: 33.5,
        humidity: 40.0,
        light: 450,
        soil: 1850,
    }
}

fn session(readings: Vec<Reading>) -> (Arc<Repository>, Arc<Coordinator>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let repository = Arc::new(Repository::new(
        Box::new(SequenceSource::new(readings)),
        store,
        dir.path().join("exports"),
    ));
    let monitor = Arc::new(Mutex::new(SensorMonitor::new(Box::new(LogNotifier))));
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&repository),
        monitor,
        PollingConfig::default(),
    ));
    (repository, coordinator, dir)
}

#[tokio::test]
async fn a_session_persists_once_then_displays_live() {
    let (repository, coordinator, _dir) = session(vec![normal(), hot()]);

    // Initial load persists; subsequent ticks only refresh the display.
    coordinator.initial_load().await;
    coordinator.display_tick().await;
    coordinator.display_tick().await;

    assert_eq!(repository.count().await.unwrap(), 1);
    let state = coordinator.display_state();
    assert!(state.reading.is_some());
    assert_eq!(state.save_count, 1);
}

#[tokio::test]
async fn hot_readings_raise_alerts_on_the_display() {
    let (_repository, coordinator, _dir) = session(vec![hot()]);

    // Zero-length quiet window so the outcome does not depend on the
    // wall clock.
    let monitor = coordinator.monitor();
    monitor.lock().await.set_quiet_hours(QuietHours {
        start_hour: 0,
        end_hour: 0,
    });

    coordinator.initial_load().await;

    let state = coordinator.display_state();
    assert!(state.has_active_alerts);
    assert!(state.recent_alert_count > 0);
    assert_eq!(monitor.lock().await.state().alert_history.len(), 1);
}

#[tokio::test]
async fn notifications_fire_once_per_cooldown_window() {
    let counter = CountingNotifier::default();
    let mut monitor = SensorMonitor::new(Box::new(counter.clone()));

    let start = time::macros::datetime!(2025-06-02 10:00:00 UTC);
    for i in 0..10 {
        monitor.check_reading_at(&hot(), start + Duration::minutes(i));
    }

    // One notification at 10:00, one after the 5-minute cooldown lapses.
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    assert_eq!(monitor.state().alert_history.len(), 10);
}

#[tokio::test]
async fn snapshots_accumulate_history_for_export() {
    let (repository, coordinator, dir) = session(vec![normal()]);

    coordinator.initial_load().await;
    coordinator.save_tick().await;
    coordinator.save_tick().await;
    assert_eq!(repository.count().await.unwrap(), 3);

    let path = repository.export("plant_data").await.unwrap();
    assert!(path.starts_with(dir.path().join("exports")));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("温度"));
}

#[tokio::test]
async fn cleanup_runs_against_the_shared_repository() {
    let (repository, coordinator, dir) = session(vec![normal()]);
    coordinator.initial_load().await;

    let task = CleanupTask::new(
        Arc::clone(&repository),
        CleanupConfig::default(),
        dir.path().join("last_cleanup"),
    );

    // Nothing is older than the retention window yet.
    let report = task
        .perform(OffsetDateTime::now_utc())
        .await
        .unwrap();
    assert_eq!(report.purged_rows, 0);
    assert_eq!(repository.count().await.unwrap(), 1);

    // From far enough in the future, everything is.
    let report = task
        .perform(OffsetDateTime::now_utc() + Duration::days(90))
        .await
        .unwrap();
    assert_eq!(report.purged_rows, 1);
    assert_eq!(repository.count().await.unwrap(), 0);
}

#[tokio::test]
async fn history_queries_see_snapshots_in_order() {
    let (repository, coordinator, _dir) = session(vec![normal()]);
    coordinator.initial_load().await;
    coordinator.save_tick().await;

    let newest_first = repository.history(&ReadingQuery::new()).await.unwrap();
    let oldest_first = repository
        .history(&ReadingQuery::new().oldest_first())
        .await
        .unwrap();

    assert_eq!(newest_first.len(), 2);
    assert_eq!(newest_first.first().map(|r| r.id), oldest_first.last().map(|r| r.id));
}
