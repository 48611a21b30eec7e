//! Data access facade.
//!
//! [`Repository`] joins the sensor source and the SQLite store behind one
//! async surface. The polling coordinator and the CLI both go through it,
//! so locking and the persistence-failure policy live here and nowhere
//! else.

use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use plantwatch_client::SensorSource;
use plantwatch_store::{
    Averages, ReadingQuery, Statistics, Store, StoredReading, export_csv, prune_exports,
    DEFAULT_EXPORTS_KEPT,
};
use plantwatch_types::Reading;

/// Shared data access for live readings and stored history.
pub struct Repository {
    source: Box<dyn SensorSource>,
    store: Mutex<Store>,
    export_dir: PathBuf,
}

impl Repository {
    pub fn new(source: Box<dyn SensorSource>, store: Store, export_dir: PathBuf) -> Self {
        Self {
            source,
            store: Mutex::new(store),
            export_dir,
        }
    }

    /// Fetch a reading and persist it.
    ///
    /// A persistence failure is logged and swallowed; the fresh reading is
    /// still returned so the display stays live even when the disk does
    /// not cooperate. A fetch failure is returned as-is.
    pub async fn fetch_and_persist(&self) -> plantwatch_client::Result<Reading> {
        let reading = self.source.fetch_reading().await?;
        let store = self.store.lock().await;
        if let Err(e) = store.insert_reading(&reading) {
            warn!("Failed to persist reading: {}", e);
        }
        Ok(reading)
    }

    /// Fetch a reading without persisting it.
    pub async fn fetch_only(&self) -> plantwatch_client::Result<Reading> {
        self.source.fetch_reading().await
    }

    /// Persist an already-fetched reading.
    pub async fn save_snapshot(&self, reading: &Reading) -> plantwatch_store::Result<i64> {
        let store = self.store.lock().await;
        store.insert_reading(reading)
    }

    /// Push new thresholds to the device.
    pub async fn push_thresholds(
        &self,
        temperature: i32,
        light: i32,
    ) -> plantwatch_client::Result<()> {
        self.source.set_thresholds(temperature, light).await
    }

    pub async fn history(&self, query: &ReadingQuery) -> plantwatch_store::Result<Vec<StoredReading>> {
        let store = self.store.lock().await;
        store.query_readings(query)
    }

    pub async fn latest(&self) -> plantwatch_store::Result<Option<StoredReading>> {
        let store = self.store.lock().await;
        store.latest_reading()
    }

    pub async fn count(&self) -> plantwatch_store::Result<u64> {
        let store = self.store.lock().await;
        store.count()
    }

    pub async fn count_before(
        &self,
        cutoff: time::OffsetDateTime,
    ) -> plantwatch_store::Result<u64> {
        let store = self.store.lock().await;
        store.count_before(cutoff)
    }

    /// Delete rows strictly older than `cutoff`. Returns rows removed.
    pub async fn purge_older_than(
        &self,
        cutoff: time::OffsetDateTime,
    ) -> plantwatch_store::Result<usize> {
        let store = self.store.lock().await;
        let removed = store.purge_older_than(cutoff)?;
        debug!(removed, "purged readings older than cutoff");
        Ok(removed)
    }

    /// Delete every stored reading. Returns rows removed.
    pub async fn purge_all(&self) -> plantwatch_store::Result<usize> {
        let store = self.store.lock().await;
        store.purge_all()
    }

    /// Remove readings sharing a timestamp, keeping the first of each.
    pub async fn dedupe(&self) -> plantwatch_store::Result<usize> {
        let store = self.store.lock().await;
        store.dedupe()
    }

    pub async fn statistics(&self) -> plantwatch_store::Result<Statistics> {
        let store = self.store.lock().await;
        store.statistics()
    }

    pub async fn averages(
        &self,
        since: time::OffsetDateTime,
        until: time::OffsetDateTime,
    ) -> plantwatch_store::Result<Option<Averages>> {
        let store = self.store.lock().await;
        store.averages(since, until)
    }

    /// Export all stored readings to a timestamped CSV file, then prune
    /// old exports down to the retained count.
    pub async fn export(&self, file_stem: &str) -> plantwatch_store::Result<PathBuf> {
        let store = self.store.lock().await;
        let path = export_csv(&store, &self.export_dir, file_stem)?;
        let pruned = prune_exports(&self.export_dir, DEFAULT_EXPORTS_KEPT)?;
        if pruned > 0 {
            debug!(pruned, "removed old export files");
        }
        Ok(path)
    }

    pub fn export_dir(&self) -> &PathBuf {
        &self.export_dir
    }
}
