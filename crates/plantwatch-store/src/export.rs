//! CSV export of stored readings.
//!
//! Exports are written to a directory of timestamped files
//! (`{stem}_{YYYYmmdd_HHMMSS}.csv`), one row per reading in chronological
//! order. The header matches the format the original export consumers
//! expect. [`prune_exports`] keeps the directory from growing without
//! bound.

use std::path::{Path, PathBuf};

use time::{OffsetDateTime, UtcOffset};
use time::macros::format_description;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::StoredReading;
use crate::queries::ReadingQuery;
use crate::store::Store;

/// CSV header row: time, temperature (°C), humidity (%), light, soil.
pub const CSV_HEADER: [&str; 5] = ["时间", "温度(°C)", "湿度(%)", "光照强度", "土壤湿度"];

/// Number of export files kept by [`prune_exports`] by default.
pub const DEFAULT_EXPORTS_KEPT: usize = 10;

/// Summary of an export, shown to the user before sharing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExportSummary {
    /// Number of exported readings.
    pub total_records: usize,
    /// Human-readable first-to-last range, or "no data".
    pub date_range: String,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_light: f64,
}

/// Export all readings (oldest first) to a new CSV file under `dir`.
///
/// Returns the path of the written file. The directory is created if
/// needed. Timestamps are rendered in local time when the local offset is
/// known, UTC otherwise.
pub fn export_csv(store: &Store, dir: &Path, file_stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| Error::CreateDirectory {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let readings = store.query_readings(&ReadingQuery::new().oldest_first())?;

    let stamp_fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = local(OffsetDateTime::now_utc()).format(stamp_fmt)?;
    let path = dir.join(format!("{}_{}.csv", file_stem, stamp));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(CSV_HEADER)?;

    let row_fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    for reading in &readings {
        let when = local(reading.timestamp).format(row_fmt)?;
        writer.write_record([
            when,
            reading.temperature.to_string(),
            reading.humidity.to_string(),
            reading.light.to_string(),
            reading.soil.to_string(),
        ])?;
    }
    writer.flush()?;

    info!(
        "Exported {} readings to {}",
        readings.len(),
        path.display()
    );
    Ok(path)
}

/// Build an export summary for a set of readings.
pub fn summarize(readings: &[StoredReading]) -> ExportSummary {
    if readings.is_empty() {
        return ExportSummary {
            total_records: 0,
            date_range: "no data".to_string(),
            avg_temperature: 0.0,
            avg_humidity: 0.0,
            avg_light: 0.0,
        };
    }

    let mut sorted: Vec<&StoredReading> = readings.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let fmt = format_description!("[month]-[day] [hour]:[minute]");
    let first = local(sorted[0].timestamp)
        .format(fmt)
        .unwrap_or_default();
    let last = local(sorted[sorted.len() - 1].timestamp)
        .format(fmt)
        .unwrap_or_default();

    let n = readings.len() as f64;
    ExportSummary {
        total_records: readings.len(),
        date_range: format!("{} - {}", first, last),
        avg_temperature: readings.iter().map(|r| r.temperature).sum::<f64>() / n,
        avg_humidity: readings.iter().map(|r| r.humidity).sum::<f64>() / n,
        avg_light: readings.iter().map(|r| r.light as f64).sum::<f64>() / n,
    }
}

/// Delete old export files, keeping the `keep` most recently modified.
///
/// Returns the number of files removed. Missing directories are treated as
/// already clean.
pub fn prune_exports(dir: &Path, keep: usize) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            let modified = entry.metadata()?.modified()?;
            files.push((path, modified));
        }
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in files.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old export {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        info!("Pruned {} old export files from {}", removed, dir.display());
    }
    Ok(removed)
}

fn local(ts: OffsetDateTime) -> OffsetDateTime {
    match UtcOffset::current_local_offset() {
        Ok(offset) => ts.to_offset(offset),
        Err(_) => ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantwatch_types::Reading;
    use time::Duration;

    fn store_with_rows(n: i64) -> Store {
        let store = Store::open_in_memory().unwrap();
        let base = OffsetDateTime::now_utc() - Duration::hours(n);
        for i in 0..n {
            store
                .insert_reading_at(
                    &Reading {
                        temperature: 20.0 + i as f64,
                        humidity: 50.0,
                        light: 300,
                        soil: 1800,
                    },
                    base + Duration::hours(i),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn export_writes_header_and_rows_ascending() {
        let store = store_with_rows(3);
        let dir = tempfile::tempdir().unwrap();

        let path = export_csv(&store, dir.path(), "sensor_data").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "时间,温度(°C),湿度(%),光照强度,土壤湿度");
        // Oldest (coolest) row first
        assert!(lines[1].contains(",20,"));
        assert!(lines[3].contains(",22,"));
    }

    #[test]
    fn export_filename_carries_stem() {
        let store = store_with_rows(1);
        let dir = tempfile::tempdir().unwrap();

        let path = export_csv(&store, dir.path(), "greenhouse").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("greenhouse_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn export_of_empty_store_is_header_only() {
        let store = Store::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let path = export_csv(&store, dir.path(), "sensor_data").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn summary_of_empty_set() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.date_range, "no data");
    }

    #[test]
    fn summary_averages() {
        let store = store_with_rows(2);
        let readings = store.query_readings(&ReadingQuery::new()).unwrap();
        let summary = summarize(&readings);

        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.avg_temperature, 20.5);
        assert_eq!(summary.avg_light, 300.0);
        assert!(summary.date_range.contains(" - "));
    }

    #[test]
    fn prune_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            let path = dir.path().join(format!("export_{i}.csv"));
            std::fs::write(&path, "x").unwrap();
            // Distinct mtimes so ordering is deterministic
            let t = std::time::SystemTime::now() - std::time::Duration::from_secs(100 - i);
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_times(std::fs::FileTimes::new().set_modified(t)).unwrap();
        }

        let removed = prune_exports(dir.path(), 2).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
        assert!(dir.path().join("export_4.csv").exists());
        assert!(dir.path().join("export_3.csv").exists());
    }

    #[test]
    fn prune_missing_directory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(prune_exports(&missing, 10).unwrap(), 0);
    }
}
