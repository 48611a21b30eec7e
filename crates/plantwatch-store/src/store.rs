//! Main store implementation.

use std::cell::Cell;
use std::path::Path;

use rusqlite::Connection;
use time::OffsetDateTime;
use tracing::{debug, info};

use plantwatch_types::Reading;

use crate::error::Result;
use crate::models::{Averages, Statistics, StoredReading, from_millis, to_millis};
use crate::queries::ReadingQuery;
use crate::schema;

/// SQLite-based store for sensor readings.
pub struct Store {
    conn: Connection,
    // Last timestamp handed out by insert_reading; keeps insert order
    // timestamps non-decreasing even if the system clock steps backwards.
    last_assigned_ms: Cell<i64>,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| crate::Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            last_assigned_ms: Cell::new(0),
        }
    }

    /// Insert a reading, assigning the current time as its timestamp.
    ///
    /// Returns the new row ID. Timestamps are non-decreasing across insert
    /// order on this store handle.
    pub fn insert_reading(&self, reading: &Reading) -> Result<i64> {
        let now = to_millis(OffsetDateTime::now_utc());
        let ms = now.max(self.last_assigned_ms.get());
        self.last_assigned_ms.set(ms);
        self.insert_at_millis(reading, ms)
    }

    /// Insert a reading with an explicit timestamp.
    ///
    /// Used for backfill and tests; normal persistence goes through
    /// [`insert_reading`](Store::insert_reading).
    pub fn insert_reading_at(&self, reading: &Reading, timestamp: OffsetDateTime) -> Result<i64> {
        self.insert_at_millis(reading, to_millis(timestamp))
    }

    fn insert_at_millis(&self, reading: &Reading, ms: i64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO readings (temperature, humidity, light, soil, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                reading.temperature,
                reading.humidity,
                reading.light,
                reading.soil,
                ms,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<StoredReading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut readings = Vec::new();
        for row in rows {
            let (id, temperature, humidity, light, soil, ms) = row?;
            readings.push(StoredReading {
                id,
                temperature,
                humidity,
                light,
                soil,
                timestamp: from_millis(ms)?,
            });
        }

        Ok(readings)
    }

    /// Get the most recently persisted reading.
    pub fn latest_reading(&self) -> Result<Option<StoredReading>> {
        let mut readings = self.query_readings(&ReadingQuery::new().limit(1))?;
        Ok(readings.pop())
    }

    /// Count all readings.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Count readings persisted strictly before `cutoff`.
    pub fn count_before(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM readings WHERE timestamp < ?",
            [to_millis(cutoff)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Count readings within `[since, until]` inclusive.
    pub fn count_in_range(&self, since: OffsetDateTime, until: OffsetDateTime) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM readings WHERE timestamp >= ?1 AND timestamp <= ?2",
            [to_millis(since), to_millis(until)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete readings persisted strictly before `cutoff`.
    ///
    /// Returns the number of rows deleted.
    pub fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM readings WHERE timestamp < ?",
            [to_millis(cutoff)],
        )?;
        if deleted > 0 {
            info!("Purged {} readings older than {}", deleted, cutoff);
        }
        Ok(deleted)
    }

    /// Delete all readings. Returns the number of rows deleted.
    pub fn purge_all(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM readings", [])?;
        info!("Purged all {} readings", deleted);
        Ok(deleted)
    }

    /// Summary statistics over the whole table.
    pub fn statistics(&self) -> Result<Statistics> {
        let (total, oldest_ms, newest_ms, duplicates): (i64, Option<i64>, Option<i64>, i64) =
            self.conn.query_row(
                "SELECT COUNT(*), MIN(timestamp), MAX(timestamp),
                        COUNT(*) - COUNT(DISTINCT timestamp)
                 FROM readings",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(Statistics {
            total: total as u64,
            oldest: oldest_ms.map(from_millis).transpose()?,
            newest: newest_ms.map(from_millis).transpose()?,
            duplicates: duplicates as u64,
        })
    }

    /// Remove duplicate rows, keeping the first-inserted row per timestamp.
    ///
    /// Returns the number of rows removed.
    pub fn dedupe(&self) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM readings
             WHERE id NOT IN (
                 SELECT MIN(id) FROM readings GROUP BY timestamp
             )",
            [],
        )?;
        if removed > 0 {
            info!("Removed {} duplicate readings", removed);
        }
        Ok(removed)
    }

    /// Mean values over `[since, until]`, or `None` if the window is empty.
    pub fn averages(
        &self,
        since: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<Option<Averages>> {
        let row: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) = self.conn.query_row(
            "SELECT AVG(temperature), AVG(humidity), AVG(light), AVG(soil)
             FROM readings WHERE timestamp >= ?1 AND timestamp <= ?2",
            [to_millis(since), to_millis(until)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        match row {
            (Some(temperature), Some(humidity), Some(light), Some(soil)) => Ok(Some(Averages {
                temperature,
                humidity,
                light,
                soil,
            })),
            _ => Ok(None),
        }
    }
}
