//! Query builder for stored readings.
//!
//! [`ReadingQuery`] follows the builder pattern for filtering and
//! paginating stored sensor data.
//!
//! # Example
//!
//! ```
//! use plantwatch_store::{ReadingQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! // Last 24 hours, newest first, first page of 50
//! let query = ReadingQuery::new().since(yesterday).limit(50).offset(0);
//! let readings = store.query_readings(&query)?;
//!
//! // Chronological order for export
//! let chronological = ReadingQuery::new().oldest_first();
//! # Ok::<(), plantwatch_store::Error>(())
//! ```

use time::OffsetDateTime;

use crate::models::to_millis;

/// Fluent query builder for readings.
///
/// By default results are ordered by `timestamp` descending (newest first),
/// with no time-range filter and no limit.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter readings at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Filter readings at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query with default settings.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter to readings persisted at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to readings persisted at or before this time.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results; use with `limit()` for pagination.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results oldest first (ascending by `timestamp`).
    ///
    /// Useful for exports and sequential processing.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(to_millis(since)));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to_millis(until)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, temperature, humidity, light, soil, timestamp \
             FROM readings {} ORDER BY timestamp {}, id {}",
            where_clause, order, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}
