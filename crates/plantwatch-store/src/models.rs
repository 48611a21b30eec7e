//! Data models for stored readings.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use plantwatch_types::Reading;

use crate::error::{Error, Result};

/// A reading stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    /// Database row ID.
    pub id: i64,
    /// Air temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Light level (raw sensor units).
    pub light: i32,
    /// Soil moisture (raw sensor units).
    pub soil: i32,
    /// When this reading was persisted.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl StoredReading {
    /// Convert back to a wire [`Reading`].
    pub fn to_reading(&self) -> Reading {
        Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            light: self.light,
            soil: self.soil,
        }
    }
}

/// Summary statistics over the readings table.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    /// Total number of stored readings.
    pub total: u64,
    /// Timestamp of the oldest reading, if any.
    #[serde(with = "time::serde::rfc3339::option")]
    pub oldest: Option<OffsetDateTime>,
    /// Timestamp of the newest reading, if any.
    #[serde(with = "time::serde::rfc3339::option")]
    pub newest: Option<OffsetDateTime>,
    /// Number of rows sharing a timestamp with an earlier row.
    pub duplicates: u64,
}

/// Mean values over a time window.
#[derive(Debug, Clone, Serialize)]
pub struct Averages {
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    pub soil: f64,
}

/// Timestamps are stored as epoch milliseconds.
pub(crate) fn to_millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(ms: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .map_err(|_| Error::InvalidTimestamp(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_round_trip() {
        let now = OffsetDateTime::now_utc();
        let ms = to_millis(now);
        let back = from_millis(ms).unwrap();
        // Sub-millisecond precision is dropped
        assert_eq!(to_millis(back), ms);
    }

    #[test]
    fn invalid_millis_rejected() {
        assert!(from_millis(i64::MAX).is_err());
    }

    #[test]
    fn stored_reading_to_reading() {
        let stored = StoredReading {
            id: 7,
            temperature: 23.5,
            humidity: 61.0,
            light: 350,
            soil: 2000,
            timestamp: OffsetDateTime::now_utc(),
        };
        let reading = stored.to_reading();
        assert_eq!(reading.temperature, 23.5);
        assert_eq!(reading.soil, 2000);
    }
}
