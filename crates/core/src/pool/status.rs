//! Pool status payloads.

use chrono::Utc;
use serde::Serialize;

/// Seconds since the Unix epoch, with sub-second precision.
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Occupancy snapshot of a pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolReport {
    pub pool_created: bool,
    pub min_connections: usize,
    pub max_connections: usize,
    /// `None` when the pool has not been created.
    pub current_size: Option<usize>,
    pub idle_connections: Option<usize>,
    pub timestamp: f64,
}

/// Result of a status query. Never an `Err`: internal failures are reported
/// in-band as [`PoolStatus::Error`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PoolStatus {
    Report(PoolReport),
    Error { error: String, timestamp: f64 },
}

impl PoolStatus {
    /// Builds a report for a live pool.
    pub fn created(min: usize, max: usize, stats: &PoolStats) -> Self {
        PoolStatus::Report(PoolReport {
            pool_created: true,
            min_connections: min,
            max_connections: max,
            current_size: Some(stats.size),
            idle_connections: Some(stats.idle),
            timestamp: unix_timestamp(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        PoolStatus::Error {
            error: message.into(),
            timestamp: unix_timestamp(),
        }
    }

    /// True when the pool exists.
    pub fn is_created(&self) -> bool {
        matches!(
            self,
            PoolStatus::Report(PoolReport {
                pool_created: true,
                ..
            })
        )
    }
}

/// Counters kept by a pool implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Live connections, idle and leased.
    pub size: usize,
    pub idle: usize,
    pub leased: usize,
    /// Successful acquisitions since creation.
    pub acquired: u64,
    /// Connections returned to the pool.
    pub released: u64,
    /// Connections dropped after a failed probe, a failed rollback or a
    /// cancelled checkout.
    pub discarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_payload_shape() {
        let stats = PoolStats {
            size: 10,
            idle: 7,
            leased: 3,
            ..Default::default()
        };
        let status = PoolStatus::created(10, 100, &stats);
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["pool_created"], true);
        assert_eq!(json["min_connections"], 10);
        assert_eq!(json["max_connections"], 100);
        assert_eq!(json["current_size"], 10);
        assert_eq!(json["idle_connections"], 7);
        assert!(json["timestamp"].as_f64().unwrap() > 0.0);
        assert!(status.is_created());
    }

    #[test]
    fn test_error_payload_shape() {
        let status = PoolStatus::error("connection refused");
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["error"], "connection refused");
        assert!(json.get("pool_created").is_none());
        assert!(json["timestamp"].is_number());
        assert!(!status.is_created());
    }

    #[test]
    fn test_timestamp_is_recent() {
        let now = unix_timestamp();
        assert!(now > 1_600_000_000.0);
    }
}
