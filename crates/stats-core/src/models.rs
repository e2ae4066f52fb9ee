//! Core data models shared by the agent and the collector

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Bytes per GiB, used when converting image sizes
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Measurement sent by an agent to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub instance_id: String,
    pub images_size_gb: f64,
    /// RFC3339 timestamp as produced by the agent
    pub timestamp: String,
    pub prune_action: bool,
}

impl StatsReport {
    /// Routine measurement taken now
    pub fn measurement(instance_id: impl Into<String>, images_size_gb: f64) -> Self {
        Self {
            instance_id: instance_id.into(),
            images_size_gb,
            timestamp: rfc3339_now(),
            prune_action: false,
        }
    }

    /// Follow-up report after a completed prune
    pub fn after_prune(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            images_size_gb: 0.0,
            timestamp: rfc3339_now(),
            prune_action: true,
        }
    }
}

/// Latest stored measurement for one instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub instance_id: String,
    pub images_size_gb: f64,
    pub timestamp: String,
    pub prune_action: bool,
    /// Instant parsed from `timestamp` at ingest; `None` if it was malformed
    #[serde(skip)]
    pub observed_at: Option<DateTime<Utc>>,
    /// Store-assigned counter identifying the upsert that produced this value
    #[serde(skip)]
    pub generation: u64,
}

impl Snapshot {
    /// Build a snapshot from a report, parsing the timestamp once.
    ///
    /// The generation is left at zero; the store assigns it on upsert.
    pub fn from_report(report: StatsReport) -> Self {
        let observed_at = parse_timestamp(&report.timestamp);
        Self {
            instance_id: report.instance_id,
            images_size_gb: report.images_size_gb,
            timestamp: report.timestamp,
            prune_action: report.prune_action,
            observed_at,
            generation: 0,
        }
    }
}

/// Parse an RFC3339 timestamp into UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Current time formatted the way agents transmit it
pub fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_wire_format() {
        let json = r#"{"instance_id":"h1","images_size_gb":12.5,"timestamp":"2024-01-01T00:00:00Z","prune_action":false}"#;
        let report: StatsReport = serde_json::from_str(json).unwrap();

        assert_eq!(report.instance_id, "h1");
        assert_eq!(report.images_size_gb, 12.5);
        assert!(!report.prune_action);
    }

    #[test]
    fn test_snapshot_parses_timestamp_once() {
        let snapshot = Snapshot::from_report(StatsReport {
            instance_id: "h1".to_string(),
            images_size_gb: 1.0,
            timestamp: "2024-01-01T02:00:00+02:00".to_string(),
            prune_action: false,
        });

        assert_eq!(
            snapshot.observed_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_snapshot_keeps_malformed_timestamp() {
        let snapshot = Snapshot::from_report(StatsReport {
            instance_id: "h1".to_string(),
            images_size_gb: 1.0,
            timestamp: "yesterday".to_string(),
            prune_action: false,
        });

        assert_eq!(snapshot.timestamp, "yesterday");
        assert!(snapshot.observed_at.is_none());
    }

    #[test]
    fn test_after_prune_report() {
        let report = StatsReport::after_prune("h2");
        assert!(report.prune_action);
        assert_eq!(report.images_size_gb, 0.0);
        assert!(parse_timestamp(&report.timestamp).is_some());
    }

    #[test]
    fn test_snapshot_serializes_wire_fields_only() {
        let snapshot = Snapshot::from_report(StatsReport::measurement("h3", 2.0));
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["instance_id"], "h3");
        assert!(value.get("generation").is_none());
        assert!(value.get("observed_at").is_none());
    }
}
