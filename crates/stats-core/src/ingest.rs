//! Validation and storage of incoming agent reports

use crate::models::{Snapshot, StatsReport};
use crate::store::SnapshotStore;
use thiserror::Error;

/// Reasons a structurally decoded report is still refused
#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("instance_id must not be empty")]
    EmptyInstanceId,

    #[error("images_size_gb must be a non-negative number, got {0}")]
    InvalidSize(f64),
}

/// Check a report before it may touch the store
pub fn validate(report: &StatsReport) -> Result<(), IngestError> {
    if report.instance_id.trim().is_empty() {
        return Err(IngestError::EmptyInstanceId);
    }
    if !report.images_size_gb.is_finite() || report.images_size_gb < 0.0 {
        return Err(IngestError::InvalidSize(report.images_size_gb));
    }
    Ok(())
}

/// Validate and upsert a report, returning the stored snapshot.
///
/// A timestamp that does not parse is accepted here; the sweeper drops
/// such entries on its next pass.
pub async fn ingest(store: &SnapshotStore, report: StatsReport) -> Result<Snapshot, IngestError> {
    validate(&report)?;
    let mut snapshot = Snapshot::from_report(report);
    snapshot.generation = store.upsert(snapshot.clone()).await;
    Ok(snapshot)
}
