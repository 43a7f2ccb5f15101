//! BLAKE3 content hashing for run records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use taleweave_core::QualityReport;

use crate::{ArtifactDigest, RunId, RunOutcome, RunRecord, StageEntry};

/// Borrowed view of a record without its hash field.
#[derive(Serialize)]
struct HashableRecord<'a> {
    id: &'a RunId,
    intent: &'a str,
    context: &'a serde_json::Value,
    stages: &'a [StageEntry],
    quality: &'a Option<QualityReport>,
    artifacts: &'a [ArtifactDigest],
    outcome: &'a Option<RunOutcome>,
    started_at: &'a DateTime<Utc>,
    completed_at: &'a Option<DateTime<Utc>>,
}

/// Serialize all fields except `content_hash` to JSON and hash the bytes.
pub fn compute_record_hash(record: &RunRecord) -> Result<String, serde_json::Error> {
    let hashable = HashableRecord {
        id: &record.id,
        intent: &record.intent,
        context: &record.context,
        stages: &record.stages,
        quality: &record.quality,
        artifacts: &record.artifacts,
        outcome: &record.outcome,
        started_at: &record.started_at,
        completed_at: &record.completed_at,
    };

    let json = serde_json::to_vec(&hashable)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}
