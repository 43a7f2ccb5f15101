//! Incremental recorder for a pipeline run.
//!
//! ```no_run
//! # use taleweave_ledger::RunSession;
//! let mut session = RunSession::new("build");
//! session.set_context(serde_json::json!({"sources": ["folklore.json"]}));
//! session.record_stage("merge", "Merged 3 source batches", serde_json::json!({"entities": 120}), true);
//! session.add_artifact("graph.safetensors", 4096, "af1349b9...");
//! let record = session.finalize().unwrap();
//! assert!(record.content_hash.is_some());
//! ```

use chrono::Utc;
use taleweave_core::QualityReport;

use crate::{ArtifactDigest, RunId, RunOutcome, RunRecord, StageEntry};

pub struct RunSession {
    record: RunRecord,
}

impl RunSession {
    pub fn new(intent: &str) -> Self {
        Self {
            record: RunRecord {
                id: RunId::new(),
                intent: intent.to_string(),
                context: serde_json::Value::Null,
                stages: Vec::new(),
                quality: None,
                artifacts: Vec::new(),
                outcome: None,
                started_at: Utc::now(),
                completed_at: None,
                content_hash: None,
            },
        }
    }

    pub fn set_context(&mut self, context: serde_json::Value) {
        self.record.context = context;
    }

    pub fn record_stage(
        &mut self,
        stage: &str,
        description: &str,
        details: serde_json::Value,
        success: bool,
    ) {
        self.record.stages.push(StageEntry {
            stage: stage.to_string(),
            description: description.to_string(),
            details,
            success,
            timestamp: Utc::now(),
        });
    }

    pub fn set_quality(&mut self, quality: QualityReport) {
        self.record.quality = Some(quality);
    }

    pub fn add_artifact(&mut self, name: &str, bytes: u64, checksum: &str) {
        self.record.artifacts.push(ArtifactDigest {
            name: name.to_string(),
            bytes,
            checksum: checksum.to_string(),
        });
    }

    /// Run ID, available before finalization.
    pub fn id(&self) -> RunId {
        self.record.id
    }

    /// Close a successful run: stamp completion and compute the content hash.
    pub fn finalize(self) -> Result<RunRecord, serde_json::Error> {
        self.close(RunOutcome::Succeeded)
    }

    /// Close a run that aborted.
    pub fn fail(self, reason: &str) -> Result<RunRecord, serde_json::Error> {
        self.close(RunOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    fn close(mut self, outcome: RunOutcome) -> Result<RunRecord, serde_json::Error> {
        self.record.outcome = Some(outcome);
        self.record.completed_at = Some(Utc::now());
        let hash = self.record.compute_hash()?;
        self.record.content_hash = Some(hash);
        Ok(self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_seals_the_record() {
        let mut session = RunSession::new("build");
        let id = session.id();
        session.record_stage("validate", "pruned orphans", serde_json::json!({"orphans": 2}), true);
        session.set_quality(QualityReport {
            orphan_entities: 2,
            ..Default::default()
        });

        let record = session.finalize().unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.stages.len(), 1);
        assert!(record.completed_at.is_some());
        assert!(record.succeeded());
        assert!(record.verify_integrity());
    }

    #[test]
    fn failed_run_is_still_sealed() {
        let record = RunSession::new("build").fail("graph is empty").unwrap();

        assert!(!record.succeeded());
        assert_eq!(
            record.outcome,
            Some(RunOutcome::Failed {
                reason: "graph is empty".to_string()
            })
        );
        assert!(record.verify_integrity());
    }
}
