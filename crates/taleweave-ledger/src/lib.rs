//! Taleweave Ledger: tamper-evident records of graph builds.
//!
//! Every pipeline run leaves a `RunRecord`: what was asked for, the
//! configuration it ran with, each stage it passed through, the final
//! data-quality counters, and the checksums of the artifacts it wrote.
//! Records are content-hashed with BLAKE3 so that a later edit to a stored
//! record is detectable.

pub mod hash;
pub mod session;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taleweave_core::QualityReport;
use uuid::Uuid;

pub use session::RunSession;
pub use store::{FileLedgerStore, LedgerStore, RunQuery, StoreError};

// ── Core Types ───────────────────────────────────────────────────

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One pipeline stage as it was executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageEntry {
    /// Stage name (e.g. "merge", "validate", "encode").
    pub stage: String,
    /// Human-readable description.
    pub description: String,
    /// Structured counters or parameters for the stage.
    pub details: serde_json::Value,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Checksum of one written artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactDigest {
    /// File name relative to the output directory.
    pub name: String,
    pub bytes: u64,
    /// BLAKE3 hex digest.
    pub checksum: String,
}

/// How a run ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed { reason: String },
}

/// The complete record of a single build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub id: RunId,
    /// What the run was for (e.g. "build", "validate").
    pub intent: String,
    /// Configuration snapshot the run started with.
    pub context: serde_json::Value,
    pub stages: Vec<StageEntry>,
    /// Final data-quality counters, if the run got far enough to have them.
    pub quality: Option<QualityReport>,
    pub artifacts: Vec<ArtifactDigest>,
    pub outcome: Option<RunOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// BLAKE3 content hash (hex), set on finalization.
    pub content_hash: Option<String>,
}

impl RunRecord {
    /// BLAKE3 hash over every field except `content_hash`.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        hash::compute_record_hash(self)
    }

    /// Whether the stored content hash matches a freshly computed one.
    pub fn verify_integrity(&self) -> bool {
        match (&self.content_hash, self.compute_hash()) {
            (Some(stored), Ok(fresh)) => stored == &fresh,
            _ => false,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(RunOutcome::Succeeded))
    }
}
