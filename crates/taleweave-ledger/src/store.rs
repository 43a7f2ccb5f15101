//! Run record storage: trait + file-backed implementation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{RunId, RunRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Run record not found: {0}")]
    NotFound(RunId),

    #[error("Integrity check failed for run {0}: stored hash does not match content")]
    IntegrityViolation(RunId),

    #[error("Run record has no content hash (not finalized)")]
    NotFinalized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Filters for listing run records. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RunQuery {
    pub intent: Option<String>,
    /// Only runs that ended with `RunOutcome::Succeeded`.
    pub succeeded_only: bool,
    /// Only runs started at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Keep at most this many records, newest first.
    pub limit: Option<usize>,
}

impl RunQuery {
    pub fn matches(&self, record: &RunRecord) -> bool {
        self.intent.as_deref().map_or(true, |intent| record.intent == intent)
            && (!self.succeeded_only || record.succeeded())
            && self.since.map_or(true, |since| record.started_at >= since)
    }
}

pub trait LedgerStore {
    /// Persist a finalized record.
    fn save(&self, record: &RunRecord) -> Result<PathBuf, StoreError>;

    /// Load a record by ID, verifying integrity.
    fn get(&self, id: RunId) -> Result<RunRecord, StoreError>;

    /// Records matching `query`, newest first.
    fn list(&self, query: &RunQuery) -> Result<Vec<RunRecord>, StoreError>;
}

/// Stores records as pretty JSON in a date tree:
/// ```text
/// {root}/
///   2026/
///     10/
///       17/
///         {run_id}.json
/// ```
pub struct FileLedgerStore {
    root: PathBuf,
}

impl FileLedgerStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn record_path(&self, record: &RunRecord) -> PathBuf {
        let date = record.started_at.format("%Y/%m/%d");
        self.root.join(format!("{}/{}.json", date, record.id.0))
    }

    fn find_path(&self, id: RunId) -> Result<PathBuf, StoreError> {
        let filename = format!("{}.json", id.0);
        let mut files = Vec::new();
        record_files(&self.root, &mut files)?;
        files
            .into_iter()
            .find(|path| path.file_name().and_then(|n| n.to_str()) == Some(filename.as_str()))
            .ok_or(StoreError::NotFound(id))
    }
}

impl LedgerStore for FileLedgerStore {
    fn save(&self, record: &RunRecord) -> Result<PathBuf, StoreError> {
        if record.content_hash.is_none() {
            return Err(StoreError::NotFinalized);
        }

        let path = self.record_path(record);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(record)?)?;

        tracing::debug!(run_id = %record.id, path = %path.display(), "Run record saved");
        Ok(path)
    }

    fn get(&self, id: RunId) -> Result<RunRecord, StoreError> {
        let path = self.find_path(id)?;
        let record: RunRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;

        if !record.verify_integrity() {
            return Err(StoreError::IntegrityViolation(id));
        }
        Ok(record)
    }

    fn list(&self, query: &RunQuery) -> Result<Vec<RunRecord>, StoreError> {
        let mut files = Vec::new();
        record_files(&self.root, &mut files)?;

        let mut records = Vec::with_capacity(files.len());
        for path in files {
            match serde_json::from_str::<RunRecord>(&fs::read_to_string(&path)?) {
                Ok(record) if query.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable run record");
                }
            }
        }

        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

/// Every `*.json` file under `dir`, depth first.
fn record_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            record_files(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            out.push(path);
        }
    }
    Ok(())
}
