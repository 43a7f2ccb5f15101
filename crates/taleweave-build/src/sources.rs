//! External collaborators: record sources, summaries, and embeddings.
//!
//! The pipeline only sees the traits. File-backed implementations read the
//! JSON that the acquisition layer and the embedding model run leave on
//! disk; `HashingEmbedder` gives a deterministic offline fallback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taleweave_core::{EntityFragment, RelationFragment};

use crate::error::{BuildError, Result};

// ── Contracts ────────────────────────────────────────────────────

/// One batch of fragments from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceBatch {
    #[serde(default)]
    pub entities: Vec<EntityFragment>,
    #[serde(default)]
    pub relations: Vec<RelationFragment>,
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    /// Genre tag applied to this source's entities as `source_genre`.
    fn genre(&self) -> Option<&str>;

    async fn fetch(&self) -> Result<SourceBatch>;
}

#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn summary(&self, identifier: &str) -> Option<String>;
}

/// What gets embedded for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingRequest {
    pub identifier: String,
    pub text: String,
}

#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    /// Length of every vector this source produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, request: &EmbeddingRequest) -> Result<Vec<f32>>;
}

// ── Record sources ───────────────────────────────────────────────

/// A `{"entities": [...], "relations": [...]}` document on disk.
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
    genre: Option<String>,
}

impl JsonFileSource {
    pub fn new(name: &str, path: impl Into<PathBuf>, genre: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
            genre,
        }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    async fn fetch(&self) -> Result<SourceBatch> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| BuildError::source_failed(&self.name, format!("{}: {e}", self.path.display())))?;
        let batch: SourceBatch = serde_json::from_str(&raw)
            .map_err(|e| BuildError::source_failed(&self.name, format!("{}: {e}", self.path.display())))?;

        tracing::debug!(
            source = %self.name,
            entities = batch.entities.len(),
            relations = batch.relations.len(),
            "Fetched source batch"
        );
        Ok(batch)
    }
}

/// An in-memory batch.
pub struct StaticSource {
    name: String,
    genre: Option<String>,
    batch: SourceBatch,
}

impl StaticSource {
    pub fn new(name: &str, batch: SourceBatch) -> Self {
        Self {
            name: name.to_string(),
            genre: None,
            batch,
        }
    }

    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = Some(genre.to_string());
        self
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    async fn fetch(&self) -> Result<SourceBatch> {
        Ok(self.batch.clone())
    }
}

// ── Summaries ────────────────────────────────────────────────────

/// Identifier → summary text, loaded from a JSON object or built in memory.
#[derive(Debug, Clone, Default)]
pub struct JsonSummaryFile {
    summaries: HashMap<String, String>,
}

impl JsonSummaryFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(Self::from_map(serde_json::from_str(&raw)?))
    }

    pub fn from_map(summaries: HashMap<String, String>) -> Self {
        Self { summaries }
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

#[async_trait]
impl SummarySource for JsonSummaryFile {
    async fn summary(&self, identifier: &str) -> Option<String> {
        self.summaries
            .get(identifier)
            .filter(|s| !s.trim().is_empty())
            .cloned()
    }
}

// ── Embeddings ───────────────────────────────────────────────────

/// Vectors produced ahead of time by an external model, keyed by identifier.
#[derive(Debug, Clone)]
pub struct PrecomputedEmbeddings {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl PrecomputedEmbeddings {
    pub async fn load(path: &Path, dimension: usize) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(Self::from_map(dimension, serde_json::from_str(&raw)?))
    }

    pub fn from_map(dimension: usize, vectors: HashMap<String, Vec<f32>>) -> Self {
        Self { dimension, vectors }
    }
}

#[async_trait]
impl EmbeddingSource for PrecomputedEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: &EmbeddingRequest) -> Result<Vec<f32>> {
        self.vectors
            .get(&request.identifier)
            .cloned()
            .ok_or_else(|| BuildError::Embedding {
                identifier: request.identifier.clone(),
                reason: "no precomputed vector".to_string(),
            })
    }
}

/// Feature-hashing embedder.
///
/// Each lower-cased alphanumeric token is hashed with BLAKE3 and the first
/// eight bytes pick a bucket. The bucket counts are then L2-normalised, so
/// any text with at least one token gets a unit vector. Same text, same
/// vector, on every machine.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        if self.dimension == 0 {
            return None;
        }

        let mut vector = vec![0.0f32; self.dimension];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        for token in tokens {
            let digest = blake3::hash(token.as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest.as_bytes()[..8]);
            let bucket = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return None;
        }
        vector.iter_mut().for_each(|v| *v /= norm);
        Some(vector)
    }
}

#[async_trait]
impl EmbeddingSource for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: &EmbeddingRequest) -> Result<Vec<f32>> {
        self.embed_text(&request.text).ok_or_else(|| BuildError::Embedding {
            identifier: request.identifier.clone(),
            reason: "text has no tokens".to_string(),
        })
    }
}
