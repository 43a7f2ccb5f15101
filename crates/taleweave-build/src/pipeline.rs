//! Graph build pipeline.
//!
//! fetch (concurrent) → merge (single writer, source order) → validate →
//! summarize → embed (concurrent, collected in entity order) → re-validate
//! if anything was dropped → encode.
//!
//! Each arrow is a barrier: no stage starts until the previous one has
//! consumed all of its input.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use taleweave_core::{Entity, EntityFragment, QualityReport};
use taleweave_graph::{
    EntityStore, GraphStats, GraphValidator, IndexStats, RelationIndex, StoreStats,
    ValidatedGraph, ValidationReport,
};
use taleweave_tensor::{GraphTensors, TensorEncoder};

use crate::error::{BuildError, Result};
use crate::sources::{
    EmbeddingRequest, EmbeddingSource, RecordSource, SourceBatch, SummarySource,
};

/// Property written from the source's genre tag.
pub const SOURCE_GENRE: &str = "source_genre";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineOptions {
    pub strict_embeddings: bool,
    pub max_concurrent_fetches: usize,
    pub max_concurrent_embeddings: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strict_embeddings: false,
            max_concurrent_fetches: 4,
            max_concurrent_embeddings: 8,
        }
    }
}

/// Frozen result of the merge stage.
#[derive(Debug)]
pub struct Merged {
    pub store: EntityStore,
    pub index: RelationIndex,
    /// Genre tags of the merged sources, first occurrence order.
    pub categories: Vec<String>,
}

/// Result of `GraphPipeline::validate_only`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub quality: QualityReport,
    pub stats: GraphStats,
    pub categories: Vec<String>,
}

/// Everything a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: ValidatedGraph,
    pub tensors: GraphTensors,
    pub quality: QualityReport,
    pub stats: GraphStats,
    pub categories: Vec<String>,
    /// Identifiers dropped for lack of a usable vector.
    pub missing_embeddings: Vec<String>,
}

pub struct GraphPipeline {
    sources: Vec<Arc<dyn RecordSource>>,
    summaries: Option<Arc<dyn SummarySource>>,
    embedder: Arc<dyn EmbeddingSource>,
    options: PipelineOptions,
    validator: GraphValidator,
}

impl GraphPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingSource>) -> Self {
        Self {
            sources: Vec::new(),
            summaries: None,
            embedder,
            options: PipelineOptions::default(),
            validator: GraphValidator::new(),
        }
    }

    /// Append a source. Sources merge in the order they are added.
    pub fn with_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_summaries(mut self, summaries: Arc<dyn SummarySource>) -> Self {
        self.summaries = Some(summaries);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    // ── Fetch ────────────────────────────────────────────────────

    /// Fetch every source concurrently; results come back in source order.
    /// Any failing source aborts the run.
    pub async fn fetch_all(&self) -> Result<Vec<SourceBatch>> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_fetches.max(1)));
        let mut handles = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let source = source.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| BuildError::source_failed(source.name(), e))?;
                source.fetch().await
            }));
        }

        let mut batches = Vec::with_capacity(handles.len());
        for (source, handle) in self.sources.iter().zip(handles) {
            let batch = handle
                .await
                .map_err(|e| BuildError::source_failed(source.name(), e))??;
            batches.push(batch);
        }
        Ok(batches)
    }

    // ── Merge ────────────────────────────────────────────────────

    /// Fetch and merge. Every entity fragment of every batch is upserted
    /// before the first relation is resolved, so cross-source relations see
    /// the complete entity set.
    pub async fn merge(&self) -> Result<Merged> {
        let batches = self.fetch_all().await?;

        let mut store = EntityStore::new();
        let mut relations = Vec::new();
        let mut categories: Vec<String> = Vec::new();

        for (source, batch) in self.sources.iter().zip(batches) {
            let genre = source.genre().filter(|g| !g.trim().is_empty());
            if let Some(genre) = genre {
                if !categories.iter().any(|c| c == genre) {
                    categories.push(genre.to_string());
                }
            }

            let entity_count = batch.entities.len();
            for mut fragment in batch.entities {
                if let Some(genre) = genre {
                    tag_genre(&mut fragment, genre);
                }
                // Rejections are counted and logged by the store.
                let _ = store.upsert(fragment);
            }
            relations.push(batch.relations);

            tracing::info!(
                source = %source.name(),
                entities = entity_count,
                "Merged source entities"
            );
        }

        let mut index = RelationIndex::new();
        for fragment in relations.into_iter().flatten() {
            let _ = index.add(&store, fragment);
        }

        tracing::info!(
            entities = store.len(),
            relations = index.len(),
            merge_collisions = store.stats().merge_collisions,
            dropped_relations = index.stats().dropped(),
            "Merge complete"
        );

        Ok(Merged {
            store,
            index,
            categories,
        })
    }

    // ── Validate ─────────────────────────────────────────────────

    /// Merge and validate without embedding or encoding.
    pub async fn validate_only(&self) -> Result<ValidationSummary> {
        let merged = self.merge().await?;
        let (store_stats, index_stats) = (merged.store.stats(), merged.index.stats());

        let validation = self
            .validator
            .validate(merged.store.into_entities(), merged.index.into_relations());

        Ok(ValidationSummary {
            quality: quality_report(store_stats, index_stats, &[&validation.report], 0),
            stats: validation.graph.stats(),
            categories: merged.categories,
        })
    }

    // ── Full run ─────────────────────────────────────────────────

    pub async fn run(&self) -> Result<BuildOutput> {
        let merged = self.merge().await?;
        let (store_stats, index_stats) = (merged.store.stats(), merged.index.stats());

        let first = self
            .validator
            .validate(merged.store.into_entities(), merged.index.into_relations());
        ensure_not_empty(&first.graph)?;

        let mut graph = first.graph;
        self.attach_summaries(&mut graph.entities).await;
        let missing = self.attach_embeddings(&mut graph.entities).await?;

        let mut reports = vec![first.report];
        if !missing.is_empty() {
            let embedded: Vec<Entity> = graph
                .entities
                .into_iter()
                .filter(|e| e.embedding.is_some())
                .collect();
            let second = self.validator.validate(embedded, graph.relations);
            graph = second.graph;
            reports.push(second.report);
        }
        ensure_not_empty(&graph)?;
        graph.verify()?;

        let tensors = TensorEncoder::new()
            .with_feature_dim(self.embedder.dimension())
            .encode(&graph)?;

        let report_refs: Vec<&ValidationReport> = reports.iter().collect();
        let quality = quality_report(store_stats, index_stats, &report_refs, missing.len() as u64);
        let stats = graph.stats();

        tracing::info!(
            nodes = stats.node_count,
            edges = stats.edge_count,
            components = stats.weakly_connected_components,
            feature_dim = tensors.feature_dim,
            "Graph encoded"
        );

        Ok(BuildOutput {
            graph,
            tensors,
            quality,
            stats,
            categories: merged.categories,
            missing_embeddings: missing,
        })
    }

    async fn attach_summaries(&self, entities: &mut [Entity]) {
        let Some(summaries) = &self.summaries else {
            return;
        };

        let mut attached = 0usize;
        for entity in entities.iter_mut() {
            if entity.summary.as_deref().is_some_and(|s| !s.trim().is_empty()) {
                continue;
            }
            if let Some(text) = summaries.summary(&entity.id).await {
                entity.summary = Some(text);
                attached += 1;
            }
        }
        tracing::debug!(attached, "Summaries attached");
    }

    /// Request a vector for every entity and attach the good ones.
    ///
    /// Returns the identifiers that got no usable vector. In strict mode any
    /// such identifier aborts the run instead.
    async fn attach_embeddings(&self, entities: &mut [Entity]) -> Result<Vec<String>> {
        let dimension = self.embedder.dimension();
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_embeddings.max(1)));
        let mut handles = Vec::with_capacity(entities.len());

        for entity in entities.iter() {
            let embedder = self.embedder.clone();
            let semaphore = semaphore.clone();
            let request = EmbeddingRequest {
                identifier: entity.id.clone(),
                text: entity.embedding_text().to_string(),
            };
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    BuildError::Embedding {
                        identifier: request.identifier.clone(),
                        reason: e.to_string(),
                    }
                })?;
                embedder.embed(&request).await
            }));
        }

        let mut missing = Vec::new();
        for (entity, handle) in entities.iter_mut().zip(handles) {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(BuildError::Embedding {
                    identifier: entity.id.clone(),
                    reason: e.to_string(),
                }),
            };
            match outcome {
                Ok(vector) if vector.len() != dimension => {
                    tracing::warn!(
                        id = %entity.id,
                        expected = dimension,
                        found = vector.len(),
                        "Embedding has wrong dimension"
                    );
                    missing.push(entity.id.clone());
                }
                Ok(vector) if !vector.iter().all(|v| v.is_finite()) => {
                    tracing::warn!(id = %entity.id, "Embedding contains a non-finite value");
                    missing.push(entity.id.clone());
                }
                Ok(vector) => entity.embedding = Some(vector),
                Err(e) => {
                    tracing::warn!(id = %entity.id, error = %e, "No embedding for entity");
                    missing.push(entity.id.clone());
                }
            }
        }

        if !missing.is_empty() && self.options.strict_embeddings {
            return Err(BuildError::MissingEmbedding {
                identifiers: missing,
            });
        }
        Ok(missing)
    }
}

/// Set `source_genre` unless the fragment already carries one.
fn tag_genre(fragment: &mut EntityFragment, genre: &str) {
    let tagged = fragment
        .properties
        .get(SOURCE_GENRE)
        .is_some_and(|v| !v.trim().is_empty());
    if !tagged {
        fragment
            .properties
            .insert(SOURCE_GENRE.to_string(), genre.to_string());
    }
}

fn ensure_not_empty(graph: &ValidatedGraph) -> Result<()> {
    if graph.is_empty() {
        return Err(BuildError::EmptyGraph {
            nodes: graph.entities.len(),
            edges: graph.relations.len(),
        });
    }
    Ok(())
}

/// Fold every stage's counters into one report.
pub fn quality_report(
    store: StoreStats,
    index: IndexStats,
    validations: &[&ValidationReport],
    missing_embeddings: u64,
) -> QualityReport {
    let mut report = QualityReport {
        entities_received: store.received,
        malformed_entities: store.malformed,
        merge_collisions: store.merge_collisions,
        type_conflicts: store.type_conflicts,
        relations_received: index.received,
        malformed_relations: index.malformed,
        unresolved_endpoints: index.unresolved_endpoints,
        unknown_relation_types: index.unknown_types,
        duplicate_relations: index.duplicates,
        missing_embeddings,
        ..Default::default()
    };
    for v in validations {
        report.dangling_relations += v.dangling_relations as u64;
        report.incomplete_entities += v.incomplete_entities as u64;
        report.incomplete_relations += v.incomplete_relations as u64;
        report.orphan_entities += v.orphan_entities as u64;
    }
    report
}
