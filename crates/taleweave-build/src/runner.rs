//! Config-driven entry points used by the CLI.

use std::sync::Arc;

use taleweave_ledger::{FileLedgerStore, LedgerStore, RunQuery, RunRecord};
use taleweave_tensor::checksum;

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::export::{self, ExportSummary};
use crate::ledger;
use crate::pipeline::{BuildOutput, GraphPipeline, PipelineOptions, ValidationSummary};
use crate::sources::{
    EmbeddingSource, HashingEmbedder, JsonFileSource, JsonSummaryFile, PrecomputedEmbeddings,
};

/// Outcome of a build run.
#[derive(Debug)]
pub struct BuildReport {
    pub output: BuildOutput,
    pub export: ExportSummary,
    pub run_id: Option<String>,
}

/// Assemble a pipeline from configuration, loading summary and embedding files.
pub async fn pipeline_from_config(config: &BuildConfig) -> Result<GraphPipeline> {
    config.validate()?;

    let embedder: Arc<dyn EmbeddingSource> = match &config.embeddings_path {
        Some(path) => {
            Arc::new(PrecomputedEmbeddings::load(path, config.embedding_dim).await?)
        }
        None => Arc::new(HashingEmbedder::new(config.embedding_dim)),
    };

    let mut pipeline = GraphPipeline::new(embedder).with_options(PipelineOptions {
        strict_embeddings: config.strict_embeddings,
        max_concurrent_fetches: config.max_concurrent_fetches,
        max_concurrent_embeddings: config.max_concurrent_embeddings,
    });

    for source in config.active_sources() {
        pipeline = pipeline.with_source(Arc::new(JsonFileSource::new(
            &source.display_name(),
            &source.path,
            source.genre.clone(),
        )));
    }
    if pipeline.source_names().is_empty() {
        return Err(BuildError::Config("no enabled sources configured".into()));
    }

    if let Some(path) = &config.summaries_path {
        let summaries = JsonSummaryFile::load(path).await?;
        tracing::info!(path = %path.display(), count = summaries.len(), "Loaded summaries");
        pipeline = pipeline.with_summaries(Arc::new(summaries));
    }

    Ok(pipeline)
}

/// Full build: pipeline, artifacts, ledger record.
pub async fn run_build(config: &BuildConfig) -> Result<BuildReport> {
    let mut session = ledger::start_session("build", config);

    let result = async {
        let pipeline = pipeline_from_config(config).await?;
        let output = pipeline.run().await?;
        let export = export::write_artifacts(&output, &config.output_dir).await?;
        Ok::<_, BuildError>((output, export))
    }
    .await;

    match result {
        Ok((output, export)) => {
            ledger::record_build(&mut session, &output, &export);
            let record = ledger::finalize_and_store(session, &config.ledger_dir);

            tracing::info!(
                nodes = output.stats.node_count,
                edges = output.stats.edge_count,
                dropped_entities = output.quality.dropped_entities(),
                dropped_relations = output.quality.dropped_relations(),
                tensor_checksum = %export.tensor_checksum,
                "Build complete"
            );

            Ok(BuildReport {
                output,
                export,
                run_id: record.map(|r| r.id.to_string()),
            })
        }
        Err(e) => {
            ledger::fail_and_store(session, "build", &e.to_string(), &config.ledger_dir);
            Err(e)
        }
    }
}

/// Merge and validate only; nothing is written except the ledger record.
pub async fn run_validate(config: &BuildConfig) -> Result<ValidationSummary> {
    let mut session = ledger::start_session("validate", config);

    let result = async {
        let pipeline = pipeline_from_config(config).await?;
        pipeline.validate_only().await
    }
    .await;

    match result {
        Ok(summary) => {
            ledger::record_validation(&mut session, &summary);
            ledger::finalize_and_store(session, &config.ledger_dir);
            Ok(summary)
        }
        Err(e) => {
            ledger::fail_and_store(session, "validate", &e.to_string(), &config.ledger_dir);
            Err(e)
        }
    }
}

/// Re-read a written tensor file and compare it with a recorded checksum.
pub async fn tensor_checksum_matches(config: &BuildConfig, expected: &str) -> Result<bool> {
    let bytes = tokio::fs::read(config.output_dir.join(export::TENSOR_FILE)).await?;
    Ok(checksum(&bytes) == expected)
}

/// Recorded runs under the configured ledger directory, newest first.
pub fn list_runs(config: &BuildConfig, query: &RunQuery) -> Result<Vec<RunRecord>> {
    let store = FileLedgerStore::new(&config.ledger_dir)?;
    Ok(store.list(query)?)
}
