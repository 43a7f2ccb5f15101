//! Run ledger helpers for build sessions.

use std::path::Path;

use taleweave_ledger::{FileLedgerStore, LedgerStore, RunRecord, RunSession};

use crate::config::BuildConfig;
use crate::export::ExportSummary;
use crate::pipeline::{BuildOutput, ValidationSummary};

/// Open a ledger session with the configuration snapshot as context.
pub fn start_session(intent: &str, config: &BuildConfig) -> RunSession {
    let mut session = RunSession::new(intent);
    session.set_context(serde_json::to_value(config).unwrap_or_default());
    session
}

/// Record each stage of a successful build.
pub fn record_build(session: &mut RunSession, output: &BuildOutput, export: &ExportSummary) {
    let q = &output.quality;
    session.record_stage(
        "merge",
        &format!(
            "Merged {} entity and {} relation fragments",
            q.entities_received, q.relations_received
        ),
        serde_json::json!({
            "merge_collisions": q.merge_collisions,
            "type_conflicts": q.type_conflicts,
            "malformed_entities": q.malformed_entities,
            "malformed_relations": q.malformed_relations,
            "unresolved_endpoints": q.unresolved_endpoints,
            "unknown_relation_types": q.unknown_relation_types,
            "duplicate_relations": q.duplicate_relations,
            "categories": output.categories,
        }),
        true,
    );
    session.record_stage(
        "validate",
        &format!(
            "Removed {} orphan and {} incomplete entities",
            q.orphan_entities, q.incomplete_entities
        ),
        serde_json::json!({
            "dangling_relations": q.dangling_relations,
            "orphan_entities": q.orphan_entities,
            "incomplete_entities": q.incomplete_entities,
            "incomplete_relations": q.incomplete_relations,
        }),
        true,
    );
    session.record_stage(
        "embed",
        &format!("Dropped {} entities without embeddings", output.missing_embeddings.len()),
        serde_json::json!({ "missing": output.missing_embeddings }),
        true,
    );
    session.record_stage(
        "encode",
        &format!(
            "Encoded {} nodes and {} edges",
            output.stats.node_count, output.stats.edge_count
        ),
        serde_json::json!({
            "num_nodes": output.tensors.num_nodes(),
            "num_edges": output.tensors.num_edges(),
            "feature_dim": output.tensors.feature_dim,
            "weakly_connected_components": output.stats.weakly_connected_components,
            "tensor_checksum": export.tensor_checksum,
        }),
        true,
    );

    session.set_quality(output.quality.clone());
    for artifact in &export.artifacts {
        session.add_artifact(&artifact.name, artifact.bytes, &artifact.checksum);
    }
}

/// Record a validate-only run.
pub fn record_validation(session: &mut RunSession, summary: &ValidationSummary) {
    session.record_stage(
        "validate",
        &format!(
            "Validated graph: {} nodes, {} edges",
            summary.stats.node_count, summary.stats.edge_count
        ),
        serde_json::to_value(&summary.stats).unwrap_or_default(),
        true,
    );
    session.set_quality(summary.quality.clone());
}

/// Finalize a successful session and store it. Storage failures are logged.
pub fn finalize_and_store(session: RunSession, ledger_dir: &Path) -> Option<RunRecord> {
    store(session.finalize(), ledger_dir)
}

/// Close a session that aborted with `error` and store it.
pub fn fail_and_store(
    mut session: RunSession,
    stage: &str,
    error: &str,
    ledger_dir: &Path,
) -> Option<RunRecord> {
    session.record_stage(
        stage,
        &format!("Run failed: {error}"),
        serde_json::json!({ "error": error }),
        false,
    );
    store(session.fail(error), ledger_dir)
}

fn store(
    record: Result<RunRecord, serde_json::Error>,
    ledger_dir: &Path,
) -> Option<RunRecord> {
    let record = match record {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to seal run record");
            return None;
        }
    };

    match FileLedgerStore::new(ledger_dir) {
        Ok(store) => match store.save(&record) {
            Ok(path) => {
                tracing::info!(run_id = %record.id, path = %path.display(), "Run recorded in ledger");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to store run record"),
        },
        Err(e) => tracing::warn!(error = %e, "Failed to initialize ledger store"),
    }
    Some(record)
}
