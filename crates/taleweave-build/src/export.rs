//! Artifact export: the human-readable dataset and the tensor files.
//!
//! Files written to the output directory:
//! - `graph.safetensors`: `x`, `edge_index`, `edge_type`
//! - `id2idx.json`: dense index ↔ identifier table
//! - `narrative_graph.json`: nodes, edges and run metadata

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use taleweave_core::{Entity, EntityType, Properties, QualityReport, Relation, RelationType};
use taleweave_tensor::{checksum, IndexTable};

use crate::error::Result;
use crate::pipeline::BuildOutput;

pub const TENSOR_FILE: &str = "graph.safetensors";
pub const INDEX_FILE: &str = "id2idx.json";
pub const DATASET_FILE: &str = "narrative_graph.json";

#[derive(Debug, Serialize)]
pub struct DatasetMeta<'a> {
    pub exporter_version: &'static str,
    pub export_timestamp: String,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub feature_dim: usize,
    pub categories: &'a [String],
    pub weakly_connected_components: usize,
    pub nodes_by_type: &'a BTreeMap<EntityType, usize>,
    pub edges_by_type: &'a BTreeMap<RelationType, usize>,
    pub quality: &'a QualityReport,
    pub tensor_checksum: &'a str,
}

/// A node as it appears in the dataset; the feature vector lives in the
/// tensor file only.
#[derive(Debug, Serialize)]
pub struct NodeRecord<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub label: &'a str,
    pub properties: &'a Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
}

impl<'a> From<&'a Entity> for NodeRecord<'a> {
    fn from(entity: &'a Entity) -> Self {
        Self {
            id: &entity.id,
            entity_type: entity.entity_type,
            label: &entity.label,
            properties: &entity.properties,
            summary: entity.summary.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatasetDocument<'a> {
    pub meta: DatasetMeta<'a>,
    /// Nodes in dense index order.
    pub nodes: Vec<NodeRecord<'a>>,
    /// Edges in edge-index order.
    pub edges: &'a [Relation],
}

/// One file written by `write_artifacts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenArtifact {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub artifacts: Vec<WrittenArtifact>,
    pub tensor_checksum: String,
}

/// Write all three artifacts into `output_dir`, creating it if needed.
pub async fn write_artifacts(output: &BuildOutput, output_dir: &Path) -> Result<ExportSummary> {
    tokio::fs::create_dir_all(output_dir).await?;

    let tensor_bytes = output.tensors.to_safetensors()?;
    let tensor_checksum = checksum(&tensor_bytes);

    let index = IndexTable::build(&output.graph, &output.tensors);
    let index_bytes = serde_json::to_vec_pretty(&index)?;

    let document = DatasetDocument {
        meta: DatasetMeta {
            exporter_version: env!("CARGO_PKG_VERSION"),
            export_timestamp: Utc::now().to_rfc3339(),
            total_nodes: output.stats.node_count,
            total_edges: output.stats.edge_count,
            feature_dim: output.tensors.feature_dim,
            categories: &output.categories,
            weakly_connected_components: output.stats.weakly_connected_components,
            nodes_by_type: &output.stats.nodes_by_type,
            edges_by_type: &output.stats.edges_by_type,
            quality: &output.quality,
            tensor_checksum: &tensor_checksum,
        },
        nodes: output.graph.entities.iter().map(NodeRecord::from).collect(),
        edges: &output.graph.relations,
    };
    let dataset_bytes = serde_json::to_vec_pretty(&document)?;

    let mut artifacts = Vec::with_capacity(3);
    for (name, bytes) in [
        (TENSOR_FILE, tensor_bytes),
        (INDEX_FILE, index_bytes),
        (DATASET_FILE, dataset_bytes),
    ] {
        let path = output_dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(file = %path.display(), bytes = bytes.len(), "Artifact written");
        artifacts.push(WrittenArtifact {
            name: name.to_string(),
            path,
            bytes: bytes.len() as u64,
            checksum: checksum(&bytes),
        });
    }

    Ok(ExportSummary {
        artifacts,
        tensor_checksum,
    })
}
