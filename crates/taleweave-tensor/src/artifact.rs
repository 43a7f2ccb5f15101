//! On-disk forms of the tensor encoding.
//!
//! The tensors are written in the safetensors format under the names
//! `x` (f32 [N, D]), `edge_index` (i64 [2, E]), and `edge_type` (i64 [E]),
//! all little-endian. The index table that maps dense indices back to
//! identifiers travels alongside as JSON.

use std::collections::{BTreeMap, HashMap};

use safetensors::tensor::{Dtype, TensorView};
use serde::{Deserialize, Serialize};
use taleweave_core::{EntityType, RelationType};
use taleweave_graph::ValidatedGraph;

use crate::encoder::GraphTensors;
use crate::error::Result;

pub const FEATURES: &str = "x";
pub const EDGE_INDEX: &str = "edge_index";
pub const EDGE_TYPE: &str = "edge_type";

/// The only `__metadata__` key. A single key keeps the header byte-stable.
pub const METADATA_KEY: &str = "taleweave";

/// Shape summary and relation code table stored in the tensor header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorHeader {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub feature_dim: usize,
    pub relation_types: Vec<RelationCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCode {
    pub code: i64,
    pub name: String,
}

impl RelationCode {
    pub fn table() -> Vec<RelationCode> {
        RelationType::ALL
            .iter()
            .map(|r| RelationCode {
                code: r.code(),
                name: r.as_str().to_string(),
            })
            .collect()
    }
}

impl GraphTensors {
    pub fn header(&self) -> TensorHeader {
        TensorHeader {
            num_nodes: self.num_nodes(),
            num_edges: self.num_edges(),
            feature_dim: self.feature_dim,
            relation_types: RelationCode::table(),
        }
    }

    /// Serialize to safetensors bytes. Identical tensors give identical bytes.
    pub fn to_safetensors(&self) -> Result<Vec<u8>> {
        let x_bytes: Vec<u8> = self.features.iter().flat_map(|v| v.to_le_bytes()).collect();
        let edge_bytes: Vec<u8> = self
            .edge_sources
            .iter()
            .chain(&self.edge_targets)
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let type_bytes: Vec<u8> = self.edge_types.iter().flat_map(|v| v.to_le_bytes()).collect();

        let (n, d, e) = (self.num_nodes(), self.feature_dim, self.num_edges());
        let tensors = vec![
            (FEATURES, TensorView::new(Dtype::F32, vec![n, d], &x_bytes)?),
            (EDGE_INDEX, TensorView::new(Dtype::I64, vec![2, e], &edge_bytes)?),
            (EDGE_TYPE, TensorView::new(Dtype::I64, vec![e], &type_bytes)?),
        ];

        let metadata = Some(HashMap::from([(
            METADATA_KEY.to_string(),
            serde_json::to_string(&self.header())?,
        )]));

        Ok(safetensors::serialize(tensors, &metadata)?)
    }
}

/// One row of the index ↔ identifier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub index: usize,
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub label: String,
}

/// Mapping between dense indices and original identifiers, required to read
/// any model output back against the source records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTable {
    pub nodes: Vec<IndexEntry>,
    pub id2idx: BTreeMap<String, usize>,
    pub relation_types: Vec<RelationCode>,
}

impl IndexTable {
    pub fn build(graph: &ValidatedGraph, tensors: &GraphTensors) -> Self {
        let nodes: Vec<IndexEntry> = graph
            .entities
            .iter()
            .filter_map(|e| {
                tensors.node_index.get(&e.id).map(|&index| IndexEntry {
                    index,
                    id: e.id.clone(),
                    entity_type: e.entity_type,
                    label: e.label.clone(),
                })
            })
            .collect();
        let id2idx = nodes.iter().map(|n| (n.id.clone(), n.index)).collect();

        Self {
            nodes,
            id2idx,
            relation_types: RelationCode::table(),
        }
    }
}

/// BLAKE3 hex digest of an artifact, used as its cache key.
pub fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
