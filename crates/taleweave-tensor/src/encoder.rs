//! Dense index assignment and tensor construction.
//!
//! Node order is the order of `ValidatedGraph::entities`, which the store and
//! validator keep in first-insertion order. That order is already total over
//! unique identifiers, so no secondary sort key exists. Edge order is the
//! relation insertion order: edge `e` is relation `e`.

use std::collections::HashMap;

use taleweave_graph::ValidatedGraph;

use crate::error::{EncodeError, Result};

/// The tensor form of a validated graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphTensors {
    /// Dense index → original identifier.
    pub node_ids: Vec<String>,
    /// Original identifier → dense index.
    pub node_index: HashMap<String, usize>,
    /// Row width D of the feature matrix.
    pub feature_dim: usize,
    /// Node feature matrix [N, D], row-major.
    pub features: Vec<f32>,
    /// Edge sources [E] (row 0 of `edge_index`).
    pub edge_sources: Vec<i64>,
    /// Edge targets [E] (row 1 of `edge_index`).
    pub edge_targets: Vec<i64>,
    /// Relation type code per edge [E].
    pub edge_types: Vec<i64>,
}

impl GraphTensors {
    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_types.len()
    }

    /// Feature row for the node at `index`.
    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.feature_dim;
        &self.features[start..start + self.feature_dim]
    }

    /// (source index, target index) of edge `e`.
    pub fn edge(&self, e: usize) -> (usize, usize) {
        (self.edge_sources[e] as usize, self.edge_targets[e] as usize)
    }
}

/// Encodes validated graphs. Stateless apart from the expected dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct TensorEncoder {
    /// When set, every vector must have exactly this length. Otherwise the
    /// first node's vector fixes D.
    feature_dim: Option<usize>,
}

impl TensorEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature_dim(mut self, dim: usize) -> Self {
        self.feature_dim = Some(dim);
        self
    }

    /// Encode a validated graph.
    ///
    /// Every entity must carry an embedding; missing vectors are a
    /// precondition failure, never silently zero-filled.
    pub fn encode(&self, graph: &ValidatedGraph) -> Result<GraphTensors> {
        if graph.is_empty() {
            return Err(EncodeError::EmptyGraph {
                nodes: graph.entities.len(),
                edges: graph.relations.len(),
            });
        }

        let missing: Vec<String> = graph
            .entities
            .iter()
            .filter(|e| e.embedding.is_none())
            .map(|e| e.id.clone())
            .collect();
        if !missing.is_empty() {
            return Err(EncodeError::MissingEmbedding {
                identifiers: missing,
            });
        }

        let n = graph.entities.len();
        let dim = match self.feature_dim {
            Some(dim) => dim,
            None => graph.entities[0].embedding.as_ref().map_or(0, Vec::len),
        };
        if dim == 0 {
            return Err(EncodeError::ZeroDimension);
        }

        let mut node_ids = Vec::with_capacity(n);
        let mut node_index = HashMap::with_capacity(n);
        let mut features = Vec::with_capacity(n * dim);

        for (i, entity) in graph.entities.iter().enumerate() {
            if node_index.insert(entity.id.clone(), i).is_some() {
                return Err(EncodeError::DuplicateIdentifier {
                    id: entity.id.clone(),
                });
            }
            node_ids.push(entity.id.clone());

            let vector = entity.embedding.as_deref().unwrap_or_default();
            if vector.len() != dim {
                return Err(EncodeError::DimensionMismatch {
                    id: entity.id.clone(),
                    expected: dim,
                    found: vector.len(),
                });
            }
            if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
                return Err(EncodeError::NonFiniteFeature {
                    id: entity.id.clone(),
                    position,
                });
            }
            features.extend_from_slice(vector);
        }

        let e = graph.relations.len();
        let mut edge_sources = Vec::with_capacity(e);
        let mut edge_targets = Vec::with_capacity(e);
        let mut edge_types = Vec::with_capacity(e);

        for relation in &graph.relations {
            let (Some(&src), Some(&tgt)) = (
                node_index.get(&relation.source),
                node_index.get(&relation.target),
            ) else {
                return Err(EncodeError::UnknownEndpoint {
                    source_id: relation.source.clone(),
                    target_id: relation.target.clone(),
                });
            };
            edge_sources.push(src as i64);
            edge_targets.push(tgt as i64);
            edge_types.push(relation.relation_type.code());
        }

        tracing::debug!(nodes = n, edges = e, feature_dim = dim, "Encoded graph tensors");

        Ok(GraphTensors {
            node_ids,
            node_index,
            feature_dim: dim,
            features,
            edge_sources,
            edge_targets,
            edge_types,
        })
    }
}
