//! Error types for the taleweave-tensor crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Refusing to encode an empty graph ({nodes} nodes, {edges} edges)")]
    EmptyGraph { nodes: usize, edges: usize },

    #[error("Missing embedding for {} entities: {}", .identifiers.len(), .identifiers.join(", "))]
    MissingEmbedding { identifiers: Vec<String> },

    #[error("Embedding for {id} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Feature dimension must be at least 1")]
    ZeroDimension,

    #[error("Embedding for {id} contains a non-finite value at position {position}")]
    NonFiniteFeature { id: String, position: usize },

    #[error("Relation {source_id} -> {target_id} references an entity outside the graph")]
    UnknownEndpoint { source_id: String, target_id: String },

    #[error("Duplicate entity identifier: {id}")]
    DuplicateIdentifier { id: String },

    #[error("Tensor serialization failed: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EncodeError>;
