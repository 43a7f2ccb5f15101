//! Error types for the taleweave-build crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Source {name} failed: {reason}")]
    Source { name: String, reason: String },

    #[error("Embedding failed for {identifier}: {reason}")]
    Embedding { identifier: String, reason: String },

    #[error("Missing embedding for {} entities: {}", .identifiers.len(), .identifiers.join(", "))]
    MissingEmbedding { identifiers: Vec<String> },

    #[error("Refusing to emit an empty graph ({nodes} nodes, {edges} edges)")]
    EmptyGraph { nodes: usize, edges: usize },

    #[error("Graph error: {0}")]
    Graph(#[from] taleweave_graph::GraphError),

    #[error("Encode error: {0}")]
    Encode(#[from] taleweave_tensor::EncodeError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] taleweave_ledger::StoreError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    pub fn source_failed(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::Source {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
