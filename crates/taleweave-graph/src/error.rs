//! Error types for the taleweave-graph crate.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Entity not found: {id}")]
    NotFound { id: String },

    #[error("Dangling relation {source_id} -> {target_id} ({relation})")]
    DanglingRelation {
        source_id: String,
        target_id: String,
        relation: String,
    },

    #[error("Orphan entity: {id} is not referenced by any relation")]
    OrphanEntity { id: String },

    #[error("Duplicate entity identifier: {id}")]
    DuplicateEntity { id: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;
