//! taleweave-core: Shared types for the Taleweave narrative knowledge graph.
//!
//! This crate provides the foundational types used across all Taleweave components:
//! - Entity types (Motif, TaleType, GenreConcept, MechanicConcept)
//! - Relation types and their fixed numeric codes for tensor encoding
//! - Wire fragments as produced by the acquisition layer
//! - Data-quality counters surfaced at the end of a run
//! - Common error types

pub mod error;
pub mod report;
pub mod types;

pub use error::{ParseError, RecordError};
pub use report::QualityReport;
pub use types::{
    Entity, EntityFragment, EntityType, Properties, Relation, RelationFragment, RelationKey,
    RelationType,
};
