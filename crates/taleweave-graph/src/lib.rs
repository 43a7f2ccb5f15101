//! Taleweave Graph: in-memory construction of the narrative knowledge graph.
//!
//! Records flow one way through this crate:
//! fragments → [`EntityStore`] → [`RelationIndex`] → [`GraphValidator`].
//! Nothing here performs I/O; the stores are single-owner and must be
//! frozen (no further upserts) before validation runs.

pub mod error;
pub mod relations;
pub mod store;
pub mod validator;

pub use error::{GraphError, Result};
pub use relations::{AddOutcome, IndexStats, RelationIndex};
pub use store::{EntityStore, StoreStats, UpsertOutcome};
pub use validator::{GraphStats, GraphValidator, ValidatedGraph, Validation, ValidationReport};
