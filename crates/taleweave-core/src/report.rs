//! Data-quality counters collected across a run.

use serde::{Deserialize, Serialize};

/// Every non-fatal condition seen while building the graph.
///
/// Nothing counted here halts a run; the report is surfaced at the end so
/// operators can judge the quality of the sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityReport {
    // ── Entity store ──────────────────────────────────────────
    pub entities_received: u64,
    pub malformed_entities: u64,
    /// Upserts that hit an identifier already in the store.
    pub merge_collisions: u64,
    /// Merges where the incoming type differed from the stored one.
    pub type_conflicts: u64,

    // ── Relation index ────────────────────────────────────────
    pub relations_received: u64,
    pub malformed_relations: u64,
    pub unresolved_endpoints: u64,
    pub unknown_relation_types: u64,
    /// Exact (source, target, type) repeats, collapsed silently.
    pub duplicate_relations: u64,

    // ── Validation ────────────────────────────────────────────
    pub dangling_relations: u64,
    pub incomplete_entities: u64,
    /// Relations removed along with an incomplete endpoint.
    pub incomplete_relations: u64,
    pub orphan_entities: u64,

    // ── Encoding ──────────────────────────────────────────────
    pub missing_embeddings: u64,
}

impl QualityReport {
    /// Relations that did not make it into the graph (duplicates excluded).
    pub fn dropped_relations(&self) -> u64 {
        self.malformed_relations
            + self.unresolved_endpoints
            + self.unknown_relation_types
            + self.dangling_relations
            + self.incomplete_relations
    }

    /// Entities rejected at intake or pruned later.
    pub fn dropped_entities(&self) -> u64 {
        self.malformed_entities
            + self.incomplete_entities
            + self.orphan_entities
            + self.missing_embeddings
    }

    /// Whether anything at all was dropped or flagged.
    pub fn is_clean(&self) -> bool {
        self.dropped_relations() == 0 && self.dropped_entities() == 0 && self.type_conflicts == 0
    }
}
