//! Relation index: the ordered, deduplicated edge set.
//!
//! Each fragment is checked against the entity store. Relations with an
//! unresolved endpoint or an unrecognized type are dropped and counted.
//! Exact (source, target, type) repeats collapse into the first occurrence.
//! Relations are never mutated after insertion.

use std::collections::HashSet;

use serde::Serialize;
use taleweave_core::{RecordError, Relation, RelationFragment, RelationKey, RelationType};

use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub received: u64,
    pub malformed: u64,
    pub unresolved_endpoints: u64,
    pub unknown_types: u64,
    pub duplicates: u64,
}

impl IndexStats {
    /// Fragments that were discarded (duplicates are not drops).
    pub fn dropped(&self) -> u64 {
        self.malformed + self.unresolved_endpoints + self.unknown_types
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, Default)]
pub struct RelationIndex {
    relations: Vec<Relation>,
    seen: HashSet<RelationKey>,
    stats: IndexStats,
}

impl RelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and append a relation fragment.
    ///
    /// Endpoints are resolved before the type is checked, so a relation with
    /// both problems is counted as unresolved. Never creates entities.
    pub fn add(
        &mut self,
        store: &EntityStore,
        fragment: RelationFragment,
    ) -> Result<AddOutcome, RecordError> {
        self.stats.received += 1;

        match resolve(store, &fragment) {
            Ok(relation) => {
                let key = relation.key();
                if self.seen.contains(&key) {
                    self.stats.duplicates += 1;
                    return Ok(AddOutcome::Duplicate);
                }
                self.seen.insert(key);
                self.relations.push(relation);
                Ok(AddOutcome::Inserted)
            }
            Err(e) => {
                match &e {
                    RecordError::Malformed { .. } => self.stats.malformed += 1,
                    RecordError::UnresolvedEndpoint { .. } => self.stats.unresolved_endpoints += 1,
                    RecordError::UnknownRelationType { .. } => self.stats.unknown_types += 1,
                }
                tracing::debug!(error = %e, "Dropped relation");
                Err(e)
            }
        }
    }

    /// Accumulated relations in insertion order.
    pub fn all(&self) -> &[Relation] {
        &self.relations
    }

    pub fn into_relations(self) -> Vec<Relation> {
        self.relations
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }
}

fn resolve(store: &EntityStore, fragment: &RelationFragment) -> Result<Relation, RecordError> {
    let source = required(&fragment.source, "source")?;
    let target = required(&fragment.target, "target")?;

    for endpoint in [source, target] {
        if !store.contains(endpoint) {
            return Err(RecordError::UnresolvedEndpoint {
                identifier: endpoint.to_string(),
                source_id: source.to_string(),
                target_id: target.to_string(),
            });
        }
    }

    let raw_type = fragment.relation.as_deref().unwrap_or_default();
    let relation_type =
        raw_type
            .parse::<RelationType>()
            .map_err(|_| RecordError::UnknownRelationType {
                value: raw_type.to_string(),
                source_id: source.to_string(),
                target_id: target.to_string(),
            })?;

    Ok(Relation {
        source: source.to_string(),
        target: target.to_string(),
        relation_type,
        properties: fragment.properties.clone(),
    })
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, RecordError> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RecordError::malformed(format!("relation fragment has no {name}")))
}
