//! Entity store: one canonical record per identifier.
//!
//! Fragments for the same identifier may arrive from any number of sources.
//! The first sighting creates the record; later sightings merge into it
//! field by field, where an incoming non-empty value wins and an empty or
//! missing value never overwrites a present one.

use std::collections::HashMap;

use serde::Serialize;
use taleweave_core::{Entity, EntityFragment, EntityType, Properties, RecordError};

use crate::error::{GraphError, Result};

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub received: u64,
    pub malformed: u64,
    pub merge_collisions: u64,
    pub type_conflicts: u64,
}

/// What an accepted upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged { type_conflict: bool },
}

/// Keyed entity store preserving first-insertion order.
#[derive(Debug, Default)]
pub struct EntityStore {
    /// Canonical records in first-insertion order.
    records: Vec<Entity>,
    /// Identifier → position in `records`.
    index: HashMap<String, usize>,
    stats: StoreStats,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a fragment.
    ///
    /// A fragment without an identifier or with a missing/unknown type is
    /// rejected and counted; the store never holds such a record.
    pub fn upsert(&mut self, fragment: EntityFragment) -> std::result::Result<UpsertOutcome, RecordError> {
        self.stats.received += 1;

        let (id, entity_type) = match required_fields(&fragment) {
            Ok(fields) => fields,
            Err(e) => {
                self.stats.malformed += 1;
                tracing::debug!(error = %e, "Rejected entity fragment");
                return Err(e);
            }
        };

        match self.index.get(&id) {
            Some(&pos) => {
                self.stats.merge_collisions += 1;
                let existing = &mut self.records[pos];
                let type_conflict = existing.entity_type != entity_type;
                if type_conflict {
                    self.stats.type_conflicts += 1;
                    tracing::warn!(
                        id = %id,
                        stored = %existing.entity_type,
                        incoming = %entity_type,
                        "Entity type conflict across sources; incoming type wins"
                    );
                }
                merge_into(existing, entity_type, fragment);
                Ok(UpsertOutcome::Merged { type_conflict })
            }
            None => {
                let entity = Entity {
                    id: id.clone(),
                    entity_type,
                    label: fragment.label.map(|l| l.trim().to_string()).unwrap_or_default(),
                    properties: non_empty_properties(fragment.properties),
                    summary: fragment.summary.filter(|s| !s.trim().is_empty()),
                    embedding: None,
                };
                self.index.insert(id, self.records.len());
                self.records.push(entity);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Look up the canonical record for an identifier.
    pub fn get(&self, id: &str) -> Result<&Entity> {
        self.index
            .get(id.trim())
            .map(|&pos| &self.records[pos])
            .ok_or_else(|| GraphError::NotFound { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id.trim())
    }

    /// All canonical records in first-insertion order. Call again to restart.
    pub fn all(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.records.iter()
    }

    /// Consume the store, yielding records in first-insertion order.
    pub fn into_entities(self) -> Vec<Entity> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}

/// Extract and check identifier and type.
fn required_fields(fragment: &EntityFragment) -> std::result::Result<(String, EntityType), RecordError> {
    let id = fragment
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RecordError::malformed("entity fragment has no identifier"))?;

    let raw_type = fragment
        .entity_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| RecordError::malformed(format!("entity {id} has no type")))?;

    let entity_type = raw_type
        .parse::<EntityType>()
        .map_err(|e| RecordError::malformed(format!("entity {id}: {e}")))?;

    Ok((id.to_string(), entity_type))
}

fn merge_into(existing: &mut Entity, entity_type: EntityType, fragment: EntityFragment) {
    existing.entity_type = entity_type;

    if let Some(label) = fragment.label.filter(|l| !l.trim().is_empty()) {
        existing.label = label.trim().to_string();
    }
    if let Some(summary) = fragment.summary.filter(|s| !s.trim().is_empty()) {
        existing.summary = Some(summary);
    }
    existing
        .properties
        .extend(non_empty_properties(fragment.properties));
}

/// Empty values count as absent.
fn non_empty_properties(properties: Properties) -> Properties {
    properties
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motif(id: &str, label: &str) -> EntityFragment {
        EntityFragment::new(id, EntityType::Motif, label)
    }

    #[test]
    fn test_insert_then_get() {
        let mut store = EntityStore::new();
        let outcome = store.upsert(motif("Q1", "Glass slipper")).unwrap();

        assert_eq!(outcome, UpsertOutcome::Inserted);
        let entity = store.get("Q1").unwrap();
        assert_eq!(entity.label, "Glass slipper");
        assert_eq!(entity.entity_type, EntityType::Motif);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = EntityStore::new();
        assert_eq!(
            store.get("Q404"),
            Err(GraphError::NotFound { id: "Q404".to_string() })
        );
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let fragment = motif("Q1", "Glass slipper")
            .with_property("atu_index", "510A")
            .with_summary("A lost shoe identifies the heroine.");

        let mut once = EntityStore::new();
        once.upsert(fragment.clone()).unwrap();

        let mut twice = EntityStore::new();
        twice.upsert(fragment.clone()).unwrap();
        twice.upsert(fragment).unwrap();

        assert_eq!(once.get("Q1").unwrap(), twice.get("Q1").unwrap());
        assert_eq!(twice.len(), 1);
        assert_eq!(twice.stats().merge_collisions, 1);
    }

    #[test]
    fn test_empty_never_overwrites() {
        let mut store = EntityStore::new();
        store.upsert(motif("A", "x")).unwrap();
        store
            .upsert(motif("A", "").with_property("note", "y"))
            .unwrap();

        let entity = store.get("A").unwrap();
        assert_eq!(entity.label, "x");
        assert_eq!(entity.properties.get("note").map(String::as_str), Some("y"));
    }

    #[test]
    fn test_incoming_non_empty_overrides() {
        let mut store = EntityStore::new();
        store
            .upsert(motif("A", "old").with_property("description", "first"))
            .unwrap();
        store
            .upsert(
                motif("A", "new")
                    .with_property("description", "second")
                    .with_property("wikipedia_title", ""),
            )
            .unwrap();

        let entity = store.get("A").unwrap();
        assert_eq!(entity.label, "new");
        assert_eq!(entity.properties.get("description").map(String::as_str), Some("second"));
        assert!(!entity.properties.contains_key("wikipedia_title"));
    }

    #[test]
    fn test_missing_label_in_later_fragment_keeps_label() {
        let mut store = EntityStore::new();
        store.upsert(motif("A", "kept")).unwrap();
        store
            .upsert(EntityFragment {
                id: Some("A".to_string()),
                entity_type: Some("Motif".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.get("A").unwrap().label, "kept");
    }

    #[test]
    fn test_malformed_fragments_rejected() {
        let mut store = EntityStore::new();

        let no_id = EntityFragment {
            entity_type: Some("Motif".to_string()),
            label: Some("nameless".to_string()),
            ..Default::default()
        };
        let no_type = EntityFragment {
            id: Some("Q2".to_string()),
            label: Some("typeless".to_string()),
            ..Default::default()
        };
        let bad_type = EntityFragment {
            id: Some("Q3".to_string()),
            entity_type: Some("Character".to_string()),
            ..Default::default()
        };

        assert!(matches!(store.upsert(no_id), Err(RecordError::Malformed { .. })));
        assert!(matches!(store.upsert(no_type), Err(RecordError::Malformed { .. })));
        assert!(matches!(store.upsert(bad_type), Err(RecordError::Malformed { .. })));

        assert!(store.is_empty());
        assert_eq!(store.stats().malformed, 3);
        assert_eq!(store.stats().received, 3);
    }

    #[test]
    fn test_type_conflict_flagged_and_incoming_wins() {
        let mut store = EntityStore::new();
        store.upsert(motif("Q1", "Cinderella")).unwrap();
        let outcome = store
            .upsert(EntityFragment::new("Q1", EntityType::TaleType, "Cinderella"))
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::Merged { type_conflict: true });
        assert_eq!(store.get("Q1").unwrap().entity_type, EntityType::TaleType);
        assert_eq!(store.stats().type_conflicts, 1);
    }

    #[test]
    fn test_all_preserves_first_insertion_order() {
        let mut store = EntityStore::new();
        for id in ["c", "a", "b"] {
            store.upsert(motif(id, id)).unwrap();
        }
        store.upsert(motif("a", "a again")).unwrap();

        let ids: Vec<&str> = store.all().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        // Restartable.
        assert_eq!(store.all().count(), 3);
    }

    #[test]
    fn test_identifiers_are_trimmed() {
        let mut store = EntityStore::new();
        store.upsert(motif("  Q7 ", "padded")).unwrap();
        assert!(store.contains("Q7"));
        assert_eq!(store.get(" Q7").unwrap().id, "Q7");
    }
}
