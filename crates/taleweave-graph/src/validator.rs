//! Structural validation and pruning.
//!
//! Input is the frozen output of the entity store and relation index (or a
//! reduced copy of it). Output satisfies both graph invariants at once:
//! every relation endpoint is a surviving entity, and every surviving entity
//! is referenced by at least one surviving relation.
//!
//! Passes, in order:
//! 1. Dangling prune: relations naming an entity not in the input are dropped.
//! 2. Completeness: entities with a blank identifier or label are removed,
//!    together with the relations touching them.
//! 3. Reachability: entities no surviving relation references are orphans.
//!
//! Removing an orphan cannot orphan anything else, since orphans have no
//! relations by definition, so no further pass is needed.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use taleweave_core::{Entity, EntityType, Relation, RelationType};

use crate::error::{GraphError, Result};

/// Counts of what validation removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub entities_in: usize,
    pub relations_in: usize,
    pub dangling_relations: usize,
    pub incomplete_entities: usize,
    /// Relations removed because an endpoint was incomplete.
    pub incomplete_relations: usize,
    pub orphan_entities: usize,
    /// Identifiers removed, in input order.
    pub removed_ids: Vec<String>,
}

/// A graph that satisfies the no-dangling-edge and no-orphan invariants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedGraph {
    /// Surviving entities in original order.
    pub entities: Vec<Entity>,
    /// Surviving relations in original order.
    pub relations: Vec<Relation>,
}

/// The result of one validation run.
#[derive(Debug, Clone)]
pub struct Validation {
    pub graph: ValidatedGraph,
    pub report: ValidationReport,
}

/// Structural statistics of a validated graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub weakly_connected_components: usize,
    pub nodes_by_type: BTreeMap<EntityType, usize>,
    pub edges_by_type: BTreeMap<RelationType, usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphValidator;

impl GraphValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, entities: Vec<Entity>, relations: Vec<Relation>) -> Validation {
        let mut report = ValidationReport {
            entities_in: entities.len(),
            relations_in: relations.len(),
            ..Default::default()
        };

        // Pass 1: dangling relations.
        let known: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        let (relations, dangling): (Vec<Relation>, Vec<Relation>) = relations
            .into_iter()
            .partition(|r| known.contains(r.source.as_str()) && known.contains(r.target.as_str()));
        for r in &dangling {
            tracing::warn!(
                source = %r.source,
                target = %r.target,
                relation = %r.relation_type,
                "Removed dangling relation"
            );
        }
        report.dangling_relations = dangling.len();

        // Pass 2: attribute completeness.
        let incomplete: HashSet<String> = entities
            .iter()
            .filter(|e| !e.has_required_fields())
            .map(|e| {
                tracing::warn!(
                    id = %e.id,
                    entity_type = %e.entity_type,
                    "Data-quality anomaly: entity missing required fields"
                );
                e.id.clone()
            })
            .collect();
        report.incomplete_entities = incomplete.len();

        let relations: Vec<Relation> = if incomplete.is_empty() {
            relations
        } else {
            let before = relations.len();
            let kept: Vec<Relation> = relations
                .into_iter()
                .filter(|r| !incomplete.contains(&r.source) && !incomplete.contains(&r.target))
                .collect();
            report.incomplete_relations = before - kept.len();
            kept
        };

        // Pass 3: reachability.
        let referenced: HashSet<&str> = relations
            .iter()
            .flat_map(|r| [r.source.as_str(), r.target.as_str()])
            .collect();

        let mut survivors = Vec::with_capacity(entities.len());
        for entity in entities {
            if incomplete.contains(&entity.id) {
                report.removed_ids.push(entity.id);
            } else if referenced.contains(entity.id.as_str()) {
                survivors.push(entity);
            } else {
                tracing::debug!(id = %entity.id, "Removed orphan entity");
                report.orphan_entities += 1;
                report.removed_ids.push(entity.id);
            }
        }

        tracing::info!(
            entities_in = report.entities_in,
            relations_in = report.relations_in,
            entities_out = survivors.len(),
            relations_out = relations.len(),
            dangling = report.dangling_relations,
            incomplete = report.incomplete_entities,
            incomplete_relations = report.incomplete_relations,
            orphans = report.orphan_entities,
            "Graph validation complete"
        );

        Validation {
            graph: ValidatedGraph {
                entities: survivors,
                relations,
            },
            report,
        }
    }
}

impl ValidatedGraph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() || self.relations.is_empty()
    }

    /// Re-check both structural invariants and identifier uniqueness.
    pub fn verify(&self) -> Result<()> {
        let mut ids = HashSet::with_capacity(self.entities.len());
        for entity in &self.entities {
            if !ids.insert(entity.id.as_str()) {
                return Err(GraphError::DuplicateEntity {
                    id: entity.id.clone(),
                });
            }
        }

        let mut referenced = HashSet::with_capacity(ids.len());
        for r in &self.relations {
            if !ids.contains(r.source.as_str()) || !ids.contains(r.target.as_str()) {
                return Err(GraphError::DanglingRelation {
                    source_id: r.source.clone(),
                    target_id: r.target.clone(),
                    relation: r.relation_type.to_string(),
                });
            }
            referenced.insert(r.source.as_str());
            referenced.insert(r.target.as_str());
        }

        match self.entities.iter().find(|e| !referenced.contains(e.id.as_str())) {
            Some(orphan) => Err(GraphError::OrphanEntity {
                id: orphan.id.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_type = BTreeMap::new();
        for e in &self.entities {
            *nodes_by_type.entry(e.entity_type).or_insert(0) += 1;
        }
        let mut edges_by_type = BTreeMap::new();
        for r in &self.relations {
            *edges_by_type.entry(r.relation_type).or_insert(0) += 1;
        }

        GraphStats {
            node_count: self.entities.len(),
            edge_count: self.relations.len(),
            weakly_connected_components: self.weakly_connected_components(),
            nodes_by_type,
            edges_by_type,
        }
    }

    /// Count weakly connected components with union-find over relation endpoints.
    fn weakly_connected_components(&self) -> usize {
        let position: HashMap<&str, usize> = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.as_str(), i))
            .collect();
        let mut parent: Vec<usize> = (0..self.entities.len()).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let mut components = self.entities.len();
        for r in &self.relations {
            let (Some(&a), Some(&b)) = (
                position.get(r.source.as_str()),
                position.get(r.target.as_str()),
            ) else {
                continue;
            };
            let (root_a, root_b) = (find(&mut parent, a), find(&mut parent, b));
            if root_a != root_b {
                parent[root_a] = root_b;
                components -= 1;
            }
        }
        components
    }
}
