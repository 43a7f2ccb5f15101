//! Core domain types for the Taleweave knowledge graph.
//!
//! Fragments are what the acquisition layer hands us (loosely typed, possibly
//! incomplete). Entities and relations are the canonical, typed records the
//! graph crates build from them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ParseError;

/// Open-ended key/value properties. Ordered so every serialization is stable.
pub type Properties = BTreeMap<String, String>;

/// Dedup key for relations: (source, target, type).
pub type RelationKey = (String, String, RelationType);

// ── Entity Types ──────────────────────────────────────────────────

/// The fixed set of node kinds in the graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Motif,
    TaleType,
    GenreConcept,
    MechanicConcept,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Motif,
        EntityType::TaleType,
        EntityType::GenreConcept,
        EntityType::MechanicConcept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motif => "Motif",
            Self::TaleType => "TaleType",
            Self::GenreConcept => "GenreConcept",
            Self::MechanicConcept => "MechanicConcept",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ParseError;

    /// Accepts any casing and `_`/`-`/space separators: `tale_type`, `TaleType`, `TALE-TYPE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match squash(s).as_str() {
            "motif" => Ok(Self::Motif),
            "taletype" => Ok(Self::TaleType),
            "genreconcept" => Ok(Self::GenreConcept),
            "mechanicconcept" => Ok(Self::MechanicConcept),
            _ => Err(ParseError::UnknownEntityType(s.to_string())),
        }
    }
}

// ── Relation Types ────────────────────────────────────────────────

/// The fixed set of edge kinds. Each has a stable numeric code used as the
/// edge attribute in the tensor encoding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    IsA,
    AssociatedWith,
    InspiredBy,
    BasedOn,
    VariantOf,
    HasMechanic,
}

impl RelationType {
    pub const ALL: [RelationType; 6] = [
        RelationType::IsA,
        RelationType::AssociatedWith,
        RelationType::InspiredBy,
        RelationType::BasedOn,
        RelationType::VariantOf,
        RelationType::HasMechanic,
    ];

    /// Numeric class id. Codes 0-3 match datasets produced before
    /// `variant_of` and `has_mechanic` existed.
    pub fn code(&self) -> i64 {
        match self {
            Self::IsA => 0,
            Self::AssociatedWith => 1,
            Self::InspiredBy => 2,
            Self::BasedOn => 3,
            Self::VariantOf => 4,
            Self::HasMechanic => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsA => "is_a",
            Self::AssociatedWith => "associated_with",
            Self::InspiredBy => "inspired_by",
            Self::BasedOn => "based_on",
            Self::VariantOf => "variant_of",
            Self::HasMechanic => "has_mechanic",
        }
    }

    /// Map a structured-query property id (`P31`, `P279`, ...) to a relation type.
    pub fn from_property_id(property_id: &str) -> Option<Self> {
        match property_id.trim().to_ascii_uppercase().as_str() {
            "P31" | "P279" => Some(Self::IsA),
            "P737" => Some(Self::InspiredBy),
            "P144" => Some(Self::BasedOn),
            "P921" => Some(Self::AssociatedWith),
            _ => None,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rel) = Self::from_property_id(s) {
            return Ok(rel);
        }
        match squash(s).as_str() {
            "isa" => Ok(Self::IsA),
            "associatedwith" => Ok(Self::AssociatedWith),
            "inspiredby" => Ok(Self::InspiredBy),
            "basedon" => Ok(Self::BasedOn),
            "variantof" => Ok(Self::VariantOf),
            "hasmechanic" => Ok(Self::HasMechanic),
            _ => Err(ParseError::UnknownRelationType(s.to_string())),
        }
    }
}

/// Lowercase and drop separators so spellings compare equal.
fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

// ── Wire Fragments ────────────────────────────────────────────────

/// An entity record as delivered by a source. Every field may be missing;
/// the entity store decides what is acceptable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntityFragment {
    #[serde(default, alias = "identifier")]
    pub id: Option<String>,
    #[serde(default, rename = "type", alias = "entity_type")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_properties")]
    pub properties: Properties,
    #[serde(default)]
    pub summary: Option<String>,
}

impl EntityFragment {
    pub fn new(id: &str, entity_type: EntityType, label: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            entity_type: Some(entity_type.as_str().to_string()),
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }
}

/// A relation record as delivered by a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelationFragment {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default, alias = "type", alias = "relation_type")]
    pub relation: Option<String>,
    #[serde(default, deserialize_with = "lenient_properties")]
    pub properties: Properties,
}

impl RelationFragment {
    pub fn new(source: &str, target: &str, relation: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            relation: Some(relation.to_string()),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

/// Accept scalar JSON values for properties. Nulls are treated as absent,
/// numbers and booleans are stringified, nested values are kept as JSON text.
fn lenient_properties<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        })
        .collect())
}

// ── Canonical Records ─────────────────────────────────────────────

/// The single merged representation of an entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub label: String,
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Dense feature vector, attached after validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Entity {
    /// Text to embed: summary, then the `description` property, then the label.
    pub fn embedding_text(&self) -> &str {
        [
            self.summary.as_deref(),
            self.properties.get("description").map(String::as_str),
        ]
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())
        .unwrap_or(self.label.as_str())
    }

    /// Identifier and label must be non-blank; the type is guaranteed by construction.
    pub fn has_required_fields(&self) -> bool {
        !self.id.trim().is_empty() && !self.label.trim().is_empty()
    }
}

/// A directed, typed edge between two entity identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub source: String,
    pub target: String,
    #[serde(rename = "relation")]
    pub relation_type: RelationType,
    #[serde(default)]
    pub properties: Properties,
}

impl Relation {
    pub fn new(source: &str, target: &str, relation_type: RelationType) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            relation_type,
            properties: Properties::new(),
        }
    }

    pub fn key(&self) -> RelationKey {
        (self.source.clone(), self.target.clone(), self.relation_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_parses_any_spelling() {
        assert_eq!("tale_type".parse::<EntityType>(), Ok(EntityType::TaleType));
        assert_eq!("TaleType".parse::<EntityType>(), Ok(EntityType::TaleType));
        assert_eq!("MECHANIC-CONCEPT".parse::<EntityType>(), Ok(EntityType::MechanicConcept));
        assert!("Character".parse::<EntityType>().is_err());
    }

    #[test]
    fn relation_type_parses_spellings_and_property_ids() {
        assert_eq!("variant-of".parse::<RelationType>(), Ok(RelationType::VariantOf));
        assert_eq!("HAS_MECHANIC".parse::<RelationType>(), Ok(RelationType::HasMechanic));
        assert_eq!("P279".parse::<RelationType>(), Ok(RelationType::IsA));
        assert_eq!("p737".parse::<RelationType>(), Ok(RelationType::InspiredBy));
        assert_eq!(
            "P999".parse::<RelationType>(),
            Err(ParseError::UnknownRelationType("P999".to_string()))
        );
    }

    #[test]
    fn relation_codes_are_stable_and_unique() {
        let codes: Vec<i64> = RelationType::ALL.iter().map(|r| r.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
        for rel in RelationType::ALL {
            assert_eq!(RelationType::from_code(rel.code()), Some(rel));
        }
        assert_eq!(RelationType::from_code(6), None);
    }

    #[test]
    fn relation_type_serializes_snake_case() {
        let json = serde_json::to_string(&RelationType::VariantOf).unwrap();
        assert_eq!(json, "\"variant_of\"");
    }

    #[test]
    fn fragment_properties_are_lenient() {
        let json = r#"{
            "identifier": "Q1",
            "type": "motif",
            "label": "Glass slipper",
            "properties": {"atu_index": 510, "note": null, "description": "a shoe"}
        }"#;

        let fragment: EntityFragment = serde_json::from_str(json).unwrap();
        assert_eq!(fragment.id.as_deref(), Some("Q1"));
        assert_eq!(fragment.properties.get("atu_index").map(String::as_str), Some("510"));
        assert!(!fragment.properties.contains_key("note"));
    }

    #[test]
    fn embedding_text_falls_back() {
        let mut entity = Entity {
            id: "Q1".to_string(),
            entity_type: EntityType::Motif,
            label: "Glass slipper".to_string(),
            properties: Properties::new(),
            summary: Some("   ".to_string()),
            embedding: None,
        };
        assert_eq!(entity.embedding_text(), "Glass slipper");

        entity
            .properties
            .insert("description".to_string(), "a shoe of glass".to_string());
        assert_eq!(entity.embedding_text(), "a shoe of glass");

        entity.summary = Some("Cinderella's slipper".to_string());
        assert_eq!(entity.embedding_text(), "Cinderella's slipper");
    }
}
