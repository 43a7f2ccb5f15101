use thiserror::Error;

/// A string that does not name a member of one of the fixed enumerations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Unknown relation type: {0}")]
    UnknownRelationType(String),
}

/// Why a single incoming record was rejected.
///
/// None of these halt a run: the record is dropped, logged, and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Malformed record: {reason}")]
    Malformed { reason: String },

    #[error("Unresolved endpoint {identifier} on relation {source_id} -> {target_id}")]
    UnresolvedEndpoint {
        identifier: String,
        source_id: String,
        target_id: String,
    },

    #[error("Unknown relation type {value:?} on relation {source_id} -> {target_id}")]
    UnknownRelationType {
        value: String,
        source_id: String,
        target_id: String,
    },
}

impl RecordError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
