//! Relation types and the typed, weighted edge structs.

use serde::{Deserialize, Serialize};

/// The relationship between two records in the context graph.
///
/// Unknown relation names are carried through verbatim as `Other`; the
/// engine never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    RelatedTo,
    DerivedFrom,
    CausedBy,
    Contradicts,
    Supports,
    Precedes,
    PartOf,
    References,
    /// Cross-modality link between two representations of the same thing.
    MultimodalOf,
    /// Unrecognized relation, kept as an opaque string.
    Other(String),
}

impl RelType {
    /// Return the wire name of this relation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::RelatedTo => "related_to",
            Self::DerivedFrom => "derived_from",
            Self::CausedBy => "caused_by",
            Self::Contradicts => "contradicts",
            Self::Supports => "supports",
            Self::Precedes => "precedes",
            Self::PartOf => "part_of",
            Self::References => "references",
            Self::MultimodalOf => "multimodal_of",
            Self::Other(name) => name,
        }
    }

    /// Parse a relation from its wire name. Never fails: unrecognized
    /// names become `Other`.
    pub fn parse(name: &str) -> Self {
        match name {
            "related_to" => Self::RelatedTo,
            "derived_from" => Self::DerivedFrom,
            "caused_by" => Self::CausedBy,
            "contradicts" => Self::Contradicts,
            "supports" => Self::Supports,
            "precedes" => Self::Precedes,
            "part_of" => Self::PartOf,
            "references" => Self::References,
            "multimodal_of" => Self::MultimodalOf,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Default for RelType {
    fn default() -> Self {
        Self::RelatedTo
    }
}

impl std::fmt::Display for RelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed outgoing edge, stored under its source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Destination record ID.
    pub target_id: u64,
    /// Relation type.
    pub rel_type: RelType,
    /// Strength of the relationship (0.0 = weak, 1.0 = strong).
    pub weight: f32,
}

impl Edge {
    /// Create a new edge with weight clamped to [0.0, 1.0].
    pub fn new(target_id: u64, rel_type: RelType, weight: f32) -> Self {
        Self {
            target_id,
            rel_type,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

/// A reverse-index entry: who points at a given record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEdge {
    /// Origin record ID.
    pub source_id: u64,
    /// Relation type.
    pub rel_type: RelType,
    /// Strength of the relationship.
    pub weight: f32,
}
