//! Context types and the per-record metadata struct.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::now_secs;

/// The kind of context stored in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContextType {
    /// Something known about the world, a user, or an entity.
    Fact = 0,
    /// A stated or inferred preference.
    Preference = 1,
    /// Something that happened at a point in time.
    Event = 2,
    /// A fragment of dialogue or interaction.
    Conversation = 3,
}

impl ContextType {
    /// Convert a u8 value to a ContextType, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Fact),
            1 => Some(Self::Preference),
            2 => Some(Self::Event),
            3 => Some(Self::Conversation),
            _ => None,
        }
    }

    /// Return a human-readable name for this context type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Preference => "preference",
            Self::Event => "event",
            Self::Conversation => "conversation",
        }
    }

    /// Parse a context type from a string name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "fact" => Some(Self::Fact),
            "preference" => Some(Self::Preference),
            "event" => Some(Self::Event),
            "conversation" => Some(Self::Conversation),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-record metadata. One logical record per ID, shared across modalities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Creation/event time (Unix epoch seconds).
    pub timestamp: i64,
    /// Scoring weight in `[0, inf)`, typically `[0, 1]`. Zero marks a soft-deleted record.
    pub importance: f32,
    /// Kind of context.
    pub context_type: ContextType,
    /// Free-form origin string.
    pub source: String,
    /// Short payload or label.
    pub content: String,
    /// Opaque JSON string, matched by substring in tag filters.
    pub tags_json: String,
    /// Tenant/brand/org partition key.
    pub namespace_id: String,
    /// Subject key (user/product/...).
    pub entity_id: String,
    /// Dynamic attribute bag (keys unique).
    pub attributes: BTreeMap<String, String>,
    /// How many times this record was returned from search. Monotone.
    pub recall_count: u32,
    /// Unix epoch seconds of the most recent recall.
    pub last_recalled_at: u64,
    /// Cached view of the distinct outgoing-edge targets. Owned by the
    /// graph store; this field is derived, never authoritative.
    pub links: Vec<u64>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            timestamp: now_secs() as i64,
            importance: 1.0,
            context_type: ContextType::Fact,
            source: String::new(),
            content: String::new(),
            tags_json: String::new(),
            namespace_id: String::new(),
            entity_id: String::new(),
            attributes: BTreeMap::new(),
            recall_count: 0,
            last_recalled_at: 0,
            links: Vec::new(),
        }
    }
}

impl Metadata {
    /// Copy the mutable caller-supplied fields from `other` into `self`,
    /// keeping recall counters and the derived links cache.
    pub(crate) fn overwrite_preserving_state(&mut self, other: Metadata) {
        let recall_count = self.recall_count;
        let last_recalled_at = self.last_recalled_at;
        let links = std::mem::take(&mut self.links);
        *self = other;
        self.recall_count = recall_count;
        self.last_recalled_at = last_recalled_at;
        self.links = links;
    }
}

/// Builder for constructing Metadata records ergonomically.
pub struct MetadataBuilder {
    meta: Metadata,
}

impl MetadataBuilder {
    /// Create a new builder with the given context type and content.
    pub fn new(context_type: ContextType, content: impl Into<String>) -> Self {
        let mut meta = Metadata::default();
        meta.context_type = context_type;
        meta.content = content.into();
        Self { meta }
    }

    /// Set the creation timestamp (Unix epoch seconds).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.meta.timestamp = ts;
        self
    }

    /// Set the importance (clamped to be non-negative).
    pub fn importance(mut self, importance: f32) -> Self {
        self.meta.importance = importance.max(0.0);
        self
    }

    /// Set the origin string.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = source.into();
        self
    }

    /// Set the opaque tags JSON string.
    pub fn tags_json(mut self, tags: impl Into<String>) -> Self {
        self.meta.tags_json = tags.into();
        self
    }

    /// Set the namespace partition key.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.meta.namespace_id = ns.into();
        self
    }

    /// Set the entity subject key.
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.meta.entity_id = entity.into();
        self
    }

    /// Set one attribute key/value pair.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.attributes.insert(key.into(), value.into());
        self
    }

    /// Build the Metadata record.
    pub fn build(self) -> Metadata {
        self.meta
    }
}
