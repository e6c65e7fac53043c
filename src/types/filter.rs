//! Search filters — a conjunction of optional metadata predicates.

use std::collections::BTreeMap;

use super::metadata::{ContextType, Metadata};

/// A conjunction of optional predicates over record metadata.
///
/// Applied to ANN candidates before top-k truncation. An empty filter
/// matches everything.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Exact namespace match.
    pub namespace_id: Option<String>,
    /// Exact entity match.
    pub entity_id: Option<String>,
    /// Exact source match.
    pub source: Option<String>,
    /// Source must start with this prefix.
    pub source_prefix: Option<String>,
    /// Importance must be >= this value.
    pub importance_gte: Option<f32>,
    /// Every pair must match the record's attribute bag exactly.
    pub attributes_match: Option<BTreeMap<String, String>>,
    /// Timestamp must be >= this value.
    pub timestamp_after: Option<i64>,
    /// Timestamp must be <= this value.
    pub timestamp_before: Option<i64>,
    /// Every entry must appear as a substring of `tags_json`.
    pub tags_contains: Option<Vec<String>>,
    /// Record type must be one of these.
    pub types: Option<Vec<ContextType>>,
}

impl SearchFilter {
    /// True when no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.namespace_id.is_none()
            && self.entity_id.is_none()
            && self.source.is_none()
            && self.source_prefix.is_none()
            && self.importance_gte.is_none()
            && self.attributes_match.is_none()
            && self.timestamp_after.is_none()
            && self.timestamp_before.is_none()
            && self.tags_contains.is_none()
            && self.types.is_none()
    }

    /// Evaluate the conjunction against one record, cheapest predicates first.
    pub fn matches(&self, meta: &Metadata) -> bool {
        if let Some(ns) = &self.namespace_id {
            if meta.namespace_id != *ns {
                return false;
            }
        }
        if let Some(eid) = &self.entity_id {
            if meta.entity_id != *eid {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if meta.source != *source {
                return false;
            }
        }
        if let Some(prefix) = &self.source_prefix {
            if !meta.source.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.importance_gte {
            if meta.importance < min {
                return false;
            }
        }
        if let Some(attrs) = &self.attributes_match {
            for (key, val) in attrs {
                if meta.attributes.get(key) != Some(val) {
                    return false;
                }
            }
        }
        if let Some(after) = self.timestamp_after {
            if meta.timestamp < after {
                return false;
            }
        }
        if let Some(before) = self.timestamp_before {
            if meta.timestamp > before {
                return false;
            }
        }
        if let Some(tags) = &self.tags_contains {
            for tag in tags {
                if !meta.tags_json.contains(tag.as_str()) {
                    return false;
                }
            }
        }
        if let Some(types) = &self.types {
            if !types.contains(&meta.context_type) {
                return false;
            }
        }
        true
    }
}

/// Chainable builder for `SearchFilter`.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    filter: SearchFilter,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.filter.namespace_id = Some(ns.into());
        self
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.filter.entity_id = Some(entity.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.filter.source = Some(source.into());
        self
    }

    pub fn source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filter.source_prefix = Some(prefix.into());
        self
    }

    pub fn min_importance(mut self, value: f32) -> Self {
        self.filter.importance_gte = Some(value);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter
            .attributes_match
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn after(mut self, ts: i64) -> Self {
        self.filter.timestamp_after = Some(ts);
        self
    }

    pub fn before(mut self, ts: i64) -> Self {
        self.filter.timestamp_before = Some(ts);
        self
    }

    pub fn contains_tag(mut self, tag: impl Into<String>) -> Self {
        self.filter
            .tags_contains
            .get_or_insert_with(Vec::new)
            .push(tag.into());
        self
    }

    pub fn types(mut self, types: Vec<ContextType>) -> Self {
        self.filter.types = Some(types);
        self
    }

    pub fn build(self) -> SearchFilter {
        self.filter
    }
}
