//! The metadata map and its recall/importance update operations.

use std::collections::HashMap;

use crate::types::{now_secs, FeatherError, FeatherResult, Metadata};

/// Mapping from record ID to its metadata. Writes are idempotent upserts.
#[derive(Default)]
pub struct MetadataStore {
    records: HashMap<u64, Metadata>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record.
    pub fn get(&self, id: u64) -> Option<&Metadata> {
        self.records.get(&id)
    }

    /// Insert a default record if the ID is unknown.
    pub fn ensure(&mut self, id: u64) {
        self.records.entry(id).or_default();
    }

    /// Upsert caller-supplied metadata. Creating a new record takes the
    /// fields verbatim; replacing an existing one keeps its recall
    /// counters and the derived links cache.
    pub fn upsert(&mut self, id: u64, meta: Metadata) {
        match self.records.get_mut(&id) {
            Some(existing) => existing.overwrite_preserving_state(meta),
            None => {
                self.records.insert(id, meta);
            }
        }
    }

    /// Full replace of the mutable fields, preserving recall state and
    /// links. Fails for unknown IDs.
    pub fn update(&mut self, id: u64, meta: Metadata) -> FeatherResult<()> {
        let existing = self.records.get_mut(&id).ok_or(FeatherError::NotFound(id))?;
        existing.overwrite_preserving_state(meta);
        Ok(())
    }

    /// Replace only the importance field.
    pub fn update_importance(&mut self, id: u64, importance: f32) -> FeatherResult<()> {
        let existing = self.records.get_mut(&id).ok_or(FeatherError::NotFound(id))?;
        existing.importance = importance.max(0.0);
        Ok(())
    }

    /// Record a recall: bump the counter and refresh the recall timestamp.
    pub fn touch(&mut self, id: u64) -> FeatherResult<()> {
        let existing = self.records.get_mut(&id).ok_or(FeatherError::NotFound(id))?;
        existing.recall_count += 1;
        existing.last_recalled_at = existing.last_recalled_at.max(now_secs());
        Ok(())
    }

    /// Replace the derived links cache for a record.
    pub fn set_links(&mut self, id: u64, links: Vec<u64>) {
        if let Some(existing) = self.records.get_mut(&id) {
            existing.links = links;
        }
    }

    /// Iterate all records.
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &Metadata)> {
        self.records.iter()
    }

    /// Restore from snapshot parts.
    pub(crate) fn from_parts(records: HashMap<u64, Metadata>) -> Self {
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextType, MetadataBuilder};

    #[test]
    fn test_touch_monotone() {
        let mut store = MetadataStore::new();
        store.ensure(1);
        store.touch(1).unwrap();
        store.touch(1).unwrap();
        let meta = store.get(1).unwrap();
        assert_eq!(meta.recall_count, 2);
        assert!(meta.last_recalled_at > 0);
    }

    #[test]
    fn test_touch_unknown_id() {
        let mut store = MetadataStore::new();
        assert!(matches!(store.touch(9), Err(FeatherError::NotFound(9))));
    }

    #[test]
    fn test_update_preserves_recall_state() {
        let mut store = MetadataStore::new();
        store.upsert(1, MetadataBuilder::new(ContextType::Fact, "v1").build());
        store.touch(1).unwrap();
        store.set_links(1, vec![2]);

        store
            .update(1, MetadataBuilder::new(ContextType::Event, "v2").build())
            .unwrap();

        let meta = store.get(1).unwrap();
        assert_eq!(meta.content, "v2");
        assert_eq!(meta.context_type, ContextType::Event);
        assert_eq!(meta.recall_count, 1);
        assert_eq!(meta.links, vec![2]);
    }

    #[test]
    fn test_update_importance_only() {
        let mut store = MetadataStore::new();
        store.upsert(1, MetadataBuilder::new(ContextType::Fact, "x").importance(0.9).build());
        store.update_importance(1, 0.0).unwrap();
        let meta = store.get(1).unwrap();
        assert_eq!(meta.importance, 0.0);
        assert_eq!(meta.content, "x");
    }
}
