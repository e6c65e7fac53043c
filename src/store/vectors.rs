//! Contiguous per-modality vector storage, indexed by dense slot.

use std::collections::HashMap;

use crate::types::{FeatherError, FeatherResult};

/// Append-only float32 row storage for one modality.
///
/// Rows live in a single contiguous buffer so slot access is one
/// multiply away and the layout is friendly to vectorized inner loops.
/// Slots are dense `0..len` and never recycled.
pub struct VectorStore {
    dim: usize,
    data: Vec<f32>,
    id_to_slot: HashMap<u64, u32>,
    slot_to_id: Vec<u64>,
}

impl VectorStore {
    /// Create an empty store with a fixed row dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
            id_to_slot: HashMap::new(),
            slot_to_id: Vec::new(),
        }
    }

    /// The fixed row dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slot_to_id.len()
    }

    /// Whether the store holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.slot_to_id.is_empty()
    }

    /// Upsert a vector for an external ID.
    ///
    /// Returns `(slot, created)` where `created` is false when an
    /// existing row was overwritten in place.
    pub fn upsert(&mut self, id: u64, vec: &[f32]) -> FeatherResult<(u32, bool)> {
        if vec.len() != self.dim {
            return Err(FeatherError::DimMismatch {
                expected: self.dim,
                got: vec.len(),
            });
        }
        if vec.iter().any(|v| !v.is_finite()) {
            return Err(FeatherError::InvalidArgument(
                "vector contains non-finite values".to_string(),
            ));
        }

        if let Some(&slot) = self.id_to_slot.get(&id) {
            let start = slot as usize * self.dim;
            self.data[start..start + self.dim].copy_from_slice(vec);
            return Ok((slot, false));
        }

        let slot = self.slot_to_id.len() as u32;
        self.data.extend_from_slice(vec);
        self.slot_to_id.push(id);
        self.id_to_slot.insert(id, slot);
        Ok((slot, true))
    }

    /// Read the row at a slot.
    pub fn row(&self, slot: u32) -> &[f32] {
        let start = slot as usize * self.dim;
        &self.data[start..start + self.dim]
    }

    /// Slot assigned to an external ID, if present.
    pub fn slot_of(&self, id: u64) -> Option<u32> {
        self.id_to_slot.get(&id).copied()
    }

    /// External ID stored at a slot.
    pub fn id_at(&self, slot: u32) -> u64 {
        self.slot_to_id[slot as usize]
    }

    /// Copy of the vector for an external ID.
    pub fn vector_of(&self, id: u64) -> Option<Vec<f32>> {
        self.slot_of(id).map(|slot| self.row(slot).to_vec())
    }

    /// All external IDs in slot order.
    pub fn ids(&self) -> &[u64] {
        &self.slot_to_id
    }

    /// The raw row buffer (used by the snapshot writer).
    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// Restore a store from snapshot parts.
    pub(crate) fn from_parts(dim: usize, data: Vec<f32>, slot_to_id: Vec<u64>) -> Self {
        let id_to_slot = slot_to_id
            .iter()
            .enumerate()
            .map(|(slot, &id)| (id, slot as u32))
            .collect();
        Self {
            dim,
            data,
            id_to_slot,
            slot_to_id,
        }
    }
}
