//! Outgoing and incoming adjacency over typed, weighted edges.

use std::collections::HashMap;

use crate::types::{Edge, IncomingEdge, RelType};

/// Edge storage for the whole database.
///
/// Edges are owned here and only here; the per-record `links` field in
/// the metadata store is a derived cache refreshed by the orchestrator.
/// The two adjacency maps are kept mutually consistent by construction:
/// `(a, b, r, w)` is in `out[a]` iff `(a, r, w)` is in `incoming[b]`.
#[derive(Default)]
pub struct ContextGraph {
    out: HashMap<u64, Vec<Edge>>,
    incoming: HashMap<u64, Vec<IncomingEdge>>,
}

impl ContextGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.out.values().map(Vec::len).sum()
    }

    /// Upsert an edge. Duplicate `(target, rel_type)` pairs collapse to a
    /// single edge whose weight is the last one written. Self-loops are
    /// allowed. Returns true when a new edge was created rather than an
    /// existing weight updated.
    pub fn link(&mut self, source_id: u64, target_id: u64, rel_type: RelType, weight: f32) -> bool {
        let weight = weight.clamp(0.0, 1.0);
        let edges = self.out.entry(source_id).or_default();

        if let Some(existing) = edges
            .iter_mut()
            .find(|e| e.target_id == target_id && e.rel_type == rel_type)
        {
            existing.weight = weight;
            if let Some(mirror) = self
                .incoming
                .entry(target_id)
                .or_default()
                .iter_mut()
                .find(|ie| ie.source_id == source_id && ie.rel_type == rel_type)
            {
                mirror.weight = weight;
            }
            return false;
        }

        edges.push(Edge {
            target_id,
            rel_type: rel_type.clone(),
            weight,
        });
        self.incoming.entry(target_id).or_default().push(IncomingEdge {
            source_id,
            rel_type,
            weight,
        });
        true
    }

    /// Outgoing edges of a record. Unknown IDs yield an empty slice.
    pub fn edges_from(&self, id: u64) -> &[Edge] {
        self.out.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges of a record. Unknown IDs yield an empty slice.
    pub fn edges_to(&self, id: u64) -> &[IncomingEdge] {
        self.incoming.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct outgoing-edge targets of a record, in first-seen order.
    /// This is the value cached in `Metadata::links`.
    pub fn targets_of(&self, id: u64) -> Vec<u64> {
        let mut targets = Vec::new();
        for edge in self.edges_from(id) {
            if !targets.contains(&edge.target_id) {
                targets.push(edge.target_id);
            }
        }
        targets
    }

    /// Iterate all sources with their outgoing edge lists.
    pub fn iter_out(&self) -> impl Iterator<Item = (&u64, &Vec<Edge>)> {
        self.out.iter()
    }

    /// Iterate all targets with their incoming edge lists.
    pub fn iter_incoming(&self) -> impl Iterator<Item = (&u64, &Vec<IncomingEdge>)> {
        self.incoming.iter()
    }

    /// Reconstruct the incoming index from the outgoing map. Used when a
    /// snapshot lacks the persisted reverse index; guarantees the two
    /// sides cannot disagree on load.
    pub fn rebuild_incoming(&mut self) {
        self.incoming.clear();
        for (&source_id, edges) in &self.out {
            for edge in edges {
                self.incoming.entry(edge.target_id).or_default().push(IncomingEdge {
                    source_id,
                    rel_type: edge.rel_type.clone(),
                    weight: edge.weight,
                });
            }
        }
    }

    /// Restore from snapshot parts. When `incoming` is `None` the reverse
    /// index is rebuilt from the outgoing map.
    pub(crate) fn from_parts(
        out: HashMap<u64, Vec<Edge>>,
        incoming: Option<HashMap<u64, Vec<IncomingEdge>>>,
    ) -> Self {
        let mut graph = Self {
            out,
            incoming: incoming.unwrap_or_default(),
        };
        if graph.incoming.is_empty() && !graph.out.is_empty() {
            graph.rebuild_incoming();
        }
        graph
    }
}
