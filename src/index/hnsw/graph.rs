//! The layered proximity graph: insertion, search, neighbor selection.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::index::squared_euclidean;
use crate::store::VectorStore;

use super::config::HnswConfig;

/// A candidate node during search, ordered by distance.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    slot: u32,
    distance: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.slot == other.slot
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison so BinaryHeap acts as a min-heap; ties break
        // toward the smaller slot.
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
            .then(other.slot.cmp(&self.slot))
    }
}

/// Wrapper for max-heap behavior (worst candidate at the top).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MaxCandidate(Candidate);

impl PartialOrd for MaxCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .distance
            .partial_cmp(&other.0.distance)
            .unwrap_or(Ordering::Equal)
            .then(self.0.slot.cmp(&other.0.slot))
    }
}

/// HNSW graph over the slots of one modality's vector store.
pub struct HnswIndex {
    config: HnswConfig,
    /// Top layer of each slot, indexed by slot.
    levels: Vec<u8>,
    /// Adjacency per layer: `layers[layer][slot]` = neighbor slots.
    layers: Vec<Vec<Vec<u32>>>,
    /// Entry point for search (a node on the highest layer).
    entry_point: Option<u32>,
    /// Highest layer currently in the graph.
    max_layer: u8,
}

impl HnswIndex {
    /// Create a new empty index.
    pub fn new(config: HnswConfig) -> Self {
        Self {
            config,
            levels: Vec::new(),
            layers: Vec::new(),
            entry_point: None,
            max_layer: 0,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Number of indexed slots.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the index holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The current entry point slot.
    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    /// The highest layer currently in use.
    pub fn max_layer(&self) -> u8 {
        self.max_layer
    }

    /// Top layer assigned to a slot.
    pub fn level_of(&self, slot: u32) -> u8 {
        self.levels[slot as usize]
    }

    /// Neighbors of a slot at a layer.
    pub fn neighbors(&self, layer: usize, slot: u32) -> &[u32] {
        self.layers
            .get(layer)
            .and_then(|l| l.get(slot as usize))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Draw the top layer for a new slot from the exponential
    /// distribution, seeded by the slot so builds are reproducible.
    fn random_level(&self, slot: u32) -> u8 {
        let mut rng = StdRng::seed_from_u64(slot as u64);
        let uniform: f64 = rng.gen();
        let level = (-uniform.ln() * self.config.ml).floor() as u8;
        level.min(32)
    }

    /// Make room for one more slot on every layer up to `level`.
    fn grow(&mut self, level: u8) {
        while self.layers.len() <= level as usize {
            self.layers.push(vec![Vec::new(); self.levels.len().saturating_sub(1)]);
        }
        for layer in &mut self.layers {
            while layer.len() < self.levels.len() {
                layer.push(Vec::new());
            }
        }
    }

    /// Insert the vector at `slot` into the graph.
    ///
    /// Slots must be inserted in dense order; a slot already present is a
    /// no-op (its row was overwritten in place by the vector store).
    pub fn insert(&mut self, slot: u32, vectors: &VectorStore) {
        if (slot as usize) < self.levels.len() {
            return;
        }
        let level = self.random_level(slot);
        self.levels.push(level);
        self.grow(level);

        let query: Vec<f32> = vectors.row(slot).to_vec();

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(slot);
            self.max_layer = level;
            return;
        };

        // Greedy descent through the layers above the node's level.
        let mut current = entry;
        for layer in ((level as usize + 1)..=(self.max_layer as usize)).rev() {
            current = self.greedy_step(&query, current, layer, vectors);
        }

        // Connect at every layer the node occupies.
        let top = level.min(self.max_layer) as usize;
        for layer in (0..=top).rev() {
            let candidates =
                self.search_layer(&query, current, layer, self.config.ef_construction, vectors);
            let m = self.config.max_connections(layer);
            let selected = select_neighbors(&candidates, m, slot, vectors);

            for &neighbor in &selected {
                let list = &mut self.layers[layer][neighbor as usize];
                if !list.contains(&slot) {
                    list.push(slot);
                }
            }
            self.layers[layer][slot as usize] = selected;

            // Re-prune any neighbor that now exceeds its degree cap.
            let over_cap: Vec<u32> = self.layers[layer][slot as usize]
                .iter()
                .copied()
                .filter(|&n| self.layers[layer][n as usize].len() > m)
                .collect();
            for neighbor in over_cap {
                self.prune(neighbor, layer, vectors);
            }

            if let Some(&(best, _)) = candidates.first() {
                current = best;
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(slot);
        }
    }

    /// Shrink an over-capacity neighbor list back to the cap using the
    /// same diversity heuristic used at insert time.
    fn prune(&mut self, slot: u32, layer: usize, vectors: &VectorStore) {
        let cap = self.config.max_connections(layer);
        if self.layers[layer][slot as usize].len() <= cap {
            return;
        }
        let base = vectors.row(slot);
        let mut candidates: Vec<(u32, f32)> = self.layers[layer][slot as usize]
            .iter()
            .map(|&n| (n, squared_euclidean(base, vectors.row(n))))
            .collect();
        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        self.layers[layer][slot as usize] = select_neighbors(&candidates, cap, slot, vectors);
    }

    /// One greedy hop-until-local-minimum pass within a layer.
    fn greedy_step(
        &self,
        query: &[f32],
        entry: u32,
        layer: usize,
        vectors: &VectorStore,
    ) -> u32 {
        let mut current = entry;
        let mut current_dist = squared_euclidean(query, vectors.row(current));

        loop {
            let mut improved = false;
            for &neighbor in self.neighbors(layer, current) {
                let dist = squared_euclidean(query, vectors.row(neighbor));
                if dist < current_dist {
                    current = neighbor;
                    current_dist = dist;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
        current
    }

    /// Bounded best-first search within a layer. Returns up to `ef`
    /// candidates sorted by `(distance, slot)`.
    fn search_layer(
        &self,
        query: &[f32],
        entry: u32,
        layer: usize,
        ef: usize,
        vectors: &VectorStore,
    ) -> Vec<(u32, f32)> {
        let mut visited: HashSet<u32> = HashSet::new();
        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut results: BinaryHeap<MaxCandidate> = BinaryHeap::new();

        let entry_dist = squared_euclidean(query, vectors.row(entry));
        candidates.push(Candidate {
            slot: entry,
            distance: entry_dist,
        });
        results.push(MaxCandidate(Candidate {
            slot: entry,
            distance: entry_dist,
        }));
        visited.insert(entry);

        while let Some(current) = candidates.pop() {
            if results.len() >= ef {
                let worst = results.peek().map(|w| w.0.distance).unwrap_or(f32::INFINITY);
                if current.distance > worst {
                    break;
                }
            }

            for &neighbor in self.neighbors(layer, current.slot) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let dist = squared_euclidean(query, vectors.row(neighbor));
                let worst = results.peek().map(|w| w.0.distance).unwrap_or(f32::INFINITY);
                if results.len() < ef || dist < worst {
                    candidates.push(Candidate {
                        slot: neighbor,
                        distance: dist,
                    });
                    results.push(MaxCandidate(Candidate {
                        slot: neighbor,
                        distance: dist,
                    }));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<(u32, f32)> = results
            .into_iter()
            .map(|mc| (mc.0.slot, mc.0.distance))
            .collect();
        out.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        out
    }

    /// k-nearest-neighbor query. Returns `(slot, distance)` pairs sorted
    /// by `(distance, slot)`. An empty index yields an empty result.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        vectors: &VectorStore,
    ) -> Vec<(u32, f32)> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }
        let ef = ef.max(k);

        let mut current = entry;
        for layer in (1..=self.max_layer as usize).rev() {
            current = self.greedy_step(query, current, layer, vectors);
        }

        let mut results = self.search_layer(query, current, 0, ef, vectors);
        results.truncate(k);
        results
    }

    /// Restore a graph from snapshot parts (layer-major adjacency).
    pub(crate) fn from_parts(
        config: HnswConfig,
        levels: Vec<u8>,
        layers: Vec<Vec<Vec<u32>>>,
        entry_point: Option<u32>,
        max_layer: u8,
    ) -> Self {
        Self {
            config,
            levels,
            layers,
            entry_point,
            max_layer,
        }
    }
}

/// The HNSW neighbor selection heuristic.
///
/// Walking candidates nearest-first, a candidate is kept only if it is
/// closer to the query than to every already-kept neighbor; this spreads
/// neighbors across directions instead of clustering them. Skipped
/// candidates backfill remaining capacity nearest-first.
fn select_neighbors(
    candidates: &[(u32, f32)],
    m: usize,
    exclude: u32,
    vectors: &VectorStore,
) -> Vec<u32> {
    let mut selected: Vec<(u32, f32)> = Vec::with_capacity(m);

    for &(cand, dist_to_query) in candidates {
        if selected.len() >= m {
            break;
        }
        if cand == exclude {
            continue;
        }
        let cand_row = vectors.row(cand);
        let diverse = selected
            .iter()
            .all(|&(kept, _)| squared_euclidean(cand_row, vectors.row(kept)) > dist_to_query);
        if diverse {
            selected.push((cand, dist_to_query));
        }
    }

    if selected.len() < m {
        for &(cand, dist_to_query) in candidates {
            if selected.len() >= m {
                break;
            }
            if cand == exclude || selected.iter().any(|&(kept, _)| kept == cand) {
                continue;
            }
            selected.push((cand, dist_to_query));
        }
    }

    selected.into_iter().map(|(slot, _)| slot).collect()
}
