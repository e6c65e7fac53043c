//! Context chains: vector-search-seeded BFS through the typed graph.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::types::{Metadata, RelType};

use super::context_graph::ContextGraph;

/// Parameters for context-chain expansion.
#[derive(Debug, Clone, Copy)]
pub struct ContextChainConfig {
    /// Per-hop attenuation base; hop `h` contributes `hop_decay^h`.
    /// Clamped to [0, 1] so scores never grow along a chain.
    pub hop_decay: f32,
}

impl Default for ContextChainConfig {
    fn default() -> Self {
        Self { hop_decay: 0.5 }
    }
}

/// A node reached by a context chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainNode {
    pub id: u64,
    /// Propagated score (seed score attenuated along the best path).
    pub score: f32,
    /// Raw search similarity; 0 for nodes reached only via graph expansion.
    pub similarity: f32,
    /// 0 for direct search hits, 1+ for graph hops.
    pub hop: u32,
    pub metadata: Metadata,
}

/// An edge traversed during expansion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainEdge {
    pub source: u64,
    pub target: u64,
    pub rel_type: RelType,
    pub weight: f32,
}

/// The scored subgraph produced by `context_chain`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextChainResult {
    /// Nodes sorted by score descending.
    pub nodes: Vec<ChainNode>,
    /// Deduplicated traversed edges.
    pub edges: Vec<ChainEdge>,
}

/// Breadth-first expansion over outgoing edges.
///
/// Seeds enter at hop 0 with their search score. A node discovered at hop
/// `h` gets `parent.score * edge.weight * hop_decay^h`; a node reachable
/// along several paths keeps its first (smallest) hop and the maximum
/// score. Returns `(id, hop, score)` triples and the traversed edges.
pub(crate) fn expand(
    seeds: &[(u64, f32)],
    graph: &ContextGraph,
    hops: u32,
    config: &ContextChainConfig,
) -> (Vec<(u64, u32, f32)>, Vec<ChainEdge>) {
    let hop_decay = config.hop_decay.clamp(0.0, 1.0);

    let mut visited: HashMap<u64, (u32, f32)> = HashMap::new();
    let mut frontier: VecDeque<u64> = VecDeque::new();
    for &(id, score) in seeds {
        match visited.get_mut(&id) {
            Some(entry) => entry.1 = entry.1.max(score),
            None => {
                visited.insert(id, (0, score));
                frontier.push_back(id);
            }
        }
    }

    let mut edges: Vec<ChainEdge> = Vec::new();
    let mut seen_edges: HashSet<(u64, u64, RelType)> = HashSet::new();

    for hop in 1..=hops {
        let decay = hop_decay.powi(hop as i32);
        let mut next: VecDeque<u64> = VecDeque::new();

        while let Some(current) = frontier.pop_front() {
            let parent_score = visited[&current].1;
            for edge in graph.edges_from(current) {
                if seen_edges.insert((current, edge.target_id, edge.rel_type.clone())) {
                    edges.push(ChainEdge {
                        source: current,
                        target: edge.target_id,
                        rel_type: edge.rel_type.clone(),
                        weight: edge.weight,
                    });
                }
                let score = parent_score * edge.weight * decay;
                match visited.get_mut(&edge.target_id) {
                    Some(entry) => entry.1 = entry.1.max(score),
                    None => {
                        visited.insert(edge.target_id, (hop, score));
                        next.push_back(edge.target_id);
                    }
                }
            }
        }

        frontier = next;
    }

    let nodes = visited
        .into_iter()
        .map(|(id, (hop, score))| (id, hop, score))
        .collect();
    (nodes, edges)
}
