//! HNSW (Hierarchical Navigable Small World) index, one per modality.
//!
//! A multi-layer proximity graph over the dense slot indices of a
//! [`VectorStore`](crate::store::VectorStore). Higher layers are sparser
//! and route the search toward the right region; layer 0 holds every
//! node. Insertion assigns each node a random top layer from an
//! exponential distribution, connects it at every layer it occupies, and
//! keeps per-node degree bounded with a diversity-preserving neighbor
//! selection heuristic.
//!
//! Distances are squared Euclidean; ties break toward the smaller slot.

mod config;
mod graph;

pub use config::HnswConfig;
pub use graph::HnswIndex;
