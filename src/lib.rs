//! Feather — embedded multi-modal vector + context-graph database.
//!
//! One key space, three primitives: per-modality HNSW vector indexes, a
//! typed weighted property graph over the same record IDs, and rich
//! per-record metadata with a living-context scoring model (time decay
//! modulated by recall stickiness and importance). State persists as a
//! single binary snapshot with crash-safe saves.

pub mod cli;
pub mod db;
pub mod engine;
pub mod export;
pub mod format;
pub mod graph;
pub mod index;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root
pub use db::{Feather, SearchHit};
pub use export::{ExportEdge, ExportNode, GraphExport};
pub use format::{SnapshotReader, SnapshotWriter};
pub use graph::{ChainEdge, ChainNode, ContextChainConfig, ContextChainResult};
pub use index::{HnswConfig, HnswIndex};
pub use types::{
    now_secs, ContextType, Edge, FeatherError, FeatherResult, FilterBuilder, IncomingEdge,
    Metadata, MetadataBuilder, RelType, ScoringConfig, SearchFilter, DEFAULT_DIMENSION,
    DEFAULT_MODALITY, FORMAT_VERSION,
};
