//! The typed, weighted context graph and its traversals.

pub mod chain;
pub mod context_graph;

pub use chain::{ChainEdge, ChainNode, ContextChainConfig, ContextChainResult};
pub use context_graph::ContextGraph;
