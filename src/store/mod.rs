//! Storage primitives: per-modality vector rows and the metadata map.

pub mod metadata;
pub mod vectors;

pub use metadata::MetadataStore;
pub use vectors::VectorStore;
