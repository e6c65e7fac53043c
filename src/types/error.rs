//! Error types for the Feather library.

use thiserror::Error;

/// All errors that can occur in the Feather library.
#[derive(Error, Debug)]
pub enum FeatherError {
    /// Vector length does not match the modality's fixed dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimMismatch { expected: usize, got: usize },

    /// Record not found by ID.
    #[error("Record ID {0} not found")]
    NotFound(u64),

    /// Modality does not exist.
    #[error("Modality {0:?} not found")]
    ModalityNotFound(String),

    /// Invalid argument (k = 0, bad threshold, malformed modality name, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid magic bytes in snapshot header.
    #[error("Invalid magic bytes in snapshot header")]
    InvalidMagic,

    /// Snapshot written by a newer format version.
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u16),

    /// Snapshot file is empty or truncated.
    #[error("Snapshot is empty or truncated")]
    Truncated,

    /// Corrupt snapshot data at a given byte offset.
    #[error("Corrupt snapshot data at offset {0}")]
    Corrupt(u64),

    /// A required snapshot section is absent.
    #[error("Snapshot is missing required section: {0}")]
    MissingSection(&'static str),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for Feather operations.
pub type FeatherResult<T> = Result<T, FeatherError>;
