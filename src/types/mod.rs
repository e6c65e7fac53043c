//! All data types for the Feather library.

pub mod edge;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod scoring;

pub use edge::{Edge, IncomingEdge, RelType};
pub use error::{FeatherError, FeatherResult};
pub use filter::{FilterBuilder, SearchFilter};
pub use metadata::{ContextType, Metadata, MetadataBuilder};
pub use scoring::ScoringConfig;

/// Magic bytes at the start of every .feather snapshot.
pub const FEATHER_MAGIC: [u8; 8] = *b"FEATHERD";

/// Current snapshot format version.
pub const FORMAT_VERSION: u16 = 1;

/// Default vector dimensionality for the initial "text" modality.
pub const DEFAULT_DIMENSION: usize = 768;

/// The modality created when a database is opened fresh.
pub const DEFAULT_MODALITY: &str = "text";

/// Maximum length of a modality name.
pub const MAX_MODALITY_NAME: usize = 64;

/// Returns the current time as Unix epoch seconds.
pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Validate a modality name: `[A-Za-z0-9_-]{1,64}`.
pub fn validate_modality(name: &str) -> FeatherResult<()> {
    if name.is_empty() || name.len() > MAX_MODALITY_NAME {
        return Err(FeatherError::InvalidArgument(format!(
            "modality name must be 1-{} characters, got {}",
            MAX_MODALITY_NAME,
            name.len()
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(FeatherError::InvalidArgument(format!(
            "modality name {name:?} contains characters outside [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}
