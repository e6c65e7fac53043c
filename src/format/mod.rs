//! The single-file .feather snapshot format.
//!
//! Layout (all little-endian, all offsets explicit):
//!
//! ```text
//! [0..8)    magic      = "FEATHERD"
//! [8..10)   version    = u16
//! [10..16)  reserved   = 0
//! [16..20)  section count = u32
//! then per section: kind u16, offset u64, length u64
//! ```
//!
//! Per-modality sections (`Vectors`, `IdMap`, `Hnsw`) appear once per
//! modality, in the order the `Modalities` section lists them (sorted by
//! name). Unknown section kinds are skipped on load for forward
//! compatibility; missing required sections fail with a corruption error.

pub mod reader;
pub mod writer;

pub use reader::{SnapshotParts, SnapshotReader};
pub use writer::SnapshotWriter;

/// Fixed byte length of the snapshot header before the section table.
pub const HEADER_SIZE: usize = 16;

/// Byte length of one section-table entry.
pub const SECTION_ENTRY_SIZE: usize = 18;

/// Known section kinds. Values are part of the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SectionKind {
    Modalities = 1,
    Vectors = 2,
    IdMap = 3,
    Hnsw = 4,
    Metadata = 5,
    GraphOut = 6,
    GraphIn = 7,
}

impl SectionKind {
    /// Convert a raw u16 to a known section kind.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Modalities),
            2 => Some(Self::Vectors),
            3 => Some(Self::IdMap),
            4 => Some(Self::Hnsw),
            5 => Some(Self::Metadata),
            6 => Some(Self::GraphOut),
            7 => Some(Self::GraphIn),
            _ => None,
        }
    }
}
