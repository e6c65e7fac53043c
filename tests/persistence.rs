//! Persistence tests: snapshot round trips, header validation, corruption
//! handling, section-level forward compatibility.

use feather_db::format::{HEADER_SIZE, SECTION_ENTRY_SIZE};
use feather_db::types::{ContextType, FeatherError, MetadataBuilder, RelType};
use feather_db::{Feather, FORMAT_VERSION};

use tempfile::TempDir;

fn db_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("test.feather")
}

/// Build the canonical fixture: two modalities, metadata, edges, recalls.
fn populate(db: &Feather) {
    let meta = MetadataBuilder::new(ContextType::Fact, "unit x")
        .timestamp(1_700_000_000)
        .importance(0.8)
        .source("ingest")
        .namespace("acme")
        .entity("user-1")
        .attribute("region", "emea")
        .tags_json(r#"["alpha"]"#)
        .build();
    db.add(1, &[1.0, 0.0, 0.0], Some(meta), "text").unwrap();
    db.add(2, &[0.0, 1.0, 0.0], None, "text").unwrap();
    db.add(1, &[0.1, 0.2, 0.3, 0.4], None, "visual").unwrap();

    db.link(1, 2, RelType::DerivedFrom, 0.8).unwrap();

    // One recall so counters are non-trivial.
    let hits = db.search(&[1.0, 0.0, 0.0], 1, "text", None, None).unwrap();
    assert_eq!(hits[0].id, 1);
}

fn assert_fixture_state(db: &Feather) {
    assert_eq!(db.size(), 2);
    assert_eq!(db.dim("text").unwrap(), 3);
    assert_eq!(db.dim("visual").unwrap(), 4);

    let meta = db.get_metadata(1).unwrap();
    assert_eq!(meta.content, "unit x");
    assert_eq!(meta.timestamp, 1_700_000_000);
    assert!((meta.importance - 0.8).abs() < 1e-6);
    assert_eq!(meta.source, "ingest");
    assert_eq!(meta.namespace_id, "acme");
    assert_eq!(meta.entity_id, "user-1");
    assert_eq!(meta.attributes["region"], "emea");
    assert_eq!(meta.tags_json, r#"["alpha"]"#);
    assert_eq!(meta.recall_count, 1);
    assert!(meta.last_recalled_at > 0);
    assert_eq!(meta.links, vec![2]);

    assert_eq!(db.get_vector(1, "text").unwrap(), vec![1.0, 0.0, 0.0]);
    assert_eq!(db.get_vector(1, "visual").unwrap(), vec![0.1, 0.2, 0.3, 0.4]);

    let edges = db.get_edges(1);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target_id, 2);
    assert_eq!(edges[0].rel_type, RelType::DerivedFrom);
    assert!((edges[0].weight - 0.8).abs() < 1e-6);

    let incoming = db.get_incoming(2);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].source_id, 1);

    // The reopened index still answers queries.
    let hits = db.search(&[1.0, 0.0, 0.0], 1, "text", None, None).unwrap();
    assert_eq!(hits[0].id, 1);
}

// ==================== Round trips ====================

#[test]
fn test_round_trip_full_state() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 3).unwrap();
        populate(&db);
        db.save().unwrap();
    }
    let db = Feather::open(db_path(&dir), 3).unwrap();
    assert_fixture_state(&db);
}

#[test]
fn test_round_trip_empty_db() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 16).unwrap();
        db.save().unwrap();
    }
    let db = Feather::open(db_path(&dir), 32).unwrap();
    // Dimension comes from the snapshot, not the open() default.
    assert_eq!(db.dim("text").unwrap(), 16);
    assert_eq!(db.size(), 0);
}

#[test]
fn test_round_trip_many_records() {
    let dir = TempDir::new().unwrap();
    let n = 300u64;
    {
        let db = Feather::open(db_path(&dir), 8).unwrap();
        for i in 0..n {
            let vec: Vec<f32> = (0..8).map(|j| ((i * 7 + j) as f32 * 0.37).sin()).collect();
            let meta = MetadataBuilder::new(ContextType::Event, format!("record {i}"))
                .timestamp(1_000_000 + i as i64)
                .build();
            db.add(i, &vec, Some(meta), "text").unwrap();
        }
        db.auto_link("text", 0.5, RelType::RelatedTo, 4).unwrap();
        db.save().unwrap();
    }

    let db = Feather::open(db_path(&dir), 8).unwrap();
    assert_eq!(db.size(), n as usize);
    assert_eq!(db.get_all_ids("text").len(), n as usize);
    assert!(db.edge_count() > 0);

    // Persisted index matches a fresh query.
    let query: Vec<f32> = (0..8).map(|j| ((7 + j) as f32 * 0.37).sin()).collect();
    let hits = db.search(&query, 1, "text", None, None).unwrap();
    assert_eq!(hits[0].id, 1);
}

#[test]
fn test_save_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let db = Feather::open(db_path(&dir), 3).unwrap();
    populate(&db);
    db.save().unwrap();
    db.save().unwrap();

    let reopened = Feather::open(db_path(&dir), 3).unwrap();
    assert_fixture_state(&reopened);
}

// ==================== Header validation ====================

#[test]
fn test_header_layout() {
    let dir = TempDir::new().unwrap();
    let db = Feather::open(db_path(&dir), 3).unwrap();
    db.save().unwrap();

    let bytes = std::fs::read(db_path(&dir)).unwrap();
    assert_eq!(&bytes[0..8], b"FEATHERD");
    assert_eq!(
        u16::from_le_bytes([bytes[8], bytes[9]]),
        FORMAT_VERSION
    );
    assert_eq!(&bytes[10..16], &[0u8; 6]);
}

#[test]
fn test_bad_magic_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 3).unwrap();
        db.save().unwrap();
    }
    let mut bytes = std::fs::read(db_path(&dir)).unwrap();
    bytes[0] = b'X';
    std::fs::write(db_path(&dir), &bytes).unwrap();

    assert!(matches!(
        Feather::open(db_path(&dir), 3),
        Err(FeatherError::InvalidMagic)
    ));
}

#[test]
fn test_newer_version_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 3).unwrap();
        db.save().unwrap();
    }
    let mut bytes = std::fs::read(db_path(&dir)).unwrap();
    bytes[8..10].copy_from_slice(&99u16.to_le_bytes());
    std::fs::write(db_path(&dir), &bytes).unwrap();

    assert!(matches!(
        Feather::open(db_path(&dir), 3),
        Err(FeatherError::UnsupportedVersion(99))
    ));
}

#[test]
fn test_truncated_file_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 3).unwrap();
        populate(&db);
        db.save().unwrap();
    }
    let bytes = std::fs::read(db_path(&dir)).unwrap();
    std::fs::write(db_path(&dir), &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(
        Feather::open(db_path(&dir), 3),
        Err(FeatherError::Truncated)
    ));
}

// ==================== Section-level compatibility ====================

/// Rewrite the kind of the i-th section-table entry.
fn patch_section_kind(path: &std::path::Path, index: usize, kind: u16) {
    let mut bytes = std::fs::read(path).unwrap();
    let offset = HEADER_SIZE + 4 + index * SECTION_ENTRY_SIZE;
    bytes[offset..offset + 2].copy_from_slice(&kind.to_le_bytes());
    std::fs::write(path, &bytes).unwrap();
}

// With one modality the section order is: Modalities, Vectors, IdMap,
// Hnsw, Metadata, GraphOut, GraphIn.
const HNSW_ENTRY: usize = 3;
const GRAPH_IN_ENTRY: usize = 6;

#[test]
fn test_unknown_section_skipped_and_incoming_rebuilt() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 2).unwrap();
        db.add(1, &[1.0, 0.0], None, "text").unwrap();
        db.add(2, &[0.0, 1.0], None, "text").unwrap();
        db.link(1, 2, RelType::Supports, 0.6).unwrap();
        db.save().unwrap();
    }

    // An unrecognized kind must be ignored; losing GRAPH_IN specifically
    // must trigger reverse-index reconstruction from GRAPH_OUT.
    patch_section_kind(&db_path(&dir), GRAPH_IN_ENTRY, 0x7FFF);

    let db = Feather::open(db_path(&dir), 2).unwrap();
    let incoming = db.get_incoming(2);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].source_id, 1);
    assert_eq!(incoming[0].rel_type, RelType::Supports);
}

#[test]
fn test_missing_hnsw_section_rebuilds_index() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 2).unwrap();
        for i in 0..50u64 {
            let angle = i as f32 * 0.13;
            db.add(i, &[angle.cos(), angle.sin()], None, "text").unwrap();
        }
        db.save().unwrap();
    }

    patch_section_kind(&db_path(&dir), HNSW_ENTRY, 0x7FFE);

    let db = Feather::open(db_path(&dir), 2).unwrap();
    let hits = db.search(&[1.0, 0.0], 1, "text", None, None).unwrap();
    assert_eq!(hits[0].id, 0);
}

#[test]
fn test_missing_required_section_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let db = Feather::open(db_path(&dir), 2).unwrap();
        db.add(1, &[1.0, 0.0], None, "text").unwrap();
        db.save().unwrap();
    }

    // Entry 4 is Metadata with a single modality.
    patch_section_kind(&db_path(&dir), 4, 0x7FFD);

    assert!(matches!(
        Feather::open(db_path(&dir), 2),
        Err(FeatherError::MissingSection("METADATA"))
    ));
}
