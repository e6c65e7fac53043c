//! Graph tests: linking, edge symmetry, auto-link, context chains, export.

use std::collections::HashMap;

use feather_db::types::{ContextType, FeatherError, MetadataBuilder, RelType};
use feather_db::Feather;

use tempfile::TempDir;

fn open_db(dim: usize) -> (TempDir, Feather) {
    let dir = TempDir::new().unwrap();
    let db = Feather::open(dir.path().join("test.feather"), dim).unwrap();
    (dir, db)
}

// ==================== Linking ====================

#[test]
fn test_link_updates_cache_and_reverse_index() {
    let (_dir, db) = open_db(2);
    db.add(1, &[1.0, 0.0], None, "text").unwrap();
    db.add(2, &[0.0, 1.0], None, "text").unwrap();

    db.link(1, 2, RelType::DerivedFrom, 0.8).unwrap();

    assert_eq!(db.get_metadata(1).unwrap().links, vec![2]);

    let incoming = db.get_incoming(2);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].source_id, 1);
    assert_eq!(incoming[0].rel_type, RelType::DerivedFrom);
    assert!((incoming[0].weight - 0.8).abs() < 1e-6);
}

#[test]
fn test_edge_symmetry_under_updates() {
    let (_dir, db) = open_db(2);
    for id in 1..=4u64 {
        db.add(id, &[id as f32, 1.0], None, "text").unwrap();
    }
    db.link(1, 2, RelType::Supports, 0.5).unwrap();
    db.link(1, 2, RelType::Supports, 0.9).unwrap(); // weight update
    db.link(1, 2, RelType::Contradicts, 0.2).unwrap(); // second rel, same pair
    db.link(3, 2, RelType::CausedBy, 1.0).unwrap();
    db.link(4, 4, RelType::MultimodalOf, 1.0).unwrap(); // self-loop

    // Every outgoing edge must appear exactly once in the target's
    // incoming list with identical relation and weight.
    for source in 1..=4u64 {
        for edge in db.get_edges(source) {
            let mirrored: Vec<_> = db
                .get_incoming(edge.target_id)
                .into_iter()
                .filter(|ie| ie.source_id == source && ie.rel_type == edge.rel_type)
                .collect();
            assert_eq!(mirrored.len(), 1);
            assert_eq!(mirrored[0].weight, edge.weight);
        }
    }

    assert_eq!(db.get_edges(1).len(), 2);
    let weights: HashMap<String, f32> = db
        .get_edges(1)
        .iter()
        .map(|e| (e.rel_type.as_str().to_string(), e.weight))
        .collect();
    assert_eq!(weights["supports"], 0.9);
}

#[test]
fn test_links_cache_is_distinct_targets() {
    let (_dir, db) = open_db(2);
    db.add(1, &[1.0, 0.0], None, "text").unwrap();
    db.link(1, 2, RelType::Supports, 1.0).unwrap();
    db.link(1, 2, RelType::Contradicts, 1.0).unwrap();
    db.link(1, 3, RelType::RelatedTo, 1.0).unwrap();

    assert_eq!(db.get_metadata(1).unwrap().links, vec![2, 3]);
}

#[test]
fn test_link_unknown_source_fails() {
    let (_dir, db) = open_db(2);
    assert!(matches!(
        db.link(99, 1, RelType::RelatedTo, 1.0),
        Err(FeatherError::NotFound(99))
    ));
}

#[test]
fn test_opaque_rel_type_roundtrip() {
    let (_dir, db) = open_db(2);
    db.add(1, &[1.0, 0.0], None, "text").unwrap();
    db.link(1, 2, RelType::parse("mentored_by"), 0.7).unwrap();
    assert_eq!(db.get_edges(1)[0].rel_type.as_str(), "mentored_by");
}

// ==================== Auto-link ====================

#[test]
fn test_auto_link_similarity_threshold() {
    let (_dir, db) = open_db(2);
    // Two tight clusters far apart.
    db.add(1, &[1.0, 0.0], None, "text").unwrap();
    db.add(2, &[0.99, 0.01], None, "text").unwrap();
    db.add(3, &[0.0, 1.0], None, "text").unwrap();
    db.add(4, &[0.01, 0.99], None, "text").unwrap();

    let created = db.auto_link("text", 0.9, RelType::RelatedTo, 5).unwrap();
    assert!(created >= 4, "expected edges within both clusters, got {created}");

    // Cluster-internal edges exist in both directions.
    assert!(db.get_edges(1).iter().any(|e| e.target_id == 2));
    assert!(db.get_edges(2).iter().any(|e| e.target_id == 1));
    // No cross-cluster edge clears the threshold.
    assert!(!db.get_edges(1).iter().any(|e| e.target_id == 3 || e.target_id == 4));
}

#[test]
fn test_auto_link_no_self_loops() {
    let (_dir, db) = open_db(2);
    for i in 0..10u64 {
        let angle = i as f32 * 0.1;
        db.add(i, &[angle.cos(), angle.sin()], None, "text").unwrap();
    }
    db.auto_link("text", 0.5, RelType::RelatedTo, 4).unwrap();

    for i in 0..10u64 {
        assert!(
            !db.get_edges(i).iter().any(|e| e.target_id == i),
            "auto_link created a self-loop on {i}"
        );
    }
}

#[test]
fn test_auto_link_idempotent() {
    let (_dir, db) = open_db(2);
    db.add(1, &[1.0, 0.0], None, "text").unwrap();
    db.add(2, &[0.99, 0.01], None, "text").unwrap();

    let first = db.auto_link("text", 0.9, RelType::RelatedTo, 3).unwrap();
    assert!(first > 0);
    let second = db.auto_link("text", 0.9, RelType::RelatedTo, 3).unwrap();
    assert_eq!(second, 0, "re-running auto_link must not create duplicates");
}

#[test]
fn test_auto_link_bad_threshold() {
    let (_dir, db) = open_db(2);
    assert!(matches!(
        db.auto_link("text", 1.5, RelType::RelatedTo, 5),
        Err(FeatherError::InvalidArgument(_))
    ));
    assert!(matches!(
        db.auto_link("text", -1.5, RelType::RelatedTo, 5),
        Err(FeatherError::InvalidArgument(_))
    ));
}

#[test]
fn test_auto_link_unknown_modality_is_zero() {
    let (_dir, db) = open_db(2);
    assert_eq!(db.auto_link("nope", 0.9, RelType::RelatedTo, 5).unwrap(), 0);
}

// ==================== Context chains ====================

fn chain_fixture(db: &Feather) {
    let vec_a = [1.0, 0.0, 0.0];
    let vec_b = [0.0, 1.0, 0.0];
    let vec_c = [0.0, 0.0, 1.0];
    db.add(1, &vec_a, Some(MetadataBuilder::new(ContextType::Fact, "A").build()), "text")
        .unwrap();
    db.add(2, &vec_b, Some(MetadataBuilder::new(ContextType::Fact, "B").build()), "text")
        .unwrap();
    db.add(3, &vec_c, Some(MetadataBuilder::new(ContextType::Fact, "C").build()), "text")
        .unwrap();
    db.link(1, 2, RelType::DerivedFrom, 1.0).unwrap();
    db.link(2, 3, RelType::DerivedFrom, 1.0).unwrap();
}

#[test]
fn test_context_chain_hops() {
    let (_dir, db) = open_db(3);
    chain_fixture(&db);

    let result = db.context_chain(&[1.0, 0.0, 0.0], 1, 2, "text").unwrap();
    assert_eq!(result.nodes.len(), 3);

    let hops: HashMap<u64, u32> = result.nodes.iter().map(|n| (n.id, n.hop)).collect();
    assert_eq!(hops[&1], 0);
    assert_eq!(hops[&2], 1);
    assert_eq!(hops[&3], 2);
    assert_eq!(result.edges.len(), 2);
}

#[test]
fn test_context_chain_scores_monotone() {
    let (_dir, db) = open_db(3);
    chain_fixture(&db);

    let result = db.context_chain(&[1.0, 0.0, 0.0], 1, 2, "text").unwrap();
    let by_id: HashMap<u64, &feather_db::ChainNode> =
        result.nodes.iter().map(|n| (n.id, n)).collect();

    // Seed carries its similarity; expanded nodes carry zero similarity.
    assert!(by_id[&1].similarity > 0.99);
    assert_eq!(by_id[&2].similarity, 0.0);

    // Non-seed scores never exceed their parent's score.
    assert!(by_id[&2].score <= by_id[&1].score);
    assert!(by_id[&3].score <= by_id[&2].score);

    // Nodes are sorted by score descending.
    for pair in result.nodes.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_context_chain_hops_zero_is_seeds_only() {
    let (_dir, db) = open_db(3);
    chain_fixture(&db);

    let result = db.context_chain(&[1.0, 0.0, 0.0], 2, 0, "text").unwrap();
    assert_eq!(result.nodes.len(), 2);
    assert!(result.nodes.iter().all(|n| n.hop == 0));
    assert!(result.edges.is_empty());
}

#[test]
fn test_context_chain_touches_seeds() {
    let (_dir, db) = open_db(3);
    chain_fixture(&db);

    db.context_chain(&[1.0, 0.0, 0.0], 1, 2, "text").unwrap();
    assert_eq!(db.get_metadata(1).unwrap().recall_count, 1);
    // Expanded nodes are not recalls.
    assert_eq!(db.get_metadata(2).unwrap().recall_count, 0);
}

#[test]
fn test_context_chain_empty_db() {
    let (_dir, db) = open_db(3);
    let result = db.context_chain(&[1.0, 0.0, 0.0], 5, 2, "text").unwrap();
    assert!(result.nodes.is_empty());
    assert!(result.edges.is_empty());
}

// ==================== Export ====================

#[test]
fn test_export_graph_json_shape() {
    let (_dir, db) = open_db(2);
    let meta = MetadataBuilder::new(ContextType::Preference, "dark mode")
        .namespace("acme")
        .entity("user-1")
        .source("settings")
        .attribute("surface", "web")
        .importance(0.6)
        .build();
    db.add(1, &[1.0, 0.0], Some(meta), "text").unwrap();
    db.add(2, &[0.0, 1.0], None, "text").unwrap();
    db.link(1, 2, RelType::Supports, 0.4).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&db.export_graph_json(None, None).unwrap()).unwrap();

    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    let node = nodes.iter().find(|n| n["id"] == 1).unwrap();
    assert_eq!(node["label"], "dark mode");
    assert_eq!(node["type"], 1);
    assert_eq!(node["namespace_id"], "acme");
    assert_eq!(node["entity_id"], "user-1");
    assert_eq!(node["source"], "settings");
    assert_eq!(node["attributes"]["surface"], "web");

    let edges = json["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source"], 1);
    assert_eq!(edges[0]["target"], 2);
    assert_eq!(edges[0]["rel_type"], "supports");
}

#[test]
fn test_export_namespace_filter() {
    let (_dir, db) = open_db(2);
    for (id, ns) in [(1u64, "a"), (2, "a"), (3, "b")] {
        let meta = MetadataBuilder::new(ContextType::Fact, format!("r{id}"))
            .namespace(ns)
            .build();
        db.add(id, &[id as f32, 0.0], Some(meta), "text").unwrap();
    }
    db.link(1, 2, RelType::RelatedTo, 1.0).unwrap();
    db.link(1, 3, RelType::RelatedTo, 1.0).unwrap();

    let export = db.export_graph(Some("a"), None);
    assert_eq!(export.nodes.len(), 2);
    assert_eq!(export.edges.len(), 1, "edge into namespace b must be dropped");
}
