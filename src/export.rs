//! Graph export in the JSON shape consumed by visualization clients.

use serde::Serialize;

use crate::graph::ContextGraph;
use crate::store::MetadataStore;

/// One exported node. `label` is the record content truncated for display.
#[derive(Debug, Clone, Serialize)]
pub struct ExportNode {
    pub id: u64,
    pub label: String,
    #[serde(rename = "type")]
    pub context_type: u8,
    pub importance: f32,
    pub recall_count: u32,
    pub namespace_id: String,
    pub entity_id: String,
    pub source: String,
    pub attributes: std::collections::BTreeMap<String, String>,
}

/// One exported edge. Edges pointing outside the exported node set are dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ExportEdge {
    pub source: u64,
    pub target: u64,
    pub rel_type: String,
    pub weight: f32,
}

/// The complete export payload.
#[derive(Debug, Clone, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

const LABEL_MAX: usize = 60;

/// Flatten metadata and edges into an export, optionally restricted to a
/// namespace and/or entity.
pub(crate) fn build_export(
    metadata: &MetadataStore,
    graph: &ContextGraph,
    namespace_filter: Option<&str>,
    entity_filter: Option<&str>,
) -> GraphExport {
    let included = |ns: &str, eid: &str| -> bool {
        namespace_filter.map_or(true, |f| ns == f) && entity_filter.map_or(true, |f| eid == f)
    };

    let mut nodes: Vec<ExportNode> = metadata
        .iter()
        .filter(|(_, meta)| included(&meta.namespace_id, &meta.entity_id))
        .map(|(&id, meta)| {
            let label: String = meta.content.chars().take(LABEL_MAX).collect();
            ExportNode {
                id,
                label,
                context_type: meta.context_type as u8,
                importance: meta.importance,
                recall_count: meta.recall_count,
                namespace_id: meta.namespace_id.clone(),
                entity_id: meta.entity_id.clone(),
                source: meta.source.clone(),
                attributes: meta.attributes.clone(),
            }
        })
        .collect();
    nodes.sort_by_key(|n| n.id);

    let node_ids: std::collections::HashSet<u64> = nodes.iter().map(|n| n.id).collect();

    let mut edges: Vec<ExportEdge> = Vec::new();
    for (&source, out) in graph.iter_out() {
        if !node_ids.contains(&source) {
            continue;
        }
        for edge in out {
            if !node_ids.contains(&edge.target_id) {
                continue;
            }
            edges.push(ExportEdge {
                source,
                target: edge.target_id,
                rel_type: edge.rel_type.as_str().to_string(),
                weight: edge.weight,
            });
        }
    }
    edges.sort_by(|a, b| (a.source, a.target).cmp(&(b.source, b.target)));

    GraphExport { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextType, MetadataBuilder, RelType};

    fn fixture() -> (MetadataStore, ContextGraph) {
        let mut metadata = MetadataStore::new();
        metadata.upsert(
            1,
            MetadataBuilder::new(ContextType::Fact, "alpha")
                .namespace("a")
                .build(),
        );
        metadata.upsert(
            2,
            MetadataBuilder::new(ContextType::Event, "beta")
                .namespace("a")
                .build(),
        );
        metadata.upsert(
            3,
            MetadataBuilder::new(ContextType::Fact, "gamma")
                .namespace("b")
                .build(),
        );

        let mut graph = ContextGraph::new();
        graph.link(1, 2, RelType::Supports, 0.9);
        graph.link(1, 3, RelType::RelatedTo, 0.5);
        (metadata, graph)
    }

    #[test]
    fn test_export_all() {
        let (metadata, graph) = fixture();
        let export = build_export(&metadata, &graph, None, None);
        assert_eq!(export.nodes.len(), 3);
        assert_eq!(export.edges.len(), 2);
    }

    #[test]
    fn test_namespace_filter_drops_dangling_edges() {
        let (metadata, graph) = fixture();
        let export = build_export(&metadata, &graph, Some("a"), None);
        assert_eq!(export.nodes.len(), 2);
        // The 1 -> 3 edge crosses out of the exported set and is dropped.
        assert_eq!(export.edges.len(), 1);
        assert_eq!(export.edges[0].target, 2);
    }

    #[test]
    fn test_json_shape() {
        let (metadata, graph) = fixture();
        let export = build_export(&metadata, &graph, None, None);
        let json = serde_json::to_value(&export).unwrap();
        let node = &json["nodes"][0];
        for field in [
            "id",
            "label",
            "type",
            "importance",
            "recall_count",
            "namespace_id",
            "entity_id",
            "source",
            "attributes",
        ] {
            assert!(!node[field].is_null(), "node field {field} missing");
        }
        let edge = &json["edges"][0];
        for field in ["source", "target", "rel_type", "weight"] {
            assert!(!edge[field].is_null(), "edge field {field} missing");
        }
    }
}
