//! Serializes database state to a .feather snapshot.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::graph::ContextGraph;
use crate::index::HnswIndex;
use crate::store::{MetadataStore, VectorStore};
use crate::types::{FeatherResult, Metadata, FEATHER_MAGIC, FORMAT_VERSION};

use super::{SectionKind, HEADER_SIZE, SECTION_ENTRY_SIZE};

/// Writer for .feather snapshots.
pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Write a full snapshot to a sibling temp file and atomically rename
    /// it over `path`. Readers holding only in-memory state are unaffected.
    pub fn write_to_file(
        path: &Path,
        modalities: &[(&str, &VectorStore, &HnswIndex)],
        metadata: &MetadataStore,
        graph: &ContextGraph,
    ) -> FeatherResult<()> {
        let mut sections: Vec<(SectionKind, Vec<u8>)> = Vec::new();

        sections.push((SectionKind::Modalities, encode_modalities(modalities)));
        for &(_, store, index) in modalities {
            sections.push((SectionKind::Vectors, encode_vectors(store)));
            sections.push((SectionKind::IdMap, encode_id_map(store)));
            sections.push((SectionKind::Hnsw, encode_hnsw(index, store.len())));
        }
        sections.push((SectionKind::Metadata, encode_metadata(metadata)));
        sections.push((SectionKind::GraphOut, encode_graph_out(graph)));
        sections.push((SectionKind::GraphIn, encode_graph_in(graph)));

        let table_size = sections.len() * SECTION_ENTRY_SIZE;
        let mut offset = (HEADER_SIZE + 4 + table_size) as u64;

        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(&FEATHER_MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&[0u8; 6]);
        buf.extend_from_slice(&(sections.len() as u32).to_le_bytes());
        for (kind, payload) in &sections {
            buf.extend_from_slice(&(*kind as u16).to_le_bytes());
            buf.extend_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
            offset += payload.len() as u64;
        }
        for (_, payload) in &sections {
            buf.extend_from_slice(payload);
        }

        debug!(
            sections = sections.len(),
            bytes = buf.len(),
            path = %path.display(),
            "writing snapshot"
        );

        let tmp_path = path.with_extension("feather.tmp");
        {
            let file = std::fs::File::create(&tmp_path)?;
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(&buf)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn put_str_u16(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u16).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

fn put_str_u32(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

fn encode_modalities(modalities: &[(&str, &VectorStore, &HnswIndex)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(modalities.len() as u32).to_le_bytes());
    for &(name, store, _) in modalities {
        put_str_u16(&mut buf, name);
        buf.extend_from_slice(&(store.dim() as u32).to_le_bytes());
        buf.extend_from_slice(&(store.len() as u32).to_le_bytes());
    }
    buf
}

fn encode_vectors(store: &VectorStore) -> Vec<u8> {
    let mut buf = Vec::with_capacity(store.raw().len() * 4);
    for &value in store.raw() {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

fn encode_id_map(store: &VectorStore) -> Vec<u8> {
    let mut buf = Vec::with_capacity(store.len() * 12);
    for (slot, &id) in store.ids().iter().enumerate() {
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&(slot as u32).to_le_bytes());
    }
    buf
}

fn encode_hnsw(index: &HnswIndex, n_slots: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&index.entry_point().unwrap_or(u32::MAX).to_le_bytes());
    buf.push(index.max_layer());
    for slot in 0..n_slots as u32 {
        let level = index.level_of(slot);
        buf.push(level);
        for layer in 0..=level as usize {
            let neighbors = index.neighbors(layer, slot);
            buf.extend_from_slice(&(neighbors.len() as u32).to_le_bytes());
            for &neighbor in neighbors {
                buf.extend_from_slice(&neighbor.to_le_bytes());
            }
        }
    }
    buf
}

fn encode_metadata_record(buf: &mut Vec<u8>, id: u64, meta: &Metadata) {
    buf.extend_from_slice(&id.to_le_bytes());
    buf.extend_from_slice(&meta.timestamp.to_le_bytes());
    buf.extend_from_slice(&meta.importance.to_le_bytes());
    buf.push(meta.context_type as u8);
    buf.extend_from_slice(&meta.recall_count.to_le_bytes());
    buf.extend_from_slice(&meta.last_recalled_at.to_le_bytes());
    put_str_u16(buf, &meta.source);
    put_str_u32(buf, &meta.content);
    put_str_u16(buf, &meta.tags_json);
    put_str_u16(buf, &meta.namespace_id);
    put_str_u16(buf, &meta.entity_id);
    buf.extend_from_slice(&(meta.attributes.len() as u16).to_le_bytes());
    for (key, value) in &meta.attributes {
        put_str_u16(buf, key);
        put_str_u32(buf, value);
    }
}

fn encode_metadata(metadata: &MetadataStore) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
    // Sorted by ID so snapshots of equal state are byte-identical.
    let mut records: Vec<(&u64, &Metadata)> = metadata.iter().collect();
    records.sort_by_key(|(id, _)| **id);
    for (&id, meta) in records {
        encode_metadata_record(&mut buf, id, meta);
    }
    buf
}

fn encode_graph_out(graph: &ContextGraph) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut sources: Vec<(&u64, &Vec<crate::types::Edge>)> = graph.iter_out().collect();
    sources.sort_by_key(|(id, _)| **id);
    buf.extend_from_slice(&(sources.len() as u32).to_le_bytes());
    for (&source_id, edges) in sources {
        buf.extend_from_slice(&source_id.to_le_bytes());
        buf.extend_from_slice(&(edges.len() as u32).to_le_bytes());
        for edge in edges {
            buf.extend_from_slice(&edge.target_id.to_le_bytes());
            let rel = edge.rel_type.as_str();
            buf.push(rel.len().min(255) as u8);
            buf.extend_from_slice(&rel.as_bytes()[..rel.len().min(255)]);
            buf.extend_from_slice(&edge.weight.to_le_bytes());
        }
    }
    buf
}

fn encode_graph_in(graph: &ContextGraph) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut targets: Vec<(&u64, &Vec<crate::types::IncomingEdge>)> =
        graph.iter_incoming().collect();
    targets.sort_by_key(|(id, _)| **id);
    buf.extend_from_slice(&(targets.len() as u32).to_le_bytes());
    for (&target_id, edges) in targets {
        buf.extend_from_slice(&target_id.to_le_bytes());
        buf.extend_from_slice(&(edges.len() as u32).to_le_bytes());
        for edge in edges {
            buf.extend_from_slice(&edge.source_id.to_le_bytes());
            let rel = edge.rel_type.as_str();
            buf.push(rel.len().min(255) as u8);
            buf.extend_from_slice(&rel.as_bytes()[..rel.len().min(255)]);
            buf.extend_from_slice(&edge.weight.to_le_bytes());
        }
    }
    buf
}
