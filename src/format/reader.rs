//! Loads a .feather snapshot back into database state.

use std::collections::HashMap;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, warn};

use crate::graph::ContextGraph;
use crate::index::{HnswConfig, HnswIndex};
use crate::store::{MetadataStore, VectorStore};
use crate::types::{
    ContextType, Edge, FeatherError, FeatherResult, IncomingEdge, Metadata, RelType,
    FEATHER_MAGIC, FORMAT_VERSION,
};

use super::{SectionKind, HEADER_SIZE, SECTION_ENTRY_SIZE};

/// Everything a snapshot holds, ready to assemble a database.
pub struct SnapshotParts {
    /// `(name, vectors, index)` per modality, in snapshot order.
    pub modalities: Vec<(String, VectorStore, HnswIndex)>,
    pub metadata: MetadataStore,
    pub graph: ContextGraph,
}

/// Reader for .feather snapshots.
pub struct SnapshotReader;

impl SnapshotReader {
    /// Memory-map and parse a snapshot file.
    ///
    /// `hnsw_config` seeds restored indexes (graph parameters are not
    /// persisted). An absent `Hnsw` section triggers an index rebuild by
    /// re-insertion; an absent `GraphIn` section triggers reverse-index
    /// reconstruction from `GraphOut`.
    pub fn read_from_file(path: &Path, hnsw_config: &HnswConfig) -> FeatherResult<SnapshotParts> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::read_from_bytes(&mmap, hnsw_config)
    }

    /// Parse a snapshot from raw bytes.
    pub fn read_from_bytes(data: &[u8], hnsw_config: &HnswConfig) -> FeatherResult<SnapshotParts> {
        if data.len() < HEADER_SIZE + 4 {
            return Err(FeatherError::Truncated);
        }
        if data[0..8] != FEATHER_MAGIC {
            return Err(FeatherError::InvalidMagic);
        }
        let version = u16::from_le_bytes([data[8], data[9]]);
        if version > FORMAT_VERSION {
            return Err(FeatherError::UnsupportedVersion(version));
        }

        let section_count = u32::from_le_bytes(
            data[HEADER_SIZE..HEADER_SIZE + 4]
                .try_into()
                .unwrap(),
        ) as usize;

        let table_end = HEADER_SIZE + 4 + section_count * SECTION_ENTRY_SIZE;
        if data.len() < table_end {
            return Err(FeatherError::Truncated);
        }

        let mut modalities_payload: Option<&[u8]> = None;
        let mut metadata_payload: Option<&[u8]> = None;
        let mut graph_out_payload: Option<&[u8]> = None;
        let mut graph_in_payload: Option<&[u8]> = None;
        let mut vectors_payloads: Vec<&[u8]> = Vec::new();
        let mut id_map_payloads: Vec<&[u8]> = Vec::new();
        let mut hnsw_payloads: Vec<&[u8]> = Vec::new();

        for i in 0..section_count {
            let entry = &data[HEADER_SIZE + 4 + i * SECTION_ENTRY_SIZE..];
            let kind_raw = u16::from_le_bytes([entry[0], entry[1]]);
            let offset = u64::from_le_bytes(entry[2..10].try_into().unwrap()) as usize;
            let length = u64::from_le_bytes(entry[10..18].try_into().unwrap()) as usize;

            let end = offset.checked_add(length).ok_or(FeatherError::Corrupt(offset as u64))?;
            if end > data.len() {
                return Err(FeatherError::Truncated);
            }
            let payload = &data[offset..end];

            match SectionKind::from_u16(kind_raw) {
                Some(SectionKind::Modalities) => modalities_payload = Some(payload),
                Some(SectionKind::Vectors) => vectors_payloads.push(payload),
                Some(SectionKind::IdMap) => id_map_payloads.push(payload),
                Some(SectionKind::Hnsw) => hnsw_payloads.push(payload),
                Some(SectionKind::Metadata) => metadata_payload = Some(payload),
                Some(SectionKind::GraphOut) => graph_out_payload = Some(payload),
                Some(SectionKind::GraphIn) => graph_in_payload = Some(payload),
                None => {
                    warn!(kind = kind_raw, "skipping unknown snapshot section");
                }
            }
        }

        let modality_headers =
            decode_modalities(modalities_payload.ok_or(FeatherError::MissingSection("MODALITIES"))?)?;
        if vectors_payloads.len() != modality_headers.len() {
            return Err(FeatherError::MissingSection("VECTORS"));
        }
        if id_map_payloads.len() != modality_headers.len() {
            return Err(FeatherError::MissingSection("ID_MAP"));
        }

        let rebuild_indexes = hnsw_payloads.len() != modality_headers.len();
        if rebuild_indexes && !modality_headers.is_empty() {
            warn!("HNSW sections absent or incomplete; rebuilding indexes from vectors");
        }

        let mut modalities = Vec::with_capacity(modality_headers.len());
        for (i, (name, dim, n_slots)) in modality_headers.into_iter().enumerate() {
            let store = decode_vectors(vectors_payloads[i], id_map_payloads[i], dim, n_slots)?;
            let index = if rebuild_indexes {
                let mut index = HnswIndex::new(hnsw_config.clone());
                for slot in 0..store.len() as u32 {
                    index.insert(slot, &store);
                }
                index
            } else {
                decode_hnsw(hnsw_payloads[i], hnsw_config, n_slots)?
            };
            debug!(modality = %name, dim, n_slots, "loaded modality");
            modalities.push((name, store, index));
        }

        let metadata =
            decode_metadata(metadata_payload.ok_or(FeatherError::MissingSection("METADATA"))?)?;
        let out =
            decode_graph_out(graph_out_payload.ok_or(FeatherError::MissingSection("GRAPH_OUT"))?)?;
        let incoming = match graph_in_payload {
            Some(payload) => Some(decode_graph_in(payload)?),
            None => None,
        };
        let graph = ContextGraph::from_parts(out, incoming);

        Ok(SnapshotParts {
            modalities,
            metadata,
            graph,
        })
    }
}

/// Bounds-checked little-endian cursor over a section payload.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> FeatherResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(FeatherError::Truncated)?;
        if end > self.buf.len() {
            return Err(FeatherError::Truncated);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> FeatherResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> FeatherResult<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> FeatherResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> FeatherResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> FeatherResult<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> FeatherResult<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn str_n(&mut self, len: usize) -> FeatherResult<String> {
        let offset = self.pos as u64;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FeatherError::Corrupt(offset))
    }

    fn str_u16(&mut self) -> FeatherResult<String> {
        let len = self.u16()? as usize;
        self.str_n(len)
    }

    fn str_u32(&mut self) -> FeatherResult<String> {
        let len = self.u32()? as usize;
        self.str_n(len)
    }
}

fn decode_modalities(payload: &[u8]) -> FeatherResult<Vec<(String, usize, usize)>> {
    let mut reader = ByteReader::new(payload);
    let count = reader.u32()? as usize;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        let name = reader.str_u16()?;
        let dim = reader.u32()? as usize;
        let n_slots = reader.u32()? as usize;
        headers.push((name, dim, n_slots));
    }
    Ok(headers)
}

fn decode_vectors(
    vectors: &[u8],
    id_map: &[u8],
    dim: usize,
    n_slots: usize,
) -> FeatherResult<VectorStore> {
    if vectors.len() != n_slots * dim * 4 {
        return Err(FeatherError::Corrupt(0));
    }
    if id_map.len() != n_slots * 12 {
        return Err(FeatherError::Corrupt(0));
    }

    let mut data = Vec::with_capacity(n_slots * dim);
    for chunk in vectors.chunks_exact(4) {
        data.push(f32::from_le_bytes(chunk.try_into().unwrap()));
    }

    let mut slot_to_id = vec![0u64; n_slots];
    let mut reader = ByteReader::new(id_map);
    for _ in 0..n_slots {
        let id = reader.u64()?;
        let slot = reader.u32()? as usize;
        if slot >= n_slots {
            return Err(FeatherError::Corrupt(reader.pos as u64));
        }
        slot_to_id[slot] = id;
    }

    Ok(VectorStore::from_parts(dim, data, slot_to_id))
}

fn decode_hnsw(payload: &[u8], config: &HnswConfig, n_slots: usize) -> FeatherResult<HnswIndex> {
    let mut reader = ByteReader::new(payload);
    let entry_raw = reader.u32()?;
    let entry_point = (entry_raw != u32::MAX).then_some(entry_raw);
    let max_layer = reader.u8()?;

    let mut levels = Vec::with_capacity(n_slots);
    let mut layers: Vec<Vec<Vec<u32>>> = vec![Vec::with_capacity(n_slots); max_layer as usize + 1];

    for _ in 0..n_slots {
        let level = reader.u8()?;
        if level > max_layer {
            return Err(FeatherError::Corrupt(reader.pos as u64));
        }
        levels.push(level);
        for (layer, storage) in layers.iter_mut().enumerate() {
            if layer <= level as usize {
                let count = reader.u32()? as usize;
                let mut neighbors = Vec::with_capacity(count);
                for _ in 0..count {
                    let neighbor = reader.u32()?;
                    if neighbor as usize >= n_slots {
                        return Err(FeatherError::Corrupt(reader.pos as u64));
                    }
                    neighbors.push(neighbor);
                }
                storage.push(neighbors);
            } else {
                storage.push(Vec::new());
            }
        }
    }

    Ok(HnswIndex::from_parts(
        config.clone(),
        levels,
        layers,
        entry_point,
        max_layer,
    ))
}

fn decode_metadata(payload: &[u8]) -> FeatherResult<MetadataStore> {
    let mut reader = ByteReader::new(payload);
    let count = reader.u32()? as usize;
    let mut records = HashMap::with_capacity(count);

    for _ in 0..count {
        let id = reader.u64()?;
        let timestamp = reader.i64()?;
        let importance = reader.f32()?;
        let type_offset = reader.pos as u64;
        let type_byte = reader.u8()?;
        let context_type =
            ContextType::from_u8(type_byte).ok_or(FeatherError::Corrupt(type_offset))?;
        let recall_count = reader.u32()?;
        let last_recalled_at = reader.u64()?;
        let source = reader.str_u16()?;
        let content = reader.str_u32()?;
        let tags_json = reader.str_u16()?;
        let namespace_id = reader.str_u16()?;
        let entity_id = reader.str_u16()?;

        let attr_count = reader.u16()? as usize;
        let mut attributes = std::collections::BTreeMap::new();
        for _ in 0..attr_count {
            let key = reader.str_u16()?;
            let value = reader.str_u32()?;
            attributes.insert(key, value);
        }

        records.insert(
            id,
            Metadata {
                timestamp,
                importance,
                context_type,
                source,
                content,
                tags_json,
                namespace_id,
                entity_id,
                attributes,
                recall_count,
                last_recalled_at,
                links: Vec::new(),
            },
        );
    }

    Ok(MetadataStore::from_parts(records))
}

fn decode_graph_out(payload: &[u8]) -> FeatherResult<HashMap<u64, Vec<Edge>>> {
    let mut reader = ByteReader::new(payload);
    let source_count = reader.u32()? as usize;
    let mut out = HashMap::with_capacity(source_count);

    for _ in 0..source_count {
        let source_id = reader.u64()?;
        let edge_count = reader.u32()? as usize;
        let mut edges = Vec::with_capacity(edge_count);
        for _ in 0..edge_count {
            let target_id = reader.u64()?;
            let rel_len = reader.u8()? as usize;
            let rel = reader.str_n(rel_len)?;
            let weight = reader.f32()?;
            edges.push(Edge {
                target_id,
                rel_type: RelType::parse(&rel),
                weight,
            });
        }
        out.insert(source_id, edges);
    }

    Ok(out)
}

fn decode_graph_in(payload: &[u8]) -> FeatherResult<HashMap<u64, Vec<IncomingEdge>>> {
    let mut reader = ByteReader::new(payload);
    let target_count = reader.u32()? as usize;
    let mut incoming = HashMap::with_capacity(target_count);

    for _ in 0..target_count {
        let target_id = reader.u64()?;
        let edge_count = reader.u32()? as usize;
        let mut edges = Vec::with_capacity(edge_count);
        for _ in 0..edge_count {
            let source_id = reader.u64()?;
            let rel_len = reader.u8()? as usize;
            let rel = reader.str_n(rel_len)?;
            let weight = reader.f32()?;
            edges.push(IncomingEdge {
                source_id,
                rel_type: RelType::parse(&rel),
                weight,
            });
        }
        incoming.insert(target_id, edges);
    }

    Ok(incoming)
}
