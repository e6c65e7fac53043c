//! The database orchestrator: the public operation surface and the
//! locking discipline that makes it thread-safe.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::engine::score_hit;
use crate::export::{build_export, GraphExport};
use crate::format::{SnapshotReader, SnapshotWriter};
use crate::graph::{
    chain, ChainNode, ContextChainConfig, ContextChainResult, ContextGraph,
};
use crate::index::{similarity_from_distance, HnswConfig, HnswIndex};
use crate::store::{MetadataStore, VectorStore};
use crate::types::{
    now_secs, validate_modality, Edge, FeatherError, FeatherResult, IncomingEdge, Metadata,
    RelType, ScoringConfig, SearchFilter, DEFAULT_MODALITY,
};

/// One search result: the record, its score, and its metadata as of the
/// recall this search performed.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: u64,
    pub score: f32,
    pub metadata: Metadata,
}

/// Vector store plus ANN index for one modality. Guarded by a single
/// lock so searches always observe a fully-inserted graph.
struct Modality {
    store: VectorStore,
    index: HnswIndex,
}

impl Modality {
    fn new(dim: usize, config: HnswConfig) -> Self {
        Self {
            store: VectorStore::new(dim),
            index: HnswIndex::new(config),
        }
    }
}

/// An embedded multi-modal vector + context-graph database.
///
/// All public operations are safe to call from any thread. Locks are
/// always acquired in the fixed order modality → metadata → graph, and
/// `save()` snapshots each section under read locks in that same order
/// (modalities in sorted name order).
pub struct Feather {
    path: PathBuf,
    hnsw_config: HnswConfig,
    chain_config: ContextChainConfig,
    modalities: RwLock<BTreeMap<String, Arc<RwLock<Modality>>>>,
    metadata: RwLock<MetadataStore>,
    graph: RwLock<ContextGraph>,
}

impl Feather {
    /// Open a database file, or initialize an empty database whose
    /// `"text"` modality has dimension `default_dim` if the file does not
    /// exist yet.
    pub fn open(path: impl AsRef<Path>, default_dim: usize) -> FeatherResult<Self> {
        Self::open_with_config(path, default_dim, HnswConfig::default())
    }

    /// `open` with explicit HNSW parameters.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        default_dim: usize,
        hnsw_config: HnswConfig,
    ) -> FeatherResult<Self> {
        let path = path.as_ref().to_path_buf();
        if default_dim == 0 {
            return Err(FeatherError::InvalidArgument(
                "default_dim must be positive".to_string(),
            ));
        }

        let db = Self {
            path,
            hnsw_config: hnsw_config.clone(),
            chain_config: ContextChainConfig::default(),
            modalities: RwLock::new(BTreeMap::new()),
            metadata: RwLock::new(MetadataStore::new()),
            graph: RwLock::new(ContextGraph::new()),
        };

        if db.path.exists() {
            let parts = SnapshotReader::read_from_file(&db.path, &hnsw_config)?;
            let mut modalities = db.modalities.write();
            for (name, store, index) in parts.modalities {
                modalities.insert(name, Arc::new(RwLock::new(Modality { store, index })));
            }
            drop(modalities);

            let mut metadata = parts.metadata;
            let graph = parts.graph;
            // The links cache is derived state; refresh it from the graph.
            let ids: Vec<u64> = metadata.iter().map(|(&id, _)| id).collect();
            for id in ids {
                metadata.set_links(id, graph.targets_of(id));
            }
            *db.metadata.write() = metadata;
            *db.graph.write() = graph;
            debug!(path = %db.path.display(), records = db.size(), "opened snapshot");
        }

        let needs_default = db.modalities.read().is_empty();
        if needs_default {
            db.modalities.write().insert(
                DEFAULT_MODALITY.to_string(),
                Arc::new(RwLock::new(Modality::new(default_dim, hnsw_config))),
            );
        }

        Ok(db)
    }

    /// The snapshot path this database saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modality_handle(&self, name: &str) -> Option<Arc<RwLock<Modality>>> {
        self.modalities.read().get(name).cloned()
    }

    fn get_or_create_modality(
        &self,
        name: &str,
        dim: usize,
    ) -> FeatherResult<Arc<RwLock<Modality>>> {
        if let Some(handle) = self.modality_handle(name) {
            return Ok(handle);
        }
        validate_modality(name)?;
        let mut modalities = self.modalities.write();
        Ok(modalities
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(RwLock::new(Modality::new(dim, self.hnsw_config.clone())))
            })
            .clone())
    }

    /// Upsert a vector under a modality, and metadata iff `meta` is given.
    ///
    /// The first insert into a modality fixes its dimension; later
    /// inserts must match or fail with `DimMismatch`. A record always
    /// gets a (default) metadata entry so every live slot is resolvable.
    pub fn add(
        &self,
        id: u64,
        vec: &[f32],
        meta: Option<Metadata>,
        modality: &str,
    ) -> FeatherResult<()> {
        if vec.is_empty() {
            return Err(FeatherError::InvalidArgument(
                "vector must not be empty".to_string(),
            ));
        }
        let handle = self.get_or_create_modality(modality, vec.len())?;
        {
            let mut guard = handle.write();
            let modality = &mut *guard;
            let (slot, created) = modality.store.upsert(id, vec)?;
            if created {
                modality.index.insert(slot, &modality.store);
            }
        }

        let mut metadata = self.metadata.write();
        match meta {
            Some(meta) => metadata.upsert(id, meta),
            None => metadata.ensure(id),
        }
        Ok(())
    }

    /// k-nearest search with optional filtering and decay re-ranking.
    ///
    /// Every returned record is touched (its recall counter moves
    /// forward) and the returned metadata reflects that recall. An
    /// unknown modality or an empty index yields an empty result, never
    /// an error.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        modality: &str,
        filter: Option<&SearchFilter>,
        scoring: Option<&ScoringConfig>,
    ) -> FeatherResult<Vec<SearchHit>> {
        if k == 0 {
            return Err(FeatherError::InvalidArgument("k must be positive".to_string()));
        }
        let Some(handle) = self.modality_handle(modality) else {
            return Ok(Vec::new());
        };

        let guard = handle.read();
        if guard.store.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != guard.store.dim() {
            return Err(FeatherError::DimMismatch {
                expected: guard.store.dim(),
                got: query.len(),
            });
        }

        let filtering = filter.map_or(false, |f| !f.is_empty());
        let rescoring = scoring.map_or(false, |s| s.time_weight > 0.0);
        let mut pool = if filtering || rescoring {
            (k * 4).max(50)
        } else {
            k
        };

        // (id, distance) survivors of the filter, in raw ANN order.
        let mut survivors: Vec<(u64, f32)>;
        loop {
            let ef = self.hnsw_config.ef_search.max(pool);
            let raw = guard.index.search(query, pool, ef, &guard.store);
            let exhausted = raw.len() < pool || pool >= guard.store.len();

            let metadata = self.metadata.read();
            survivors = raw
                .iter()
                .filter_map(|&(slot, dist)| {
                    let id = guard.store.id_at(slot);
                    let keep = match filter {
                        Some(f) => metadata.get(id).map_or(false, |meta| f.matches(meta)),
                        None => true,
                    };
                    keep.then_some((id, dist))
                })
                .collect();
            drop(metadata);

            if survivors.len() >= k || exhausted {
                break;
            }
            pool *= 2;
        }

        let now = now_secs();
        let mut metadata = self.metadata.write();
        let mut hits: Vec<SearchHit> = survivors
            .into_iter()
            .map(|(id, dist)| {
                let score = match scoring {
                    Some(config) => metadata
                        .get(id)
                        .map(|meta| score_hit(dist, meta, config, now))
                        .unwrap_or_else(|| similarity_from_distance(dist)),
                    None => similarity_from_distance(dist),
                };
                SearchHit {
                    id,
                    score,
                    metadata: Metadata::default(),
                }
            })
            .collect();

        // Stable sort: ties keep raw ANN order (smaller slot first).
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);

        for hit in &mut hits {
            let _ = metadata.touch(hit.id);
            if let Some(meta) = metadata.get(hit.id) {
                hit.metadata = meta.clone();
            }
        }
        Ok(hits)
    }

    /// Direct metadata lookup.
    pub fn get_metadata(&self, id: u64) -> FeatherResult<Metadata> {
        self.metadata
            .read()
            .get(id)
            .cloned()
            .ok_or(FeatherError::NotFound(id))
    }

    /// Direct vector lookup within a modality.
    pub fn get_vector(&self, id: u64, modality: &str) -> FeatherResult<Vec<f32>> {
        let handle = self
            .modality_handle(modality)
            .ok_or_else(|| FeatherError::ModalityNotFound(modality.to_string()))?;
        let guard = handle.read();
        guard.store.vector_of(id).ok_or(FeatherError::NotFound(id))
    }

    /// Replace all mutable metadata fields, preserving recall counters
    /// and the links cache.
    pub fn update_metadata(&self, id: u64, meta: Metadata) -> FeatherResult<()> {
        self.metadata.write().update(id, meta)
    }

    /// Replace only the importance field.
    pub fn update_importance(&self, id: u64, importance: f32) -> FeatherResult<()> {
        self.metadata.write().update_importance(id, importance)
    }

    /// Record a recall of a record.
    pub fn touch(&self, id: u64) -> FeatherResult<()> {
        self.metadata.write().touch(id)
    }

    /// Create or re-weight a typed edge. The source record must exist;
    /// dangling targets are permitted and filtered at export time.
    pub fn link(&self, source_id: u64, target_id: u64, rel_type: RelType, weight: f32) -> FeatherResult<()> {
        self.link_counted(source_id, target_id, rel_type, weight)
            .map(|_| ())
    }

    /// `link`, reporting whether a new edge was created (false when an
    /// existing edge's weight was updated).
    fn link_counted(
        &self,
        source_id: u64,
        target_id: u64,
        rel_type: RelType,
        weight: f32,
    ) -> FeatherResult<bool> {
        let mut metadata = self.metadata.write();
        if metadata.get(source_id).is_none() {
            return Err(FeatherError::NotFound(source_id));
        }
        let mut graph = self.graph.write();
        let created = graph.link(source_id, target_id, rel_type, weight);
        metadata.set_links(source_id, graph.targets_of(source_id));
        Ok(created)
    }

    /// Outgoing edges of a record (empty for unknown IDs).
    pub fn get_edges(&self, id: u64) -> Vec<Edge> {
        self.graph.read().edges_from(id).to_vec()
    }

    /// Incoming edges of a record (empty for unknown IDs).
    pub fn get_incoming(&self, id: u64) -> Vec<IncomingEdge> {
        self.graph.read().edges_to(id).to_vec()
    }

    /// Batch-create edges between similar records of a modality.
    ///
    /// Runs a k-NN query per record and links it to every neighbor whose
    /// similarity clears `threshold`, with the similarity as the edge
    /// weight. Self-edges are excluded. Best-effort: individual link
    /// failures are logged, not propagated. Returns the number of edges
    /// newly created.
    pub fn auto_link(
        &self,
        modality: &str,
        threshold: f32,
        rel_type: RelType,
        candidates: usize,
    ) -> FeatherResult<usize> {
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(FeatherError::InvalidArgument(format!(
                "threshold must be in [-1, 1], got {threshold}"
            )));
        }
        if candidates == 0 {
            return Err(FeatherError::InvalidArgument(
                "candidates must be positive".to_string(),
            ));
        }
        let Some(handle) = self.modality_handle(modality) else {
            return Ok(0);
        };

        let mut pairs: Vec<(u64, u64, f32)> = Vec::new();
        {
            let guard = handle.read();
            let ef = self.hnsw_config.ef_search.max(candidates + 1);
            for slot in 0..guard.store.len() as u32 {
                let source_id = guard.store.id_at(slot);
                let query: Vec<f32> = guard.store.row(slot).to_vec();
                for (neighbor_slot, dist) in
                    guard.index.search(&query, candidates + 1, ef, &guard.store)
                {
                    if neighbor_slot == slot {
                        continue;
                    }
                    let similarity = similarity_from_distance(dist);
                    if similarity < threshold {
                        continue;
                    }
                    pairs.push((source_id, guard.store.id_at(neighbor_slot), similarity));
                }
            }
        }

        let mut created = 0usize;
        for (source_id, target_id, similarity) in pairs {
            match self.link_counted(source_id, target_id, rel_type.clone(), similarity) {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(source_id, target_id, %err, "auto_link: skipping edge");
                }
            }
        }
        Ok(created)
    }

    /// Vector-search-seeded breadth-first expansion through the graph.
    ///
    /// Seeds come from a plain search (they are touched like any search
    /// result) and carry their similarity; expanded nodes carry a score
    /// attenuated per hop and deduplicated by maximum.
    pub fn context_chain(
        &self,
        query: &[f32],
        k: usize,
        hops: u32,
        modality: &str,
    ) -> FeatherResult<ContextChainResult> {
        let seeds = self.search(query, k, modality, None, None)?;
        if seeds.is_empty() {
            return Ok(ContextChainResult::default());
        }
        let seed_pairs: Vec<(u64, f32)> = seeds.iter().map(|hit| (hit.id, hit.score)).collect();
        let seed_scores: std::collections::HashMap<u64, f32> =
            seed_pairs.iter().copied().collect();

        let graph = self.graph.read();
        let (nodes, edges) = chain::expand(&seed_pairs, &graph, hops, &self.chain_config);
        drop(graph);

        let metadata = self.metadata.read();
        let mut chain_nodes: Vec<ChainNode> = nodes
            .into_iter()
            .map(|(id, hop, score)| ChainNode {
                id,
                score,
                similarity: seed_scores.get(&id).copied().unwrap_or(0.0),
                hop,
                metadata: metadata.get(id).cloned().unwrap_or_default(),
            })
            .collect();
        drop(metadata);

        chain_nodes.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });

        Ok(ContextChainResult {
            nodes: chain_nodes,
            edges,
        })
    }

    /// The fixed dimension of a modality.
    pub fn dim(&self, modality: &str) -> FeatherResult<usize> {
        let handle = self
            .modality_handle(modality)
            .ok_or_else(|| FeatherError::ModalityNotFound(modality.to_string()))?;
        let guard = handle.read();
        Ok(guard.store.dim())
    }

    /// Number of records (metadata entries).
    pub fn size(&self) -> usize {
        self.metadata.read().len()
    }

    /// Total number of edges in the context graph.
    pub fn edge_count(&self) -> usize {
        self.graph.read().edge_count()
    }

    /// All record IDs with a vector in a modality, in slot order.
    pub fn get_all_ids(&self, modality: &str) -> Vec<u64> {
        match self.modality_handle(modality) {
            Some(handle) => handle.read().store.ids().to_vec(),
            None => Vec::new(),
        }
    }

    /// Names of all modalities, sorted.
    pub fn modality_names(&self) -> Vec<String> {
        self.modalities.read().keys().cloned().collect()
    }

    /// Write a crash-safe snapshot: temp file plus atomic rename.
    pub fn save(&self) -> FeatherResult<()> {
        let modalities = self.modalities.read();
        let handles: Vec<(String, Arc<RwLock<Modality>>)> = modalities
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect();
        drop(modalities);

        // Snapshot order: modalities sorted by name, then metadata, then graph.
        let guards: Vec<(String, parking_lot::RwLockReadGuard<'_, Modality>)> = handles
            .iter()
            .map(|(name, handle)| (name.clone(), handle.read()))
            .collect();
        let metadata = self.metadata.read();
        let graph = self.graph.read();

        let sections: Vec<(&str, &VectorStore, &HnswIndex)> = guards
            .iter()
            .map(|(name, guard)| (name.as_str(), &guard.store, &guard.index))
            .collect();

        SnapshotWriter::write_to_file(&self.path, &sections, &metadata, &graph)
    }

    /// Flatten metadata and edges into the export payload, optionally
    /// restricted to a namespace and/or entity.
    pub fn export_graph(
        &self,
        namespace_filter: Option<&str>,
        entity_filter: Option<&str>,
    ) -> GraphExport {
        let metadata = self.metadata.read();
        let graph = self.graph.read();
        build_export(&metadata, &graph, namespace_filter, entity_filter)
    }

    /// `export_graph` serialized to a JSON string.
    pub fn export_graph_json(
        &self,
        namespace_filter: Option<&str>,
        entity_filter: Option<&str>,
    ) -> FeatherResult<String> {
        serde_json::to_string(&self.export_graph(namespace_filter, entity_filter))
            .map_err(|e| FeatherError::Io(e.into()))
    }
}
