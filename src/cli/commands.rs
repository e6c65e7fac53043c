//! Implementations behind the `feather` subcommands.

use std::path::Path;

use crate::db::Feather;
use crate::types::{
    ContextType, FeatherError, FeatherResult, FilterBuilder, MetadataBuilder, RelType,
    ScoringConfig,
};

/// Parse a comma-separated float list into a vector.
fn parse_vector(spec: &str) -> FeatherResult<Vec<f32>> {
    spec.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| FeatherError::InvalidArgument(format!("bad float: {part:?}")))
        })
        .collect()
}

/// Create a new empty .feather file.
pub fn cmd_create(path: &Path, dimension: usize) -> FeatherResult<()> {
    if path.exists() {
        return Err(FeatherError::InvalidArgument(format!(
            "{} already exists",
            path.display()
        )));
    }
    let db = Feather::open(path, dimension)?;
    db.save()?;
    println!("Created {} (text dim {})", path.display(), dimension);
    Ok(())
}

/// Display summary information about a .feather file.
pub fn cmd_info(path: &Path, dimension: usize, json: bool) -> FeatherResult<()> {
    let db = Feather::open(path, dimension)?;
    if json {
        let modalities: Vec<serde_json::Value> = db
            .modality_names()
            .iter()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "dim": db.dim(name).unwrap_or(0),
                    "vectors": db.get_all_ids(name).len(),
                })
            })
            .collect();
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "records": db.size(),
            "edges": db.edge_count(),
            "modalities": modalities,
        });
        println!("{}", serde_json::to_string_pretty(&value).map_err(io_err)?);
    } else {
        println!("File:     {}", path.display());
        println!("Records:  {}", db.size());
        println!("Edges:    {}", db.edge_count());
        println!("Modalities:");
        for name in db.modality_names() {
            println!(
                "  {:<16} dim {:<6} vectors {}",
                name,
                db.dim(&name).unwrap_or(0),
                db.get_all_ids(&name).len()
            );
        }
    }
    Ok(())
}

/// Detailed statistics: record-type distribution and most-recalled records.
pub fn cmd_stats(path: &Path, dimension: usize) -> FeatherResult<()> {
    let db = Feather::open(path, dimension)?;
    let export = db.export_graph(None, None);

    let mut by_type = [0usize; 4];
    for node in &export.nodes {
        if let Some(slot) = by_type.get_mut(node.context_type as usize) {
            *slot += 1;
        }
    }

    println!("Records: {}   Edges: {}", export.nodes.len(), export.edges.len());
    for (value, count) in by_type.iter().enumerate() {
        if let Some(ct) = ContextType::from_u8(value as u8) {
            println!("  {:<14} {}", ct.name(), count);
        }
    }

    let mut top = export.nodes.clone();
    top.sort_by(|a, b| b.recall_count.cmp(&a.recall_count));
    println!("Most recalled:");
    for node in top.iter().take(5) {
        println!(
            "  #{:<8} recalls {:<5} importance {:.2}  {}",
            node.id, node.recall_count, node.importance, node.label
        );
    }
    Ok(())
}

/// Add a record: vector plus metadata.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    path: &Path,
    id: u64,
    vector: &str,
    context_type: ContextType,
    content: &str,
    importance: f32,
    source: Option<&str>,
    namespace: Option<&str>,
    entity: Option<&str>,
    modality: &str,
) -> FeatherResult<()> {
    let vec = parse_vector(vector)?;
    let db = Feather::open(path, vec.len())?;

    let mut builder = MetadataBuilder::new(context_type, content).importance(importance);
    if let Some(source) = source {
        builder = builder.source(source);
    }
    if let Some(ns) = namespace {
        builder = builder.namespace(ns);
    }
    if let Some(entity) = entity {
        builder = builder.entity(entity);
    }

    db.add(id, &vec, Some(builder.build()), modality)?;
    db.save()?;
    println!("Added record {} to {:?} ({} dims)", id, modality, vec.len());
    Ok(())
}

/// Create a typed edge between two records.
pub fn cmd_link(
    path: &Path,
    dimension: usize,
    source_id: u64,
    target_id: u64,
    rel_type: &str,
    weight: f32,
) -> FeatherResult<()> {
    let db = Feather::open(path, dimension)?;
    db.link(source_id, target_id, RelType::parse(rel_type), weight)?;
    db.save()?;
    println!("Linked {source_id} -[{rel_type}]-> {target_id} (weight {weight})");
    Ok(())
}

/// Vector search with optional namespace filter and time weighting.
#[allow(clippy::too_many_arguments)]
pub fn cmd_search(
    path: &Path,
    vector: &str,
    k: usize,
    modality: &str,
    namespace: Option<&str>,
    time_weight: Option<f32>,
    json: bool,
) -> FeatherResult<()> {
    let vec = parse_vector(vector)?;
    let db = Feather::open(path, vec.len())?;

    let filter = namespace.map(|ns| FilterBuilder::new().namespace(ns).build());
    let scoring = time_weight.map(ScoringConfig::with_time_weight);

    let hits = db.search(&vec, k, modality, filter.as_ref(), scoring.as_ref())?;
    if json {
        let value: Vec<serde_json::Value> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "id": hit.id,
                    "score": hit.score,
                    "content": hit.metadata.content,
                    "namespace_id": hit.metadata.namespace_id,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value).map_err(io_err)?);
    } else {
        for hit in &hits {
            println!("{:>8}  {:.4}  {}", hit.id, hit.score, hit.metadata.content);
        }
        if hits.is_empty() {
            println!("(no results)");
        }
    }
    db.save()?;
    Ok(())
}

/// Export the context graph as JSON.
pub fn cmd_export(
    path: &Path,
    dimension: usize,
    namespace: Option<&str>,
    entity: Option<&str>,
    pretty: bool,
) -> FeatherResult<()> {
    let db = Feather::open(path, dimension)?;
    let export = db.export_graph(namespace, entity);
    let out = if pretty {
        serde_json::to_string_pretty(&export).map_err(io_err)?
    } else {
        serde_json::to_string(&export).map_err(io_err)?
    };
    println!("{out}");
    Ok(())
}

fn io_err(e: serde_json::Error) -> FeatherError {
    FeatherError::Io(e.into())
}
