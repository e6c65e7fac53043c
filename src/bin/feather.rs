//! CLI entry point for the `feather` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use feather_db::cli::commands;
use feather_db::types::{ContextType, FeatherError};

#[derive(Parser)]
#[command(
    name = "feather",
    about = "Feather DB CLI — embedded vector + context-graph memory"
)]
struct Cli {
    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Default dimension used when creating a missing file
    #[arg(long, default_value = "768")]
    dimension: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty .feather file
    Create {
        /// Path to the .feather file to create
        file: PathBuf,
    },
    /// Display information about a .feather file
    Info {
        /// Path to the .feather file
        file: PathBuf,
    },
    /// Detailed statistics about records and edges
    Stats {
        /// Path to the .feather file
        file: PathBuf,
    },
    /// Add a record (vector + metadata)
    Add {
        /// Path to the .feather file
        file: PathBuf,
        /// Record ID
        id: u64,
        /// Comma-separated float vector
        vector: String,
        /// Record type: fact, preference, event, conversation
        #[arg(long = "type", default_value = "fact")]
        context_type: String,
        /// Content text
        #[arg(long, default_value = "")]
        content: String,
        /// Importance 0.0-1.0
        #[arg(long, default_value = "1.0")]
        importance: f32,
        /// Origin string
        #[arg(long)]
        source: Option<String>,
        /// Namespace partition key
        #[arg(long)]
        namespace: Option<String>,
        /// Entity subject key
        #[arg(long)]
        entity: Option<String>,
        /// Target modality
        #[arg(long, default_value = "text")]
        modality: String,
    },
    /// Add a typed edge between two records
    Link {
        /// Path to the .feather file
        file: PathBuf,
        /// Source record ID
        source_id: u64,
        /// Target record ID
        target_id: u64,
        /// Relation type (e.g. related_to, derived_from, supports)
        #[arg(default_value = "related_to")]
        rel_type: String,
        /// Edge weight 0.0-1.0
        #[arg(long, default_value = "1.0")]
        weight: f32,
    },
    /// k-nearest search
    Search {
        /// Path to the .feather file
        file: PathBuf,
        /// Comma-separated float query vector
        vector: String,
        /// Number of results
        #[arg(long, default_value = "5")]
        k: usize,
        /// Modality to search
        #[arg(long, default_value = "text")]
        modality: String,
        /// Restrict to one namespace
        #[arg(long)]
        namespace: Option<String>,
        /// Blend in time decay with this weight (0.0-1.0)
        #[arg(long)]
        time_weight: Option<f32>,
    },
    /// Export the context graph as JSON
    Export {
        /// Path to the .feather file
        file: PathBuf,
        /// Restrict to one namespace
        #[arg(long)]
        namespace: Option<String>,
        /// Restrict to one entity
        #[arg(long)]
        entity: Option<String>,
        /// Pretty-print JSON
        #[arg(long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let json = cli.format == "json";
    let dim = cli.dimension;

    let result = match cli.command {
        Commands::Create { file } => commands::cmd_create(&file, dim),
        Commands::Info { file } => commands::cmd_info(&file, dim, json),
        Commands::Stats { file } => commands::cmd_stats(&file, dim),
        Commands::Add {
            file,
            id,
            vector,
            context_type,
            content,
            importance,
            source,
            namespace,
            entity,
            modality,
        } => {
            let ct = match ContextType::from_name(&context_type) {
                Some(ct) => ct,
                None => {
                    eprintln!("Invalid record type: {context_type}");
                    process::exit(3);
                }
            };
            commands::cmd_add(
                &file,
                id,
                &vector,
                ct,
                &content,
                importance,
                source.as_deref(),
                namespace.as_deref(),
                entity.as_deref(),
                &modality,
            )
        }
        Commands::Link {
            file,
            source_id,
            target_id,
            rel_type,
            weight,
        } => commands::cmd_link(&file, dim, source_id, target_id, &rel_type, weight),
        Commands::Search {
            file,
            vector,
            k,
            modality,
            namespace,
            time_weight,
        } => commands::cmd_search(
            &file,
            &vector,
            k,
            &modality,
            namespace.as_deref(),
            time_weight,
            json,
        ),
        Commands::Export {
            file,
            namespace,
            entity,
            pretty,
        } => commands::cmd_export(&file, dim, namespace.as_deref(), entity.as_deref(), pretty),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let code = match &e {
            FeatherError::Io(_) => 1,
            FeatherError::InvalidMagic
            | FeatherError::UnsupportedVersion(_)
            | FeatherError::Truncated
            | FeatherError::Corrupt(_)
            | FeatherError::MissingSection(_) => 2,
            FeatherError::NotFound(_) | FeatherError::ModalityNotFound(_) => 4,
            _ => 5,
        };
        process::exit(code);
    }
}
