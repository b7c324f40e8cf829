use std::path::PathBuf;

use clap::{Parser, Subcommand};
use concierge_embed::ProviderError;
use concierge_indexer::IndexerError;
use concierge_vector::VectorError;
use thiserror::Error;

pub mod app;
pub mod config;

pub use app::{build_repository, run};
pub use config::ConciergeConfig;

pub fn crate_name() -> &'static str {
    "concierge-cli"
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "concierge",
    version,
    about = "Notes vault concierge",
    long_about = "Index a markdown notes vault into a vector store and search it by meaning, tag, or metadata"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "CONCIERGE_CONFIG",
        help = "Path to a TOML config file (default: ./concierge.toml if present)"
    )]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Index every markdown note in the vault")]
    Index {
        #[arg(long, help = "Vault directory (overrides config)")]
        vault: Option<PathBuf>,
        #[arg(long, help = "Documents per backend write (overrides config)")]
        batch_size: Option<usize>,
    },
    #[command(about = "Reindex a single note")]
    Reindex {
        #[arg(help = "Note path, absolute or relative to the vault")]
        path: PathBuf,
    },
    #[command(about = "Remove a single note from the index")]
    Remove {
        #[arg(help = "Note path, absolute or relative to the vault")]
        path: PathBuf,
    },
    #[command(about = "Semantic search over indexed notes")]
    Search {
        #[arg(help = "Search query")]
        query: String,
        #[arg(long, default_value_t = 5, help = "Maximum number of results")]
        limit: usize,
        #[arg(long = "tag", help = "Only notes carrying this tag (repeatable, any-of)")]
        tags: Vec<String>,
        #[arg(long = "where", value_name = "KEY=VALUE", help = "Metadata equality filter (repeatable)")]
        filters: Vec<String>,
        #[arg(long, help = "Print results as JSON")]
        json: bool,
    },
    #[command(about = "Show a stored document")]
    Get {
        #[arg(help = "Document ID")]
        id: String,
    },
    #[command(about = "Find notes similar to a stored document")]
    Similar {
        #[arg(help = "Document ID")]
        id: String,
        #[arg(long, default_value_t = 5, help = "Maximum number of results")]
        limit: usize,
    },
    #[command(about = "Delete documents by ID")]
    Delete {
        #[arg(required = true, help = "Document IDs")]
        ids: Vec<String>,
    },
    #[command(about = "Count stored documents")]
    Count,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
    #[error("embedding provider error: {0}")]
    Embedding(#[from] ProviderError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error("json encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
