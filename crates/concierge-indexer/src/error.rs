//! Error types for vault indexing

use concierge_vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Indexer error type
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Vault path does not exist: {0}")]
    VaultNotFound(PathBuf),

    #[error("Path is outside the vault: {0}")]
    OutsideVault(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] VectorError),
}

impl IndexerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;
