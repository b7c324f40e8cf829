//! Error types for the document repository and its backends

use concierge_embed::ProviderError;
use thiserror::Error;

/// Vector storage error type
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Metadata field '{key}' holds a list; only 'tags' may be list-valued")]
    InvalidMetadata { key: String },

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] ProviderError),

    #[error("{backend} error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} failed for [{}]: {source}", .ids.join(", "))]
    Operation {
        operation: &'static str,
        ids: Vec<String>,
        #[source]
        source: Box<VectorError>,
    },
}

impl VectorError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch(message.into())
    }

    /// Tags a failure with the repository operation and the ids it touched.
    pub fn during(self, operation: &'static str, ids: Vec<String>) -> Self {
        Self::Operation {
            operation,
            ids,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through operation context.
    pub fn root(&self) -> &VectorError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for vector operations
pub type VectorResult<T> = Result<T, VectorError>;
