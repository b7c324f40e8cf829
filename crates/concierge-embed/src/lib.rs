//! Concierge embedding providers
//!
//! A vector collection is configured with one [`EmbeddingProvider`] at
//! creation time and calls it implicitly on every add and query. This crate
//! provides:
//! - [`LocalEmbedding`], an offline hashed bag-of-words embedder (the default)
//! - [`OllamaEmbeddingProvider`], a local sentence-embedding model served by Ollama

use async_trait::async_trait;
use thiserror::Error;

pub mod local;
pub mod ollama;

pub use local::{LocalEmbedding, DEFAULT_LOCAL_DIMENSION};
pub use ollama::{known_dimension, OllamaEmbeddingProvider};

/// Errors raised while computing embeddings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embeds several texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}
