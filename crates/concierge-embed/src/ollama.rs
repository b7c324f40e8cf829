//! Ollama embedding provider
//!
//! Calls a local Ollama server's `/api/embed` endpoint, which serves
//! sentence-embedding models such as `nomic-embed-text`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{EmbeddingProvider, ProviderError};

const OLLAMA_API_BASE: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSION: usize = 768;

#[derive(Debug)]
pub struct OllamaEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl OllamaEmbeddingProvider {
    /// Reads `OLLAMA_HOST` and `OLLAMA_EMBEDDING_MODEL`, falling back to the
    /// local default server and `nomic-embed-text`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let base_url = env::var("OLLAMA_HOST").unwrap_or_else(|_| OLLAMA_API_BASE.to_string());
        let model =
            env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let dimension = known_dimension(&model);
        Self::new(base_url, model, dimension)
    }

    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            dimension,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
        })
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = retry_base_delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn request_with_retry(&self, body: &EmbedRequestBody) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.try_embed(body).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(err) => {
                    let retriable = is_retriable(&err);
                    last_error = Some(err.to_string());
                    if retriable && attempt < self.max_retries {
                        warn!(attempt, error = %err, "Ollama embedding request failed, retrying");
                        tokio::time::sleep(backoff(self.retry_base_delay, attempt)).await;
                        continue;
                    }
                    if retriable {
                        return Err(ProviderError::RetryExhausted {
                            attempts: attempt + 1,
                            last_error: last_error.unwrap_or_else(|| "unknown retry error".to_string()),
                        });
                    }
                    return Err(err);
                }
            }
        }

        Err(ProviderError::RetryExhausted {
            attempts: self.max_retries + 1,
            last_error: last_error.unwrap_or_else(|| "unknown retry error".to_string()),
        })
    }

    async fn try_embed(&self, body: &EmbedRequestBody) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = self
            .client
            .post(self.endpoint("/api/embed"))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let resp: EmbedResponseBody = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        debug!(model = %resp.model, count = resp.embeddings.len(), "Ollama embeddings received");
        Ok(resp.embeddings)
    }
}

/// Output dimension of well-known Ollama embedding models, ignoring any
/// `:tag` suffix. Unknown models are assumed to produce 768 dimensions.
pub fn known_dimension(model: &str) -> usize {
    match model.split(':').next().unwrap_or(model) {
        "nomic-embed-text" => 768,
        "mxbai-embed-large" => 1024,
        "all-minilm" => 384,
        _ => DEFAULT_DIMENSION,
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequestBody {
    model: String,
    input: EmbedInput,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbedInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct EmbedResponseBody {
    model: String,
    embeddings: Vec<Vec<f32>>,
}

fn is_retriable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Transport(_) => true,
        ProviderError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1_u32 << attempt)
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &'static str {
        "ollama-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = EmbedRequestBody {
            model: self.model.clone(),
            input: EmbedInput::Single(text.to_string()),
        };

        self.request_with_retry(&body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("no embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbedRequestBody {
            model: self.model.clone(),
            input: EmbedInput::Batch(texts.to_vec()),
        };

        let embeddings = self.request_with_retry(&body).await?;
        if embeddings.len() != texts.len() {
            return Err(ProviderError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}
