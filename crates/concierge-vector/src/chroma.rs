//! Chroma vector store implementation
//!
//! Talks to a Chroma server over its v2 REST API. Embeddings are computed
//! client-side by the injected provider so the server never needs an
//! embedding function of its own.

use async_trait::async_trait;
use concierge_embed::EmbeddingProvider;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{VectorError, VectorResult};
use crate::filter::Where;
use crate::store::{GetResponse, QueryResponse, RecordBatch, VectorCollection};
use crate::types::StorageMetadata;

const BACKEND: &str = "chroma";

/// Configuration for a Chroma connection
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    /// Chroma server URL
    pub url: String,
    /// Tenant owning the database
    pub tenant: String,
    /// Database holding the collection
    pub database: String,
    /// Collection name
    pub collection_name: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            collection_name: "obsidian_notes".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ChromaConfig {
    /// Create a new configuration
    pub fn new(url: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection_name: collection_name.into(),
            ..Default::default()
        }
    }

    /// Set tenant and database
    pub fn with_database(mut self, tenant: impl Into<String>, database: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self.database = database.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.url.trim_end_matches('/'),
            self.tenant,
            self.database
        )
    }
}

/// Chroma collection handle
pub struct ChromaCollection {
    client: Client,
    config: ChromaConfig,
    collection_id: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ChromaCollection {
    /// Connect, creating the collection if it does not exist yet
    pub async fn connect(
        config: ChromaConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> VectorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

        let body = CreateCollectionBody {
            name: &config.collection_name,
            get_or_create: true,
            metadata: serde_json::json!({ "hnsw:space": "cosine" }),
        };
        let collection: CollectionInfo =
            send(&client, Method::POST, &config.collections_url(), Some(&body)).await?;

        info!(
            collection = %config.collection_name,
            id = %collection.id,
            url = %config.url,
            "Chroma collection ready"
        );

        Ok(Self {
            client,
            config,
            collection_id: collection.id,
            embedder,
        })
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    fn url(&self, action: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.collections_url(),
            self.collection_id,
            action
        )
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        action: &str,
        body: &B,
    ) -> VectorResult<T> {
        send(&self.client, Method::POST, &self.url(action), Some(body)).await
    }

    async fn write(&self, batch: RecordBatch) -> VectorResult<()> {
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }
        let embeddings = self.embedder.embed_batch(&batch.documents).await?;
        let count = batch.len();

        let body = RecordsBody {
            ids: &batch.ids,
            embeddings: &embeddings,
            documents: &batch.documents,
            metadatas: batch.metadatas.iter().map(non_empty).collect(),
        };
        let _: Value = self.post("add", &body).await?;

        debug!(collection = %self.config.collection_name, count, "Records written");
        Ok(())
    }
}

#[async_trait]
impl VectorCollection for ChromaCollection {
    fn name(&self) -> &str {
        &self.config.collection_name
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    // Chroma's add keeps the stored record when the id already exists.
    async fn add(&self, batch: RecordBatch) -> VectorResult<()> {
        self.upsert(batch).await
    }

    // Chroma's upsert merges metadata, which would leave stale tag flags
    // behind, so replace by deleting first.
    async fn upsert(&self, batch: RecordBatch) -> VectorResult<()> {
        batch.validate()?;
        self.delete(&batch.ids).await?;
        self.write(batch).await
    }

    async fn query(
        &self,
        query_text: &str,
        n_results: usize,
        filter: Option<&Where>,
    ) -> VectorResult<QueryResponse> {
        let embedding = self.embedder.embed(query_text).await?;
        let body = QueryBody {
            query_embeddings: vec![embedding],
            n_results,
            r#where: filter.map(Where::to_json),
            include: &["documents", "metadatas", "distances"],
        };
        let raw: RawQueryResult = self.post("query", &body).await?;

        // One query embedding, so only the first result row matters.
        let ids = raw.ids.into_iter().next().unwrap_or_default();
        let documents = first_row(raw.documents);
        let metadatas = first_row(raw.metadatas);
        let distances = raw.distances.and_then(|rows| rows.into_iter().next());

        Ok(QueryResponse {
            documents: fill(documents, ids.len()),
            metadatas: fill(metadatas, ids.len()),
            distances: distances.map(|d| d.into_iter().map(Option::unwrap_or_default).collect()),
            ids,
        })
    }

    async fn get(&self, ids: &[String]) -> VectorResult<GetResponse> {
        if ids.is_empty() {
            return Ok(GetResponse::default());
        }
        let body = GetBody {
            ids,
            include: &["documents", "metadatas"],
        };
        let raw: RawGetResult = self.post("get", &body).await?;
        let count = raw.ids.len();

        Ok(GetResponse {
            documents: fill(raw.documents.unwrap_or_default(), count),
            metadatas: fill(raw.metadatas.unwrap_or_default(), count),
            ids: raw.ids,
        })
    }

    async fn delete(&self, ids: &[String]) -> VectorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let _: Value = self.post("delete", &DeleteBody { ids }).await?;
        debug!(collection = %self.config.collection_name, count = ids.len(), "Records deleted");
        Ok(())
    }

    async fn count(&self) -> VectorResult<usize> {
        send::<(), usize>(&self.client, Method::GET, &self.url("count"), None).await
    }
}

async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&B>,
) -> VectorResult<T> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read body>".to_string());
        return Err(VectorError::backend(
            BACKEND,
            format!("HTTP {}: {}", status.as_u16(), text),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| VectorError::backend(BACKEND, format!("invalid response: {e}")))
}

/// Chroma rejects empty metadata objects; send `null` instead.
fn non_empty(metadata: &StorageMetadata) -> Option<&StorageMetadata> {
    (!metadata.is_empty()).then_some(metadata)
}

fn first_row<T>(rows: Option<Vec<Vec<Option<T>>>>) -> Vec<Option<T>> {
    rows.and_then(|r| r.into_iter().next()).unwrap_or_default()
}

/// Replaces missing entries with defaults and pads to `len`.
fn fill<T: Default>(values: Vec<Option<T>>, len: usize) -> Vec<T> {
    let mut out: Vec<T> = values.into_iter().map(Option::unwrap_or_default).collect();
    out.resize_with(len, T::default);
    out
}

#[derive(Serialize)]
struct CreateCollectionBody<'a> {
    name: &'a str,
    get_or_create: bool,
    metadata: Value,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct RecordsBody<'a> {
    ids: &'a [String],
    embeddings: &'a [Vec<f32>],
    documents: &'a [String],
    metadatas: Vec<Option<&'a StorageMetadata>>,
}

#[derive(Serialize)]
struct QueryBody {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#where: Option<Value>,
    include: &'static [&'static str],
}

#[derive(Serialize)]
struct GetBody<'a> {
    ids: &'a [String],
    include: &'static [&'static str],
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    ids: &'a [String],
}

#[derive(Deserialize)]
struct RawQueryResult {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<StorageMetadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

#[derive(Deserialize)]
struct RawGetResult {
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<StorageMetadata>>>,
}
