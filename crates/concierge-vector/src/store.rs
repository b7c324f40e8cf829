//! Vector-store backend trait and the in-process implementation

use async_trait::async_trait;
use concierge_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{VectorError, VectorResult};
use crate::filter::Where;
use crate::types::{ScalarValue, StorageMetadata};

/// Parallel arrays of records handed to a backend in one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<StorageMetadata>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            documents: Vec::with_capacity(capacity),
            metadatas: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, id: String, document: String, metadata: StorageMetadata) {
        self.ids.push(id);
        self.documents.push(document);
        self.metadatas.push(metadata);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rejects mismatched array lengths, ids repeated within the batch and
    /// non-finite floats, which cannot be persisted.
    pub fn validate(&self) -> VectorResult<()> {
        if self.documents.len() != self.ids.len() || self.metadatas.len() != self.ids.len() {
            return Err(VectorError::invalid_batch(format!(
                "array lengths differ: {} ids, {} documents, {} metadatas",
                self.ids.len(),
                self.documents.len(),
                self.metadatas.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.ids.len());
        for id in &self.ids {
            if !seen.insert(id.as_str()) {
                return Err(VectorError::invalid_batch(format!("duplicate id in batch: {id}")));
            }
        }

        for metadata in &self.metadatas {
            let bad = metadata
                .iter()
                .find(|(_, v)| matches!(v, ScalarValue::Float(f) if !f.is_finite()));
            if let Some((key, _)) = bad {
                return Err(VectorError::InvalidMetadata { key: key.clone() });
            }
        }
        Ok(())
    }
}

/// Similarity query results, most similar first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<StorageMetadata>,
    /// Present when the backend reports distances
    pub distances: Option<Vec<f32>>,
}

/// Point lookup results; unknown ids are omitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetResponse {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<StorageMetadata>,
}

/// A named collection in a vector-store backend.
///
/// Metadata is scalar-only. The collection owns its embedding function and
/// embeds document and query text itself. Implementations must be safe to
/// share across concurrent callers.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// Short backend identifier used in errors and logs
    fn backend_name(&self) -> &'static str;

    /// Insert records; an existing id is overwritten
    async fn add(&self, batch: RecordBatch) -> VectorResult<()>;

    /// Replace records wholesale, creating ids that do not exist
    async fn upsert(&self, batch: RecordBatch) -> VectorResult<()>;

    /// Up to `n_results` records closest to `query_text` that pass `filter`
    async fn query(
        &self,
        query_text: &str,
        n_results: usize,
        filter: Option<&Where>,
    ) -> VectorResult<QueryResponse>;

    /// Records for the given ids
    async fn get(&self, ids: &[String]) -> VectorResult<GetResponse>;

    /// Remove records; unknown ids are ignored
    async fn delete(&self, ids: &[String]) -> VectorResult<()>;

    /// Number of stored records
    async fn count(&self) -> VectorResult<usize>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: String,
    document: String,
    metadata: StorageMetadata,
    embedding: Vec<f32>,
}

/// In-process collection with brute-force cosine search.
///
/// Optionally persisted as a JSON-lines file, loaded on open and rewritten
/// after every mutation.
pub struct LocalCollection {
    name: String,
    records: RwLock<HashMap<String, Record>>,
    embedder: Arc<dyn EmbeddingProvider>,
    persist_path: Option<PathBuf>,
}

impl LocalCollection {
    /// Create an empty, memory-only collection
    pub fn new(name: impl Into<String>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(HashMap::new()),
            embedder,
            persist_path: None,
        }
    }

    /// Open (or create) a collection persisted at `<dir>/<name>.jsonl`
    pub async fn persistent(
        dir: impl AsRef<Path>,
        name: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> VectorResult<Self> {
        let name = name.into();
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{name}.jsonl"));

        let mut records = HashMap::new();
        if tokio::fs::try_exists(&path).await? {
            let data = tokio::fs::read_to_string(&path).await?;
            for line in data.lines().filter(|l| !l.trim().is_empty()) {
                let record: Record = serde_json::from_str(line)?;
                records.insert(record.id.clone(), record);
            }
        }

        info!(
            collection = %name,
            path = %path.display(),
            records = records.len(),
            "Local collection opened"
        );

        Ok(Self {
            name,
            records: RwLock::new(records),
            embedder,
            persist_path: Some(path),
        })
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    async fn write(&self, batch: RecordBatch) -> VectorResult<()> {
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed_batch(&batch.documents).await?;
        if embeddings.len() != batch.len() {
            return Err(VectorError::Storage(format!(
                "embedder returned {} vectors for {} documents",
                embeddings.len(),
                batch.len()
            )));
        }

        let count = batch.len();
        let mut records = self.records.write().await;
        let mut staged = records.clone();
        let rows = batch
            .ids
            .into_iter()
            .zip(batch.documents)
            .zip(batch.metadatas)
            .zip(embeddings);
        for (((id, document), metadata), embedding) in rows {
            staged.insert(
                id.clone(),
                Record {
                    id,
                    document,
                    metadata,
                    embedding,
                },
            );
        }
        self.persist(&staged).await?;
        *records = staged;

        debug!(collection = %self.name, count, "Records written");
        Ok(())
    }

    /// Writes `records` to disk. Callers swap the new map into memory only
    /// after this succeeds.
    async fn persist(&self, records: &HashMap<String, Record>) -> VectorResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let mut ordered: Vec<&Record> = records.values().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut data = String::new();
        for record in ordered {
            data.push_str(&serde_json::to_string(record)?);
            data.push('\n');
        }

        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorCollection for LocalCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn add(&self, batch: RecordBatch) -> VectorResult<()> {
        self.write(batch).await
    }

    async fn upsert(&self, batch: RecordBatch) -> VectorResult<()> {
        self.write(batch).await
    }

    async fn query(
        &self,
        query_text: &str,
        n_results: usize,
        filter: Option<&Where>,
    ) -> VectorResult<QueryResponse> {
        let query_embedding = self.embedder.embed(query_text).await?;
        let records = self.records.read().await;

        let mut scored: Vec<(f32, &Record)> = records
            .values()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.metadata)))
            .map(|r| (1.0 - cosine_similarity(&query_embedding, &r.embedding), r))
            .collect();

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.truncate(n_results);

        let mut response = QueryResponse {
            distances: Some(Vec::with_capacity(scored.len())),
            ..Default::default()
        };
        for (distance, record) in scored {
            response.ids.push(record.id.clone());
            response.documents.push(record.document.clone());
            response.metadatas.push(record.metadata.clone());
            if let Some(distances) = response.distances.as_mut() {
                distances.push(distance);
            }
        }
        Ok(response)
    }

    async fn get(&self, ids: &[String]) -> VectorResult<GetResponse> {
        let records = self.records.read().await;
        let mut response = GetResponse::default();
        for record in ids.iter().filter_map(|id| records.get(id)) {
            response.ids.push(record.id.clone());
            response.documents.push(record.document.clone());
            response.metadatas.push(record.metadata.clone());
        }
        Ok(response)
    }

    async fn delete(&self, ids: &[String]) -> VectorResult<()> {
        let mut records = self.records.write().await;
        if !ids.iter().any(|id| records.contains_key(id)) {
            return Ok(());
        }

        let mut staged = records.clone();
        for id in ids {
            staged.remove(id);
        }
        self.persist(&staged).await?;
        let removed = records.len() - staged.len();
        *records = staged;
        debug!(collection = %self.name, removed, "Records deleted");
        Ok(())
    }

    async fn count(&self) -> VectorResult<usize> {
        Ok(self.records.read().await.len())
    }
}

/// Cosine similarity; 0.0 for mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
