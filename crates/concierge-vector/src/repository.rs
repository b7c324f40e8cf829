//! Document repository
//!
//! The caller-facing surface over a [`VectorCollection`]. Metadata is encoded
//! on the way in and decoded on the way out, and caller filters are
//! rewritten into the backend dialect, so callers never see the storage
//! layout.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::codec::{decode_from_storage, encode_for_storage};
use crate::error::{VectorError, VectorResult};
use crate::filter::{MetadataFilter, Where, DEFAULT_MAX_TAG_POSITIONS};
use crate::store::{GetResponse, QueryResponse, RecordBatch, VectorCollection};
use crate::types::{Document, SearchHit};

/// Repository configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Tag positions probed when filtering by tag
    pub max_tag_positions: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_tag_positions: DEFAULT_MAX_TAG_POSITIONS,
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tag probe range (at least one position)
    pub fn with_max_tag_positions(mut self, positions: usize) -> Self {
        self.max_tag_positions = positions.max(1);
        self
    }
}

/// Document store over a scalar-metadata vector collection.
///
/// Holds no mutable state; share it behind an `Arc`.
pub struct DocumentRepository {
    collection: Arc<dyn VectorCollection>,
    config: RepositoryConfig,
}

impl DocumentRepository {
    pub fn new(collection: Arc<dyn VectorCollection>, config: RepositoryConfig) -> Self {
        Self { collection, config }
    }

    pub fn collection(&self) -> &Arc<dyn VectorCollection> {
        &self.collection
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Add documents in one backend call. Existing ids are overwritten.
    pub async fn add(&self, documents: &[Document]) -> VectorResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let ids = ids_of(documents);
        let batch = self
            .encode_batch(documents)
            .map_err(|e| e.during("add", ids.clone()))?;

        self.collection
            .add(batch)
            .await
            .map_err(|e| e.during("add", ids.clone()))?;

        debug!(collection = %self.collection.name(), count = ids.len(), "Documents added");
        Ok(())
    }

    /// Up to `limit` documents most similar to `text`, closest first.
    pub async fn query(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> VectorResult<Vec<Document>> {
        let hits = self.search(text, limit, filter).await?;
        Ok(hits.into_iter().map(|hit| hit.document).collect())
    }

    /// Like [`query`](Self::query), keeping the backend distance per hit.
    pub async fn search(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> VectorResult<Vec<SearchHit>> {
        let rewritten = filter.and_then(|f| f.to_where(self.config.max_tag_positions));
        self.raw_search("query", text, limit, rewritten.as_ref()).await
    }

    /// The document with `id`, if stored.
    pub async fn get(&self, id: &str) -> VectorResult<Option<Document>> {
        let ids = vec![id.to_string()];
        let response = self
            .collection
            .get(&ids)
            .await
            .map_err(|e| e.during("get", ids.clone()))?;

        Ok(documents_from_get(response).into_iter().next())
    }

    /// Replace a document wholesale; an unknown id is created.
    ///
    /// Metadata keys absent from `document` do not survive the update.
    pub async fn update(&self, document: &Document) -> VectorResult<()> {
        let ids = vec![document.id.clone()];
        let batch = self
            .encode_batch(std::slice::from_ref(document))
            .map_err(|e| e.during("update", ids.clone()))?;

        self.collection
            .upsert(batch)
            .await
            .map_err(|e| e.during("update", ids))?;

        debug!(collection = %self.collection.name(), id = %document.id, "Document updated");
        Ok(())
    }

    /// Delete documents by id. Unknown ids are ignored.
    pub async fn delete(&self, ids: &[String]) -> VectorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.collection
            .delete(ids)
            .await
            .map_err(|e| e.during("delete", ids.to_vec()))?;

        debug!(collection = %self.collection.name(), count = ids.len(), "Documents deleted");
        Ok(())
    }

    /// Documents similar to a stored one, excluding the source itself.
    pub async fn find_similar(&self, id: &str, limit: usize) -> VectorResult<Vec<SearchHit>> {
        let source = self
            .get(id)
            .await?
            .ok_or_else(|| VectorError::not_found(id).during("find_similar", vec![id.to_string()]))?;

        let mut hits = self
            .raw_search("find_similar", &source.content, limit.saturating_add(1), None)
            .await?;
        hits.retain(|hit| hit.document.id != source.id);
        hits.truncate(limit);
        Ok(hits)
    }

    /// Number of stored documents
    pub async fn count(&self) -> VectorResult<usize> {
        self.collection
            .count()
            .await
            .map_err(|e| e.during("count", Vec::new()))
    }

    async fn raw_search(
        &self,
        operation: &'static str,
        text: &str,
        limit: usize,
        filter: Option<&Where>,
    ) -> VectorResult<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let response = self
            .collection
            .query(text, limit, filter)
            .await
            .map_err(|e| e.during(operation, Vec::new()))?;

        debug!(
            collection = %self.collection.name(),
            operation,
            limit,
            filtered = filter.is_some(),
            results = response.ids.len(),
            "Search completed"
        );
        Ok(hits_from_query(response))
    }

    fn encode_batch(&self, documents: &[Document]) -> VectorResult<RecordBatch> {
        let mut batch = RecordBatch::with_capacity(documents.len());
        for document in documents {
            let tag_count = document.tags().len();
            if tag_count > self.config.max_tag_positions {
                warn!(
                    id = %document.id,
                    tags = tag_count,
                    max_tag_positions = self.config.max_tag_positions,
                    "Tags beyond the probe range will not match tag filters"
                );
            }
            let metadata = encode_for_storage(&document.metadata)?;
            batch.push(document.id.clone(), document.content.clone(), metadata);
        }
        Ok(batch)
    }
}

fn ids_of(documents: &[Document]) -> Vec<String> {
    documents.iter().map(|d| d.id.clone()).collect()
}

fn hits_from_query(response: QueryResponse) -> Vec<SearchHit> {
    let QueryResponse {
        ids,
        documents,
        metadatas,
        distances,
    } = response;
    let mut distances = distances.map(Vec::into_iter);

    ids.into_iter()
        .zip(documents)
        .zip(metadatas)
        .map(|((id, content), metadata)| {
            let distance = distances.as_mut().and_then(|d| d.next());
            let document = Document::new(id, content).with_metadata_map(decode_from_storage(&metadata));
            SearchHit::new(document, distance)
        })
        .collect()
}

fn documents_from_get(response: GetResponse) -> Vec<Document> {
    response
        .ids
        .into_iter()
        .zip(response.documents)
        .zip(response.metadatas)
        .map(|((id, content), metadata)| {
            Document::new(id, content).with_metadata_map(decode_from_storage(&metadata))
        })
        .collect()
}
