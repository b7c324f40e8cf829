//! Concierge Vector Storage - Document repository over scalar-metadata vector stores
//!
//! This crate provides:
//! - `DocumentRepository`, the add/query/get/update/delete surface callers use
//! - A metadata codec flattening list-valued `tags` into scalar flags
//! - Filter rewriting from caller metadata filters to the backend dialect
//! - `VectorCollection` trait with an in-process backend
//! - Chroma integration (optional, feature-gated)

pub mod codec;
pub mod error;
pub mod filter;
pub mod repository;
pub mod store;
pub mod types;

#[cfg(feature = "chroma")]
pub mod chroma;

pub use codec::{decode_from_storage, encode_for_storage};
pub use error::{VectorError, VectorResult};
pub use filter::{MetadataFilter, Where, DEFAULT_MAX_TAG_POSITIONS};
pub use repository::{DocumentRepository, RepositoryConfig};
pub use store::{GetResponse, LocalCollection, QueryResponse, RecordBatch, VectorCollection};
pub use types::{
    Document, Metadata, MetadataValue, ScalarValue, SearchHit, StorageMetadata, TAGS_KEY,
};

#[cfg(feature = "chroma")]
pub use chroma::{ChromaCollection, ChromaConfig};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{VectorError, VectorResult};
    pub use crate::filter::MetadataFilter;
    pub use crate::repository::{DocumentRepository, RepositoryConfig};
    pub use crate::store::VectorCollection;
    pub use crate::types::{Document, Metadata, MetadataValue, SearchHit};
}
