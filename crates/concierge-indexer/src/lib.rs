//! Concierge Indexer - Turns a markdown vault into repository documents
//!
//! This crate provides:
//! - Vault scanning for markdown notes, skipping hidden directories
//! - Note-to-document conversion (stable ids, file metadata, inline tags)
//! - Batched indexing and single-file reindex/removal through a `DocumentRepository`

pub mod error;
pub mod indexer;
pub mod note;

pub use error::{IndexerError, IndexerResult};
pub use indexer::{IndexReport, VaultIndexer};
pub use note::{document_id, extract_tags, looks_like_text, probe_text_file};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{IndexerError, IndexerResult};
    pub use crate::indexer::{IndexReport, VaultIndexer};
}
