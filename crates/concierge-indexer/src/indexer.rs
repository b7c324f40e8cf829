//! Vault indexer

use concierge_vector::{Document, DocumentRepository, MetadataValue, TAGS_KEY};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{IndexerError, IndexerResult};
use crate::note::{document_id, extract_tags, file_metadata, is_markdown, probe_text_file};

/// Counters from one full indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Markdown notes found by the scan
    pub scanned: usize,
    /// Documents written to the repository
    pub indexed: usize,
    /// Notes skipped because they were empty
    pub skipped_empty: usize,
    /// Notes that could not be read
    pub failed: usize,
    /// Repository add calls made
    pub batches: usize,
}

/// Indexes markdown notes from a vault directory into a repository.
pub struct VaultIndexer {
    vault_path: PathBuf,
    repository: Arc<DocumentRepository>,
}

impl VaultIndexer {
    pub fn new(
        vault_path: impl Into<PathBuf>,
        repository: Arc<DocumentRepository>,
    ) -> IndexerResult<Self> {
        let vault_path = vault_path.into();
        if !vault_path.is_dir() {
            return Err(IndexerError::VaultNotFound(vault_path));
        }
        info!(vault = %vault_path.display(), "Vault indexer initialized");
        Ok(Self {
            vault_path,
            repository,
        })
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    /// All markdown notes in the vault, sorted by path.
    ///
    /// Hidden directories such as `.obsidian` and `.trash` are not entered.
    pub fn scan(&self) -> IndexerResult<Vec<PathBuf>> {
        let mut notes = Vec::new();
        let walker = WalkDir::new(&self.vault_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }
            match probe_text_file(entry.path()) {
                Ok(true) => notes.push(entry.into_path()),
                Ok(false) => debug!(path = %entry.path().display(), "Skipping non-text file"),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Unreadable file"),
            }
        }
        Ok(notes)
    }

    /// Builds the repository document for one note.
    ///
    /// Returns `None` for notes with no content.
    pub fn document_for(&self, path: &Path) -> IndexerResult<Option<Document>> {
        let relative = self.relative(path)?;
        let absolute = self.vault_path.join(&relative);

        let bytes = std::fs::read(&absolute).map_err(|e| IndexerError::io(&absolute, e))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        if content.trim().is_empty() {
            return Ok(None);
        }
        let stat = std::fs::metadata(&absolute).map_err(|e| IndexerError::io(&absolute, e))?;

        let mut metadata = file_metadata(&relative, &stat);
        let tags = extract_tags(&content);
        if !tags.is_empty() {
            metadata.insert(TAGS_KEY.to_string(), MetadataValue::StringList(tags));
        }

        Ok(Some(
            Document::new(document_id(&relative), content).with_metadata_map(metadata),
        ))
    }

    /// Indexes every note, writing `batch_size` documents per repository call.
    pub async fn index_vault(&self, batch_size: usize) -> IndexerResult<IndexReport> {
        let batch_size = batch_size.max(1);
        let mut report = IndexReport::default();
        let mut batch = Vec::with_capacity(batch_size);

        for path in self.scan()? {
            report.scanned += 1;
            match self.document_for(&path) {
                Ok(Some(document)) => batch.push(document),
                Ok(None) => report.skipped_empty += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read note");
                    report.failed += 1;
                }
            }

            if batch.len() >= batch_size {
                self.flush(&mut batch, &mut report).await?;
            }
        }
        self.flush(&mut batch, &mut report).await?;

        info!(
            vault = %self.vault_path.display(),
            scanned = report.scanned,
            indexed = report.indexed,
            skipped_empty = report.skipped_empty,
            failed = report.failed,
            "Vault indexed"
        );
        Ok(report)
    }

    /// Replaces the stored document for one note.
    ///
    /// Returns `false` when the path is missing, not markdown, or empty.
    pub async fn reindex_file(&self, path: &Path) -> IndexerResult<bool> {
        let absolute = self.vault_path.join(self.relative(path)?);
        if !absolute.is_file() || !is_markdown(&absolute) {
            return Ok(false);
        }
        let Some(document) = self.document_for(&absolute)? else {
            return Ok(false);
        };

        self.repository.update(&document).await?;
        info!(path = %path.display(), id = %document.id, "Reindexed note");
        Ok(true)
    }

    /// Removes a note's document; the file itself need not exist anymore.
    pub async fn remove_file(&self, path: &Path) -> IndexerResult<()> {
        let id = document_id(&self.relative(path)?);
        self.repository.delete(&[id.clone()]).await?;
        info!(path = %path.display(), id = %id, "Removed note from index");
        Ok(())
    }

    async fn flush(&self, batch: &mut Vec<Document>, report: &mut IndexReport) -> IndexerResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let documents = std::mem::take(batch);
        self.repository.add(&documents).await?;
        report.indexed += documents.len();
        report.batches += 1;
        debug!(count = documents.len(), total = report.indexed, "Batch indexed");
        Ok(())
    }

    /// Vault-relative form of `path`, which may be absolute or relative to
    /// the vault root.
    fn relative(&self, path: &Path) -> IndexerResult<PathBuf> {
        match path.strip_prefix(&self.vault_path) {
            Ok(inside) => Ok(inside.to_path_buf()),
            Err(_) if path.is_relative() => Ok(path.to_path_buf()),
            Err(_) => Err(IndexerError::OutsideVault(path.to_path_buf())),
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
