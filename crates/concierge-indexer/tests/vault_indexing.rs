use concierge_embed::LocalEmbedding;
use concierge_indexer::{document_id, VaultIndexer};
use concierge_vector::prelude::*;
use concierge_vector::LocalCollection;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn repository() -> Arc<DocumentRepository> {
    let collection = LocalCollection::new("vault", Arc::new(LocalEmbedding::new(64)));
    Arc::new(DocumentRepository::new(
        Arc::new(collection),
        RepositoryConfig::default(),
    ))
}

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn sample_vault() -> TempDir {
    let vault = TempDir::new().unwrap();
    let root = vault.path();
    write(root, "test1.md", b"# Test 1\nThis is test file 1 about #python");
    write(root, "test2.md", b"# Test 2\nThis is test file 2 about #rust and #python");
    write(root, "subfolder/test3.md", b"# Test 3\nThis is test file 3");
    write(root, "notes/UPPER.MD", b"Shouting note");
    write(root, "not_markdown.txt", b"plain text");
    write(root, "binary.md", b"\x00\x01\x02binary");
    write(root, ".obsidian/workspace.md", b"editor state");
    vault
}

#[test]
fn scan_finds_markdown_text_notes_only() {
    let vault = sample_vault();
    let indexer = VaultIndexer::new(vault.path(), repository()).unwrap();

    let found: Vec<String> = indexer
        .scan()
        .unwrap()
        .iter()
        .map(|p| {
            p.strip_prefix(vault.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();

    assert_eq!(
        found,
        vec!["notes/UPPER.MD", "subfolder/test3.md", "test1.md", "test2.md"]
    );
}

#[test]
fn documents_carry_file_metadata_and_tags() {
    let vault = sample_vault();
    let indexer = VaultIndexer::new(vault.path(), repository()).unwrap();

    let doc = indexer
        .document_for(&vault.path().join("test2.md"))
        .unwrap()
        .unwrap();

    assert_eq!(doc.id, document_id(Path::new("test2.md")));
    assert!(doc.content.starts_with("# Test 2"));
    assert_eq!(doc.metadata.get("path"), Some(&MetadataValue::from("test2.md")));
    assert_eq!(doc.metadata.get("filename"), Some(&MetadataValue::from("test2.md")));
    assert_eq!(doc.metadata.get("extension"), Some(&MetadataValue::from(".md")));
    assert!(matches!(doc.metadata.get("size_bytes"), Some(MetadataValue::Int(n)) if *n > 0));
    assert!(doc.metadata.contains_key("created_at"));
    assert!(doc.metadata.contains_key("modified_at"));
    assert_eq!(doc.tags().to_vec(), vec!["rust".to_string(), "python".to_string()]);

    let untagged = indexer
        .document_for(&vault.path().join("subfolder/test3.md"))
        .unwrap()
        .unwrap();
    assert!(!untagged.metadata.contains_key("tags"));
    assert_eq!(
        untagged.metadata.get("path"),
        Some(&MetadataValue::from("subfolder/test3.md"))
    );

    let upper = indexer
        .document_for(Path::new("notes/UPPER.MD"))
        .unwrap()
        .unwrap();
    assert_eq!(upper.metadata.get("extension"), Some(&MetadataValue::from(".md")));
}

#[tokio::test]
async fn index_vault_flushes_in_batches() {
    let vault = sample_vault();
    let repo = repository();
    let indexer = VaultIndexer::new(vault.path(), repo.clone()).unwrap();

    let report = indexer.index_vault(3).await.unwrap();

    assert_eq!(report.scanned, 4);
    assert_eq!(report.indexed, 4);
    assert_eq!(report.batches, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(repo.count().await.unwrap(), 4);

    let python = MetadataFilter::new().with_tag("python");
    let hits = repo.query("test file", 10, Some(&python)).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn reindexing_is_idempotent_by_path() {
    let vault = sample_vault();
    let repo = repository();
    let indexer = VaultIndexer::new(vault.path(), repo.clone()).unwrap();
    indexer.index_vault(100).await.unwrap();
    indexer.index_vault(100).await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 4);
}

#[tokio::test]
async fn reindex_file_replaces_content_and_tags() {
    let vault = sample_vault();
    let repo = repository();
    let indexer = VaultIndexer::new(vault.path(), repo.clone()).unwrap();
    indexer.index_vault(100).await.unwrap();

    write(vault.path(), "test1.md", b"# Test 1\nRewritten about #cooking");
    assert!(indexer.reindex_file(&vault.path().join("test1.md")).await.unwrap());

    let id = document_id(Path::new("test1.md"));
    let doc = repo.get(&id).await.unwrap().unwrap();
    assert!(doc.content.contains("Rewritten"));
    assert_eq!(doc.tags().to_vec(), vec!["cooking".to_string()]);

    assert!(!indexer.reindex_file(Path::new("missing.md")).await.unwrap());
    assert!(!indexer.reindex_file(Path::new("not_markdown.txt")).await.unwrap());
}

#[tokio::test]
async fn remove_file_deletes_by_path_id() {
    let vault = sample_vault();
    let repo = repository();
    let indexer = VaultIndexer::new(vault.path(), repo.clone()).unwrap();
    indexer.index_vault(100).await.unwrap();

    let path = vault.path().join("test1.md");
    fs::remove_file(&path).unwrap();
    indexer.remove_file(&path).await.unwrap();
    indexer.remove_file(&path).await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 3);
    assert!(repo
        .get(&document_id(Path::new("test1.md")))
        .await
        .unwrap()
        .is_none());
}
