//! Composition root: builds the embedder, backend and repository from
//! configuration and executes commands against them.

use std::fmt::Write as _;
use std::sync::Arc;

use concierge_embed::{
    known_dimension, EmbeddingProvider, LocalEmbedding, OllamaEmbeddingProvider,
    DEFAULT_LOCAL_DIMENSION,
};
use concierge_indexer::VaultIndexer;
use concierge_vector::{
    Document, DocumentRepository, LocalCollection, MetadataFilter, MetadataValue,
    RepositoryConfig, SearchHit, VectorCollection,
};
use tracing::info;

use crate::config::{BackendKind, ConciergeConfig, EmbeddingKind};
use crate::{Cli, CliError, Commands};

const PREVIEW_CHARS: usize = 100;

pub fn build_embedder(config: &ConciergeConfig) -> Result<Arc<dyn EmbeddingProvider>, CliError> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.embedding {
        EmbeddingKind::Local => Arc::new(LocalEmbedding::new(
            config.embedding_dimension.unwrap_or(DEFAULT_LOCAL_DIMENSION),
        )),
        EmbeddingKind::Ollama => {
            let dimension = config
                .embedding_dimension
                .unwrap_or_else(|| known_dimension(&config.embedding_model));
            Arc::new(OllamaEmbeddingProvider::new(
                &config.ollama_url,
                &config.embedding_model,
                dimension,
            )?)
        }
    };
    Ok(embedder)
}

pub async fn build_collection(
    config: &ConciergeConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<dyn VectorCollection>, CliError> {
    match config.backend {
        BackendKind::Local => {
            let collection =
                LocalCollection::persistent(&config.data_dir, &config.collection_name, embedder)
                    .await?;
            Ok(Arc::new(collection))
        }
        #[cfg(feature = "chroma")]
        BackendKind::Chroma => {
            use concierge_vector::{ChromaCollection, ChromaConfig};

            let chroma = ChromaConfig::new(&config.chroma_url, &config.collection_name);
            Ok(Arc::new(ChromaCollection::connect(chroma, embedder).await?))
        }
        #[cfg(not(feature = "chroma"))]
        BackendKind::Chroma => Err(CliError::InvalidArgument(
            "this build has no chroma support; rebuild with the `chroma` feature".to_string(),
        )),
    }
}

pub async fn build_repository(
    config: &ConciergeConfig,
) -> Result<Arc<DocumentRepository>, CliError> {
    let embedder = build_embedder(config)?;
    info!(
        backend = ?config.backend,
        embedder = embedder.name(),
        dimension = embedder.dimension(),
        collection = %config.collection_name,
        "Opening document repository"
    );
    let collection = build_collection(config, embedder).await?;
    let repo_config = RepositoryConfig::new().with_max_tag_positions(config.max_tag_positions);
    Ok(Arc::new(DocumentRepository::new(collection, repo_config)))
}

pub async fn run(cli: Cli, config: ConciergeConfig) -> Result<String, CliError> {
    let repository = build_repository(&config).await?;

    match cli.command {
        Commands::Index { vault, batch_size } => {
            let vault = vault.unwrap_or_else(|| config.vault_path.clone());
            let batch_size = batch_size.unwrap_or(config.index_batch_size);
            let indexer = VaultIndexer::new(&vault, repository)?;
            let report = indexer.index_vault(batch_size).await?;
            Ok(format!(
                "indexed {} of {} notes in {} batches ({} empty, {} failed)",
                report.indexed, report.scanned, report.batches, report.skipped_empty, report.failed
            ))
        }
        Commands::Reindex { path } => {
            let indexer = VaultIndexer::new(&config.vault_path, repository)?;
            if indexer.reindex_file(&path).await? {
                Ok(format!("reindexed: {}", path.display()))
            } else {
                Ok(format!("skipped (missing, empty or not markdown): {}", path.display()))
            }
        }
        Commands::Remove { path } => {
            let indexer = VaultIndexer::new(&config.vault_path, repository)?;
            indexer.remove_file(&path).await?;
            Ok(format!("removed: {}", path.display()))
        }
        Commands::Search {
            query,
            limit,
            tags,
            filters,
            json,
        } => {
            let filter = parse_filter(&tags, &filters)?;
            let hits = repository.search(&query, limit, filter.as_ref()).await?;
            if json {
                Ok(serde_json::to_string_pretty(&hits)?)
            } else {
                Ok(format_hits(&format!("Search results for: {query}"), &hits))
            }
        }
        Commands::Get { id } => match repository.get(&id).await? {
            Some(document) => Ok(format_document(&document)?),
            None => Ok(format!("not found: {id}")),
        },
        Commands::Similar { id, limit } => {
            let hits = repository.find_similar(&id, limit).await?;
            Ok(format_hits(&format!("Notes similar to: {id}"), &hits))
        }
        Commands::Delete { ids } => {
            repository.delete(&ids).await?;
            Ok(format!("deleted {} document(s)", ids.len()))
        }
        Commands::Count => Ok(format!("{} documents", repository.count().await?)),
    }
}

/// Builds a caller filter from `--tag` and `--where KEY=VALUE` arguments.
pub fn parse_filter(
    tags: &[String],
    filters: &[String],
) -> Result<Option<MetadataFilter>, CliError> {
    let mut filter = MetadataFilter::new();
    if !tags.is_empty() {
        filter = filter.with_any_tag(tags.iter().cloned());
    }
    for raw in filters {
        let (key, value) = raw
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| {
                CliError::InvalidArgument(format!("expected KEY=VALUE filter, got `{raw}`"))
            })?;
        filter = filter.with(key.trim(), parse_value(value.trim()));
    }
    Ok((!filter.is_empty()).then_some(filter))
}

/// Booleans and numbers are typed; anything else is a string.
fn parse_value(raw: &str) -> MetadataValue {
    match raw {
        "true" => MetadataValue::Bool(true),
        "false" => MetadataValue::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(MetadataValue::Int)
            .or_else(|_| raw.parse::<f64>().map(MetadataValue::Float))
            .unwrap_or_else(|_| MetadataValue::String(raw.to_string())),
    }
}

fn format_hits(title: &str, hits: &[SearchHit]) -> String {
    let mut output = format!("{title}\n\n");
    if hits.is_empty() {
        output.push_str("No results found.\n");
        return output;
    }
    for (i, hit) in hits.iter().enumerate() {
        let label = hit
            .document
            .metadata
            .get("path")
            .and_then(MetadataValue::as_str)
            .unwrap_or(&hit.document.id);
        let _ = match hit.distance {
            Some(distance) => writeln!(output, "{}. [distance: {distance:.3}] {label}", i + 1),
            None => writeln!(output, "{}. {label}", i + 1),
        };
        let _ = writeln!(output, "   {}", preview(&hit.document.content));
        if !hit.document.tags().is_empty() {
            let _ = writeln!(output, "   Tags: {}", hit.document.tags().join(", "));
        }
        output.push('\n');
    }
    let _ = writeln!(output, "Total: {} results", hits.len());
    output
}

fn format_document(document: &Document) -> Result<String, CliError> {
    Ok(format!(
        "id: {}\nmetadata: {}\n\n{}",
        document.id,
        serde_json::to_string_pretty(&document.metadata)?,
        document.content
    ))
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        format!("{}...", flat.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        flat
    }
}
