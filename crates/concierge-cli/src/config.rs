//! Layered configuration.
//!
//! Built-in defaults, then a TOML file (`--config`, or `concierge.toml` in
//! the working directory when present), then `CONCIERGE_*` environment
//! variables. Later layers win.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::CliError;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "concierge.toml";

/// Prefix for environment overrides, e.g. `CONCIERGE_VAULT_PATH`.
pub const ENV_PREFIX: &str = "CONCIERGE_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process collection persisted under `data_dir`
    Local,
    /// Remote Chroma server at `chroma_url`
    Chroma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Offline hashed bag-of-words
    Local,
    /// Ollama server at `ollama_url`
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConciergeConfig {
    pub collection_name: String,
    pub data_dir: PathBuf,
    pub vault_path: PathBuf,
    pub index_batch_size: usize,
    pub log_level: String,
    pub log_format: LogFormat,
    pub backend: BackendKind,
    pub chroma_url: String,
    pub embedding: EmbeddingKind,
    pub ollama_url: String,
    pub embedding_model: String,
    /// Overrides the model's known output size
    pub embedding_dimension: Option<usize>,
    pub max_tag_positions: usize,
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            collection_name: "obsidian_notes".to_string(),
            data_dir: PathBuf::from("data/chromadb"),
            vault_path: PathBuf::from("vault"),
            index_batch_size: 100,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            backend: BackendKind::Local,
            chroma_url: "http://localhost:8000".to_string(),
            embedding: EmbeddingKind::Local,
            ollama_url: "http://127.0.0.1:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimension: None,
            max_tag_positions: concierge_vector::DEFAULT_MAX_TAG_POSITIONS,
        }
    }
}

impl ConciergeConfig {
    /// The merged provider stack, before extraction.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Loads and validates configuration.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(CliError::InvalidArgument(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CliError> {
        if self.collection_name.trim().is_empty() {
            return Err(CliError::InvalidArgument(
                "collection_name cannot be empty".to_string(),
            ));
        }
        if self.index_batch_size == 0 {
            return Err(CliError::InvalidArgument(
                "index_batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_tag_positions == 0 {
            return Err(CliError::InvalidArgument(
                "max_tag_positions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Default `EnvFilter` directives for this crate family at `log_level`.
    pub fn log_directives(&self) -> String {
        let level = self.log_level.to_lowercase();
        ["concierge_cli", "concierge_vector", "concierge_indexer", "concierge_embed"]
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = ConciergeConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, ConciergeConfig::default());
            assert_eq!(config.collection_name, "obsidian_notes");
            assert_eq!(config.index_batch_size, 100);
            assert_eq!(config.max_tag_positions, 32);
            Ok(())
        });
    }

    #[test]
    fn default_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                    collection_name = "work_notes"
                    vault_path = "/home/me/vault"
                    backend = "chroma"
                    index_batch_size = 25
                "#,
            )?;
            jail.set_env("CONCIERGE_INDEX_BATCH_SIZE", "50");
            jail.set_env("CONCIERGE_EMBEDDING", "ollama");

            let config = ConciergeConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.collection_name, "work_notes");
            assert_eq!(config.vault_path, PathBuf::from("/home/me/vault"));
            assert_eq!(config.backend, BackendKind::Chroma);
            assert_eq!(config.index_batch_size, 50);
            assert_eq!(config.embedding, EmbeddingKind::Ollama);
            assert_eq!(config.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn explicit_file_must_exist() {
        Jail::expect_with(|jail| {
            let err = ConciergeConfig::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument(_)));

            jail.create_file("custom.toml", "max_tag_positions = 8")?;
            let config = ConciergeConfig::load(Some(Path::new("custom.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.max_tag_positions, 8);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("CONCIERGE_INDEX_BATCH_SIZE", "0");
            assert!(ConciergeConfig::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn log_directives_cover_every_crate() {
        let config = ConciergeConfig {
            log_level: "DEBUG".to_string(),
            ..Default::default()
        };
        let directives = config.log_directives();
        assert!(directives.contains("concierge_vector=debug"));
        assert!(directives.contains("concierge_indexer=debug"));
    }
}
