use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const APP_NAME: &str = "comment-search";
pub const DEFAULT_COLLECTION: &str = "mrbeast_comments";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

const PROJECT_DIR: &str = ".comment-search";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// A loaded configuration together with the file it came from.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    Project,
    Global,
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Project => write!(f, "project"),
            ConfigSource::Global => write!(f, "global"),
            ConfigSource::Default => write!(f, "default"),
        }
    }
}

impl Config {
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn project_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|p| p.join(PROJECT_DIR).join(CONFIG_FILE))
    }

    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join(APP_NAME))
    }

    pub fn models_dir() -> Option<PathBuf> {
        Self::data_dir().map(|p| p.join("models"))
    }

    pub fn runtime_dir() -> PathBuf {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_NAME)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .clone()
            .unwrap_or_else(|| Self::runtime_dir().join("daemon.sock"))
    }

    pub fn pid_path(&self) -> PathBuf {
        self.socket_path().with_extension("pid")
    }

    /// Directory holding the ONNX model and tokenizer.
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.embedding.model_path.clone().or_else(|| {
            Self::models_dir().map(|p| p.join(self.embedding.model_id.replace('/', "--")))
        })
    }

    /// Load the project config if present, else the global one, else defaults.
    pub fn load() -> Result<ResolvedConfig, ConfigError> {
        let candidates = [
            (Self::project_path(), ConfigSource::Project),
            (Self::global_path(), ConfigSource::Global),
        ];

        for (path, source) in candidates {
            if let Some(path) = path
                && path.exists()
            {
                let config = Self::load_from(&path)?;
                return Ok(ResolvedConfig {
                    config,
                    path: Some(path),
                    source,
                });
            }
        }

        Ok(ResolvedConfig::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexing.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.search.default_limit == 0 {
            return Err(ConfigError::ValidationError(
                "search.default_limit must be at least 1".to_string(),
            ));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "vector_store.collection cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Prepended to search queries (e.g. "query: " for E5 models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_prefix: Option<String>,

    /// Prepended to indexed comments (e.g. "passage: " for E5 models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_prefix: Option<String>,
}

fn default_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_tokens() -> u32 {
    256
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            model_path: None,
            dimension: default_dimension(),
            max_tokens: default_max_tokens(),
            query_prefix: None,
            document_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for StoreDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreDriver::Sqlite => write!(f, "sqlite"),
            StoreDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: StoreDriver,

    /// Directory for the store file; defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl VectorStoreConfig {
    /// Directory holding the store file.
    pub fn store_dir(&self) -> PathBuf {
        self.path
            .clone()
            .or_else(Config::data_dir)
            .unwrap_or_else(|| PathBuf::from(PROJECT_DIR))
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::default(),
            path: None,
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Files tried in order when no explicit path is given.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,

    #[serde(default = "default_text_column")]
    pub text_column: String,

    #[serde(default = "default_label_column")]
    pub label_column: String,
}

fn default_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("sentiment_analysis_dataset.csv"),
        PathBuf::from("data.csv"),
    ]
}

fn default_text_column() -> String {
    "Comment".to_string()
}

fn default_label_column() -> String {
    "Sentiment".to_string()
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            text_column: default_text_column(),
            label_column: default_label_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default)]
    pub default_format: OutputFormat,

    #[serde(default)]
    pub default_min_score: Option<f32>,
}

fn default_limit() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_format: OutputFormat::Text,
            default_min_score: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

fn default_auto_start() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            auto_start: default_auto_start(),
            socket_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.vector_store.driver, StoreDriver::Sqlite);
        assert_eq!(config.indexing.batch_size, 100);
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.embedding.dimension, 384);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_corpus_candidates_order() {
        let config = CorpusConfig::default();
        assert_eq!(
            config.candidates,
            vec![
                PathBuf::from("sentiment_analysis_dataset.csv"),
                PathBuf::from("data.csv")
            ]
        );
        assert_eq!(config.text_column, "Comment");
        assert_eq!(config.label_column, "Sentiment");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [vector_store]
            driver = "memory"

            [indexing]
            batch_size = 32
            "#,
        )
        .unwrap();

        assert_eq!(config.vector_store.driver, StoreDriver::Memory);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.indexing.batch_size, 32);
        assert_eq!(config.embedding.model_id, DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = Config::default();
        config.indexing.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = Config::default();
        config.vector_store.collection = "other".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.vector_store.collection, "other");
    }

    #[test]
    fn test_pid_path_next_to_socket() {
        let mut config = Config::default();
        config.daemon.socket_path = Some(PathBuf::from("/tmp/cs/daemon.sock"));
        assert_eq!(config.pid_path(), PathBuf::from("/tmp/cs/daemon.pid"));
    }

    #[test]
    fn test_store_dir_override() {
        let config = VectorStoreConfig {
            path: Some(PathBuf::from("/var/lib/cs")),
            ..Default::default()
        };
        assert_eq!(config.store_dir(), PathBuf::from("/var/lib/cs"));
    }

    #[test]
    fn test_model_dir_from_model_id() {
        let config = Config::default();
        if let Some(dir) = config.model_dir() {
            assert!(dir.ends_with("sentence-transformers--all-MiniLM-L6-v2"));
        }
    }
}
