//! Error types for the comment search CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the comment corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus file not found (tried: {})", display_paths(.tried))]
    NotFound { tried: Vec<PathBuf> },

    #[error("corpus is missing required column: {0}")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding daemon error: {0}")]
    Daemon(#[from] DaemonError),

    #[error("embedding model error: {0}")]
    Model(#[from] ModelError),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by the ONNX embedding model inside the daemon.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("failed to load model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),
}

/// Errors on the daemon socket, from either side.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("daemon is not running")]
    NotRunning,

    #[error("failed to spawn daemon: {0}")]
    SpawnError(String),

    #[error("timed out waiting for daemon")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    #[error("embedding dimension mismatch: store has {expected}, got {actual} (rebuild the index)")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to (re)building the index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("embedder returned {actual} vectors for {expected} texts")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error("rebuild interrupted after {committed} records")]
    Interrupted { committed: usize },
}

/// Errors related to search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("the index is empty")]
    EmptyIndex,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

impl SearchError {
    /// Whether the caller can fix this without restarting anything.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SearchError::EmptyIndex | SearchError::InvalidQuery(_) => true,
            SearchError::Embedding(EmbeddingError::Daemon(_)) => true,
            SearchError::Embedding(_) => false,
            SearchError::VectorStore(VectorStoreError::DimensionMismatch { .. }) => true,
            SearchError::VectorStore(_) => false,
        }
    }

    /// Short guidance shown next to the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SearchError::EmptyIndex => Some("Build the index first: csearch index build"),
            SearchError::VectorStore(VectorStoreError::DimensionMismatch { .. }) => {
                Some("The embedding model changed. Rebuild with: csearch index build")
            }
            SearchError::Embedding(EmbeddingError::Daemon(_)) => {
                Some("Check the embedding daemon with: csearch status")
            }
            _ => None,
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_every_path() {
        let err = CorpusError::NotFound {
            tried: vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")],
        };
        assert_eq!(err.to_string(), "corpus file not found (tried: a.csv, b.csv)");
    }

    #[test]
    fn test_search_error_guidance() {
        assert!(SearchError::EmptyIndex.is_recoverable());
        assert!(SearchError::EmptyIndex.hint().is_some());

        let mismatch = SearchError::VectorStore(VectorStoreError::DimensionMismatch {
            expected: 384,
            actual: 768,
        });
        assert!(mismatch.hint().unwrap().contains("index build"));

        let corrupt = SearchError::VectorStore(VectorStoreError::InvalidData("bad".into()));
        assert!(!corrupt.is_recoverable());
        assert!(corrupt.hint().is_none());
    }
}
