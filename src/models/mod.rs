mod config;
mod record;
mod search;

pub use config::{
    APP_NAME, Config, ConfigSource, CorpusConfig, DEFAULT_BATCH_SIZE, DEFAULT_COLLECTION,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_IDLE_TIMEOUT_SECS, DaemonConfig,
    EmbeddingConfig, IndexingConfig, ResolvedConfig, SearchConfig, StoreDriver, VectorStoreConfig,
};
pub use record::{Record, ScoredRecord};
pub use search::{
    ALL_LABELS, LabelCount, LabelDistribution, LabelFilter, OutputFormat, SearchQuery,
    SearchResult, SearchResults,
};
