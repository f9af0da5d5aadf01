pub mod aggregate;
mod batch;
pub mod embedding;
pub mod index_builder;
pub mod query_engine;
pub mod registry;
pub mod vector_store;

pub use aggregate::{count_labels, summarize};
pub use batch::process_batch;
pub use embedding::{DaemonEmbedder, EmbedKind, Embedder};
pub use index_builder::{IndexBuilder, RebuildProgress, RebuildStats};
pub use query_engine::QueryEngine;
pub use vector_store::{
    MemoryStore, SharedStore, SqliteStore, VectorStore, cosine_similarity, create_backend,
    create_shared,
};
