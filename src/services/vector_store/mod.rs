//! Vector store abstraction layer.
//!
//! A store holds one named collection of comment records and answers
//! cosine-similarity queries over it. Backends are chosen by configuration
//! through [`create_backend`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::VectorStoreError;
use crate::models::{LabelDistribution, LabelFilter, Record, ScoredRecord, StoreDriver, VectorStoreConfig};

/// A store shared between the index builder and query engine.
///
/// Writers take the write lock for one store call at a time, so a query
/// never observes a half-applied batch.
pub type SharedStore = Arc<RwLock<Box<dyn VectorStore>>>;

/// Abstract trait for vector store operations.
///
/// Every backend keeps records in insertion order; that order breaks score
/// ties in [`VectorStore::query`].
pub trait VectorStore: Send + Sync {
    /// Get the collection name.
    fn collection(&self) -> &str;

    /// Backing file, if the store persists to disk.
    fn location(&self) -> Option<PathBuf>;

    fn count(&self) -> Result<usize, VectorStoreError>;

    /// Vector dimension fixed by the first insert, `None` while empty.
    fn dimension(&self) -> Result<Option<usize>, VectorStoreError>;

    /// Remove every record and forget the dimension and fingerprint.
    fn clear(&mut self) -> Result<(), VectorStoreError>;

    /// Insert a batch atomically.
    ///
    /// Fails without writing anything if an id is already present (in the
    /// store or earlier in the batch) or a vector has the wrong dimension.
    fn insert_batch(&mut self, records: Vec<Record>) -> Result<(), VectorStoreError>;

    /// Up to `k` records admitted by `filter`, best cosine score first.
    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &LabelFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError>;

    /// All records in insertion order.
    fn records(&self) -> Result<Vec<Record>, VectorStoreError>;

    /// Label counts over the whole collection, in first-inserted order.
    fn label_counts(&self) -> Result<LabelDistribution, VectorStoreError>;

    /// Corpus fingerprint recorded by the last completed rebuild.
    fn fingerprint(&self) -> Result<Option<String>, VectorStoreError>;

    fn set_fingerprint(&mut self, fingerprint: &str) -> Result<(), VectorStoreError>;
}

/// Create a vector store backend based on configuration.
pub fn create_backend(config: &VectorStoreConfig) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        StoreDriver::Sqlite => {
            let backend = SqliteStore::open(&config.store_dir(), &config.collection)?;
            Ok(Box::new(backend))
        }
        StoreDriver::Memory => Ok(Box::new(MemoryStore::new(&config.collection))),
    }
}

/// Create a backend and wrap it for sharing.
pub fn create_shared(config: &VectorStoreConfig) -> Result<SharedStore, VectorStoreError> {
    Ok(Arc::new(RwLock::new(create_backend(config)?)))
}

/// Cosine similarity accumulated in f64.
///
/// A zero-norm operand has no direction; it scores 0.0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom) as f32
}

pub(crate) fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub(crate) fn decode_vector(blob: &[u8], dimension: usize) -> Result<Vec<f32>, VectorStoreError> {
    let expected_len = dimension * std::mem::size_of::<f32>();
    if blob.len() != expected_len {
        return Err(VectorStoreError::InvalidData(format!(
            "invalid embedding byte length: expected {expected_len}, got {}",
            blob.len()
        )));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Check a batch before any of it is written and return its dimension.
///
/// `existing` is the collection dimension, `None` for an empty collection,
/// in which case the first vector of the batch sets it.
pub(crate) fn validate_batch(
    records: &[Record],
    existing: Option<usize>,
) -> Result<usize, VectorStoreError> {
    let expected = match (existing, records.first()) {
        (Some(dim), _) => dim,
        (None, Some(first)) => first.dimension(),
        (None, None) => return Ok(0),
    };
    if expected == 0 {
        return Err(VectorStoreError::InvalidData(
            "embeddings must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.dimension() != expected {
            return Err(VectorStoreError::DimensionMismatch {
                expected,
                actual: record.dimension(),
            });
        }
        if record.vector.iter().any(|v| !v.is_finite()) {
            return Err(VectorStoreError::InvalidData(format!(
                "embedding for {} contains non-finite values",
                record.id
            )));
        }
        if !seen.insert(record.id.as_str()) {
            return Err(VectorStoreError::DuplicateId(record.id.clone()));
        }
    }
    Ok(expected)
}

/// Check the query vector against the collection dimension.
pub(crate) fn check_query(vector: &[f32], dimension: Option<usize>) -> Result<(), VectorStoreError> {
    match dimension {
        Some(expected) if expected != vector.len() => Err(VectorStoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Score candidates and keep the best `k`.
///
/// Candidates must arrive in insertion order; equal scores keep that order.
pub(crate) fn top_k<I>(query: &[f32], candidates: I, k: usize) -> Vec<ScoredRecord>
where
    I: IntoIterator<Item = Record>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, ScoredRecord)> = candidates
        .into_iter()
        .enumerate()
        .map(|(ordinal, record)| {
            let score = cosine_similarity(query, &record.vector);
            (ordinal, ScoredRecord { record, score })
        })
        .collect();

    let rank = |a: &(usize, ScoredRecord), b: &(usize, ScoredRecord)| {
        b.1.score
            .partial_cmp(&a.1.score)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    };

    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, rank);
        scored.truncate(k);
    }
    scored.sort_unstable_by(rank);
    scored.into_iter().map(|(_, hit)| hit).collect()
}
