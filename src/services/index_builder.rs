//! Corpus-wide index (re)population.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::IndexError;
use crate::services::batch::process_batch;
use crate::services::embedding::Embedder;
use crate::services::vector_store::SharedStore;
use crate::sources::Corpus;

/// Progress after each committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildProgress {
    pub processed: usize,
    pub total: usize,
    pub batches_done: usize,
}

impl RebuildProgress {
    /// Completed share in `[0, 1]`; an empty corpus is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildStats {
    pub collection: String,
    pub rows: usize,
    pub skipped: usize,
    pub records_indexed: usize,
    pub batches: usize,
    pub duration_ms: u64,
}

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    store: SharedStore,
    cancel: Arc<AtomicBool>,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, store: SharedStore) -> Self {
        Self {
            embedder,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop between batches once `cancel` is set. The flag is cleared when
    /// the interruption is reported, so the builder can rebuild again.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Clear the collection and re-embed `corpus` in batches of `batch_size`.
    ///
    /// A failed or interrupted rebuild keeps the batches committed before
    /// it and leaves the fingerprint unset.
    pub async fn rebuild<F>(
        &self,
        corpus: &Corpus,
        batch_size: usize,
        mut progress: F,
    ) -> Result<RebuildStats, IndexError>
    where
        F: FnMut(RebuildProgress),
    {
        if batch_size == 0 {
            return Err(IndexError::InvalidBatchSize);
        }

        let start = Instant::now();
        let total = corpus.len();
        let collection = {
            let mut store = self.store.write().await;
            store.clear()?;
            store.collection().to_string()
        };
        info!(collection = %collection, total, batch_size, "rebuilding index");

        let mut processed = 0;
        let mut batches_done = 0;

        if total == 0 {
            progress(RebuildProgress {
                processed,
                total,
                batches_done,
            });
        }

        for batch in corpus.rows.chunks(batch_size) {
            if self.cancel.swap(false, Ordering::Relaxed) {
                warn!(committed = processed, "rebuild interrupted");
                return Err(IndexError::Interrupted {
                    committed: processed,
                });
            }

            processed += process_batch(self.embedder.as_ref(), &self.store, processed, batch).await?;
            batches_done += 1;
            debug!(processed, total, batches_done, "batch committed");

            progress(RebuildProgress {
                processed,
                total,
                batches_done,
            });
        }

        self.store
            .write()
            .await
            .set_fingerprint(&corpus.fingerprint())?;

        let stats = RebuildStats {
            collection,
            rows: total,
            skipped: corpus.stats.skipped,
            records_indexed: processed,
            batches: batches_done,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            records = stats.records_indexed,
            batches = stats.batches,
            duration_ms = stats.duration_ms,
            "rebuild complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::RwLock;

    use super::*;
    use crate::error::{EmbeddingError, VectorStoreError};
    use crate::models::Record;
    use crate::services::embedding::test_support::{FailingEmbedder, LexiconEmbedder};
    use crate::services::vector_store::{MemoryStore, VectorStore};
    use crate::sources::CommentRow;

    fn memory_store() -> SharedStore {
        Arc::new(RwLock::new(Box::new(MemoryStore::new("test")) as Box<dyn VectorStore>))
    }

    fn corpus(n: usize) -> Corpus {
        let labels = ["Positive", "Negative", "Neutral"];
        Corpus::from_rows(
            (0..n)
                .map(|i| CommentRow::new(format!("comment number {i}"), labels[i % 3]))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_batches_and_progress() {
        let embedder = Arc::new(LexiconEmbedder::default());
        let store = memory_store();
        let builder = IndexBuilder::new(embedder.clone(), store.clone());

        let mut seen = Vec::new();
        let stats = builder
            .rebuild(&corpus(250), 100, |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(embedder.call_sizes(), vec![100, 100, 50]);
        assert_eq!(stats.records_indexed, 250);
        assert_eq!(stats.batches, 3);

        let fractions: Vec<f64> = seen.iter().map(|p| p.fraction()).collect();
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fractions.last().copied(), Some(1.0));
        assert_eq!(seen.last().unwrap().batches_done, 3);
    }

    #[tokio::test]
    async fn test_rebuild_is_deterministic() {
        let store = memory_store();
        let builder = IndexBuilder::new(Arc::new(LexiconEmbedder::default()), store.clone());
        let corpus = corpus(7);

        builder.rebuild(&corpus, 3, |_| {}).await.unwrap();
        let first: Vec<(String, String)> = store
            .read()
            .await
            .records()
            .unwrap()
            .into_iter()
            .map(|r| (r.id, r.label))
            .collect();

        builder.rebuild(&corpus, 3, |_| {}).await.unwrap();
        let second: Vec<(String, String)> = store
            .read()
            .await
            .records()
            .unwrap()
            .into_iter()
            .map(|r| (r.id, r.label))
            .collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
        assert_eq!(first[6].0, "comment_6");
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_contents() {
        let store = memory_store();
        store
            .write()
            .await
            .insert_batch(
                (0..10)
                    .map(|i| Record::new(100 + i, vec![1.0, 0.0, 0.0, 0.0], "old".into(), "Old".into()))
                    .collect(),
            )
            .unwrap();

        let builder = IndexBuilder::new(Arc::new(LexiconEmbedder::default()), store.clone());
        builder.rebuild(&corpus(4), 2, |_| {}).await.unwrap();

        let store = store.read().await;
        assert_eq!(store.count().unwrap(), 4);
        assert_eq!(store.label_counts().unwrap().get("Old"), 0);
        assert_eq!(store.fingerprint().unwrap(), Some(corpus(4).fingerprint()));
    }

    #[tokio::test]
    async fn test_empty_corpus_reports_completion() {
        let store = memory_store();
        let builder = IndexBuilder::new(Arc::new(LexiconEmbedder::default()), store.clone());

        let mut seen = Vec::new();
        let stats = builder
            .rebuild(&Corpus::default(), 100, |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].fraction(), 1.0);
        assert_eq!(stats.records_indexed, 0);
        assert_eq!(store.read().await.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected_before_clearing() {
        let store = memory_store();
        let builder = IndexBuilder::new(Arc::new(LexiconEmbedder::default()), store.clone());
        builder.rebuild(&corpus(3), 10, |_| {}).await.unwrap();

        let err = builder.rebuild(&corpus(3), 0, |_| {}).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidBatchSize));
        assert_eq!(store.read().await.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_committed_batches() {
        let store = memory_store();
        let builder = IndexBuilder::new(Arc::new(FailingEmbedder::new(2)), store.clone());

        let err = builder.rebuild(&corpus(10), 3, |_| {}).await.unwrap_err();
        assert!(matches!(err, IndexError::Embedding(EmbeddingError::InvalidResponse(_))));

        let store = store.read().await;
        assert_eq!(store.count().unwrap(), 6);
        assert_eq!(store.fingerprint().unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_batches() {
        let store = memory_store();
        let builder = IndexBuilder::new(Arc::new(LexiconEmbedder::default()), store.clone());
        let cancel = builder.cancel_flag();

        let err = builder
            .rebuild(&corpus(10), 4, |p| {
                if p.batches_done == 1 {
                    cancel.store(true, Ordering::Relaxed);
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::Interrupted { committed: 4 }));
        assert_eq!(store.read().await.count().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_rebuild_after_interruption_runs_to_completion() {
        let store = memory_store();
        let builder = IndexBuilder::new(Arc::new(LexiconEmbedder::default()), store.clone());
        builder.cancel_flag().store(true, Ordering::Relaxed);

        let err = builder.rebuild(&corpus(6), 2, |_| {}).await.unwrap_err();
        assert!(matches!(err, IndexError::Interrupted { committed: 0 }));
        assert!(!builder.cancel_flag().load(Ordering::Relaxed));

        let stats = builder.rebuild(&corpus(6), 2, |_| {}).await.unwrap();
        assert_eq!(stats.records_indexed, 6);
        assert_eq!(store.read().await.count().unwrap(), 6);
    }

    #[tokio::test]
    async fn test_duplicate_ids_surface_as_store_error() {
        let store = memory_store();
        let builder = IndexBuilder::new(Arc::new(LexiconEmbedder::default()), store.clone());
        builder.rebuild(&corpus(2), 5, |_| {}).await.unwrap();

        // a second writer racing the builder would collide on ids
        let err = process_batch(
            &LexiconEmbedder::default(),
            &store,
            0,
            &corpus(1).rows,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            IndexError::VectorStore(VectorStoreError::DuplicateId(_))
        ));
    }
}
