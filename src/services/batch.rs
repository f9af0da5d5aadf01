use crate::error::IndexError;
use crate::models::Record;
use crate::services::embedding::{EmbedKind, Embedder};
use crate::services::vector_store::SharedStore;
use crate::sources::CommentRow;

/// Embed one contiguous slice of the corpus and store it.
///
/// `offset` is the corpus position of `rows[0]`; record ids follow from it.
/// The store write lock is held only for the insert.
pub async fn process_batch(
    embedder: &dyn Embedder,
    store: &SharedStore,
    offset: usize,
    rows: &[CommentRow],
) -> Result<usize, IndexError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = rows.iter().map(|r| r.comment.clone()).collect();
    let embeddings = embedder.embed(texts, EmbedKind::Document).await?;
    if embeddings.len() != rows.len() {
        return Err(IndexError::EmbeddingCountMismatch {
            expected: rows.len(),
            actual: embeddings.len(),
        });
    }

    let records: Vec<Record> = rows
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (row, vector))| {
            Record::new(offset + i, vector, row.comment.clone(), row.sentiment.clone())
        })
        .collect();

    store.write().await.insert_batch(records)?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::*;
    use crate::services::embedding::test_support::{LexiconEmbedder, ShortEmbedder};
    use crate::services::vector_store::{MemoryStore, VectorStore};

    fn memory_store() -> SharedStore {
        Arc::new(RwLock::new(Box::new(MemoryStore::new("test")) as Box<dyn VectorStore>))
    }

    #[tokio::test]
    async fn test_ids_follow_offset() {
        let store = memory_store();
        let rows = vec![
            CommentRow::new("great video!", "Positive"),
            CommentRow::new("boring", "Negative"),
        ];

        let written = process_batch(&LexiconEmbedder::default(), &store, 5, &rows)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let records = store.read().await.records().unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["comment_5", "comment_6"]);
        assert_eq!(records[1].label, "Negative");
    }

    #[tokio::test]
    async fn test_count_mismatch_writes_nothing() {
        let store = memory_store();
        let rows = vec![CommentRow::new("a", "x"), CommentRow::new("b", "y")];

        let err = process_batch(&ShortEmbedder, &store, 0, &rows)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::EmbeddingCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(store.read().await.count().unwrap(), 0);
    }
}
