//! Query embedding, filtered retrieval and result shaping.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::error::SearchError;
use crate::models::{SearchQuery, SearchResult, SearchResults};
use crate::services::aggregate::summarize;
use crate::services::embedding::Embedder;
use crate::services::vector_store::SharedStore;

pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    store: SharedStore,
}

impl QueryEngine {
    pub fn new(embedder: Arc<dyn Embedder>, store: SharedStore) -> Self {
        Self { embedder, store }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        let start = Instant::now();

        let text = query.query.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".to_string()));
        }
        if query.limit == 0 {
            return Err(SearchError::InvalidQuery(
                "limit must be at least 1".to_string(),
            ));
        }

        if self.store.read().await.count()? == 0 {
            return Err(SearchError::EmptyIndex);
        }

        let vector = self.embedder.embed_query(text).await?;
        let hits = self
            .store
            .read()
            .await
            .query(&vector, query.limit as usize, &query.labels)?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| query.min_score.is_none_or(|min| hit.score >= min))
            .map(SearchResult::from)
            .collect();
        let distribution = summarize(&results);
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            query = text,
            filter = %query.labels,
            results = results.len(),
            duration_ms,
            "search complete"
        );

        Ok(SearchResults {
            query: text.to_string(),
            labels: query.labels.clone(),
            results,
            distribution,
            duration_ms,
        })
    }
}
