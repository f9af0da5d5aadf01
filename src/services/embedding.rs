//! Embedder seam between the index/query services and the embedding model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::DaemonClient;
use crate::error::EmbeddingError;
use crate::models::{Config, EmbeddingConfig};

/// Which side of retrieval a text is embedded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    /// Comments being indexed
    Document,
    /// Search queries
    Query,
}

impl EmbedKind {
    pub fn is_query(self) -> bool {
        matches!(self, EmbedKind::Query)
    }
}

/// Maps texts to fixed-dimension vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(
        &self,
        texts: Vec<String>,
        kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Identifier of the model behind this embedder.
    fn model_id(&self) -> &str;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(vec![text.to_string()], EmbedKind::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }
}

/// Embedder backed by the local embedding daemon.
pub struct DaemonEmbedder {
    client: DaemonClient,
    model_id: String,
    query_prefix: Option<String>,
    document_prefix: Option<String>,
}

impl DaemonEmbedder {
    pub fn new(config: &Config) -> Self {
        Self::with_client(DaemonClient::new(config), &config.embedding)
    }

    pub fn with_client(client: DaemonClient, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            model_id: config.model_id.clone(),
            query_prefix: config.query_prefix.clone(),
            document_prefix: config.document_prefix.clone(),
        }
    }

    fn prefix_for(&self, kind: EmbedKind) -> Option<&str> {
        match kind {
            EmbedKind::Query => self.query_prefix.as_deref(),
            EmbedKind::Document => self.document_prefix.as_deref(),
        }
    }
}

#[async_trait]
impl Embedder for DaemonEmbedder {
    async fn embed(
        &self,
        texts: Vec<String>,
        kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts = match self.prefix_for(kind) {
            Some(prefix) => texts.into_iter().map(|t| format!("{prefix}{t}")).collect(),
            None => texts,
        };

        let expected = texts.len();
        let embeddings = self.client.embed(texts, kind.is_query()).await?;
        if embeddings.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "daemon returned {} embeddings for {expected} texts",
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Deterministic embedders for service tests.

    use std::sync::Mutex;

    use super::*;

    const LEXICON: &[(&str, usize)] = &[
        ("great", 0),
        ("loved", 0),
        ("love", 0),
        ("best", 0),
        ("amazing", 0),
        ("boring", 1),
        ("hate", 1),
        ("worst", 1),
        ("bad", 1),
        ("okay", 2),
        ("first", 2),
        ("video", 2),
    ];

    /// Maps words onto a few sentiment axes plus a bias axis.
    ///
    /// "I loved it" and "great video!" share the first axis, so they land
    /// close together, while "boring" sits on an orthogonal axis.
    #[derive(Default)]
    pub struct LexiconEmbedder {
        pub calls: Mutex<Vec<(usize, EmbedKind)>>,
    }

    impl LexiconEmbedder {
        pub fn vector(text: &str) -> Vec<f32> {
            let mut vector = vec![0.0f32; 4];
            vector[3] = 0.1;
            for word in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
            {
                let word = word.to_lowercase();
                if let Some((_, axis)) = LEXICON.iter().find(|(w, _)| *w == word) {
                    vector[*axis] += 1.0;
                }
            }
            vector
        }

        pub fn call_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(|(n, _)| *n).collect()
        }
    }

    #[async_trait]
    impl Embedder for LexiconEmbedder {
        async fn embed(
            &self,
            texts: Vec<String>,
            kind: EmbedKind,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.lock().unwrap().push((texts.len(), kind));
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }

        fn model_id(&self) -> &str {
            "test/lexicon"
        }
    }

    /// Fails on the given call (0-based), succeeds otherwise.
    pub struct FailingEmbedder {
        pub fail_on: usize,
        pub calls: Mutex<usize>,
    }

    impl FailingEmbedder {
        pub fn new(fail_on: usize) -> Self {
            Self {
                fail_on,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(
            &self,
            texts: Vec<String>,
            _kind: EmbedKind,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            if call == self.fail_on {
                return Err(EmbeddingError::InvalidResponse("model crashed".to_string()));
            }
            Ok(texts.iter().map(|t| LexiconEmbedder::vector(t)).collect())
        }

        fn model_id(&self) -> &str {
            "test/failing"
        }
    }

    /// Returns one vector fewer than requested.
    pub struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(
            &self,
            texts: Vec<String>,
            _kind: EmbedKind,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .skip(1)
                .map(|t| LexiconEmbedder::vector(t))
                .collect())
        }

        fn model_id(&self) -> &str {
            "test/short"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::LexiconEmbedder;
    use super::*;
    use crate::services::vector_store::cosine_similarity;

    #[test]
    fn test_embed_kind_is_query() {
        assert!(EmbedKind::Query.is_query());
        assert!(!EmbedKind::Document.is_query());
    }

    #[test]
    fn test_prefix_selection() {
        let config = EmbeddingConfig {
            query_prefix: Some("query: ".to_string()),
            document_prefix: Some("passage: ".to_string()),
            ..Default::default()
        };
        let embedder = DaemonEmbedder::with_client(DaemonClient::new(&Config::default()), &config);
        assert_eq!(embedder.prefix_for(EmbedKind::Query), Some("query: "));
        assert_eq!(embedder.prefix_for(EmbedKind::Document), Some("passage: "));
        assert_eq!(embedder.model_id(), config.model_id);
    }

    #[tokio::test]
    async fn test_embed_query_returns_single_vector() {
        let embedder = LexiconEmbedder::default();
        let vector = embedder.embed_query("great video").await.unwrap();
        assert_eq!(vector.len(), 4);
        assert_eq!(embedder.call_sizes(), vec![1]);
        assert_eq!(embedder.calls.lock().unwrap()[0].1, EmbedKind::Query);
    }

    #[test]
    fn test_lexicon_geometry() {
        let loved = LexiconEmbedder::vector("I loved it");
        let great = LexiconEmbedder::vector("great video!");
        let boring = LexiconEmbedder::vector("boring");
        assert!(cosine_similarity(&loved, &great) > cosine_similarity(&loved, &boring));
    }
}
