use serde::{Deserialize, Serialize};

const ID_PREFIX: &str = "comment_";

/// A stored comment with its embedding and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
    pub document: String,
    pub label: String,
}

impl Record {
    /// Id for the comment at `index` in corpus order.
    pub fn generate_id(index: usize) -> String {
        format!("{ID_PREFIX}{index}")
    }

    pub fn new(index: usize, vector: Vec<f32>, document: String, label: String) -> Self {
        Self {
            id: Self::generate_id(index),
            vector,
            document,
            label,
        }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// A record returned from a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: Record,
    pub score: f32,
}
