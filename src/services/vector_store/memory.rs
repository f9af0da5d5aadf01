//! In-process vector store. Nothing survives the process.

use std::collections::HashSet;
use std::path::PathBuf;

use super::{VectorStore, check_query, top_k, validate_batch};
use crate::error::VectorStoreError;
use crate::models::{LabelDistribution, LabelFilter, Record, ScoredRecord};
use crate::services::aggregate::count_labels;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collection: String,
    records: Vec<Record>,
    ids: HashSet<String>,
    dimension: Option<usize>,
    fingerprint: Option<String>,
}

impl MemoryStore {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            ..Default::default()
        }
    }
}

impl VectorStore for MemoryStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn location(&self) -> Option<PathBuf> {
        None
    }

    fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.records.len())
    }

    fn dimension(&self) -> Result<Option<usize>, VectorStoreError> {
        Ok(self.dimension)
    }

    fn clear(&mut self) -> Result<(), VectorStoreError> {
        self.records.clear();
        self.ids.clear();
        self.dimension = None;
        self.fingerprint = None;
        Ok(())
    }

    fn insert_batch(&mut self, records: Vec<Record>) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let dimension = validate_batch(&records, self.dimension)?;
        if let Some(dup) = records.iter().find(|r| self.ids.contains(&r.id)) {
            return Err(VectorStoreError::DuplicateId(dup.id.clone()));
        }

        self.ids.extend(records.iter().map(|r| r.id.clone()));
        self.records.extend(records);
        self.dimension = Some(dimension);
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &LabelFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        if self.dimension.is_none() {
            return Ok(Vec::new());
        }
        check_query(vector, self.dimension)?;

        let candidates = self
            .records
            .iter()
            .filter(|r| filter.matches(&r.label))
            .cloned();
        Ok(top_k(vector, candidates, k))
    }

    fn records(&self) -> Result<Vec<Record>, VectorStoreError> {
        Ok(self.records.clone())
    }

    fn label_counts(&self) -> Result<LabelDistribution, VectorStoreError> {
        Ok(count_labels(self.records.iter().map(|r| r.label.as_str())))
    }

    fn fingerprint(&self) -> Result<Option<String>, VectorStoreError> {
        Ok(self.fingerprint.clone())
    }

    fn set_fingerprint(&mut self, fingerprint: &str) -> Result<(), VectorStoreError> {
        self.fingerprint = Some(fingerprint.to_string());
        Ok(())
    }
}
