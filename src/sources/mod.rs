//! Comment corpus loading.
//!
//! A corpus is the ordered list of comment rows read from a CSV file. Row
//! order (after skipped rows are dropped) defines record ids, so the same
//! file always produces the same ids.

mod csv_file;

pub use csv_file::CsvCorpusReader;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::CorpusError;
use crate::models::CorpusConfig;

/// One usable source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub comment: String,
    pub sentiment: String,
}

impl CommentRow {
    pub fn new(comment: impl Into<String>, sentiment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            sentiment: sentiment.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub rows: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub rows: Vec<CommentRow>,
    pub stats: CorpusStats,
    pub source: Option<PathBuf>,
}

impl Corpus {
    pub fn from_rows(rows: Vec<CommentRow>) -> Self {
        let stats = CorpusStats {
            rows: rows.len(),
            skipped: 0,
        };
        Self {
            rows,
            stats,
            source: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.sentiment.as_str())
    }

    /// SHA-256 over every row, in order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for row in &self.rows {
            hasher.update(row.comment.as_bytes());
            hasher.update([0x1f]);
            hasher.update(row.sentiment.as_bytes());
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Load the corpus from `explicit`, or from the first configured candidate
/// that exists.
pub fn load_corpus(config: &CorpusConfig, explicit: Option<&Path>) -> Result<Corpus, CorpusError> {
    let path = resolve_corpus_path(config, explicit)?;
    let corpus = CsvCorpusReader::new(config).read_path(&path)?;
    info!(
        path = %path.display(),
        rows = corpus.stats.rows,
        skipped = corpus.stats.skipped,
        "loaded corpus"
    );
    Ok(corpus)
}

pub fn resolve_corpus_path(
    config: &CorpusConfig,
    explicit: Option<&Path>,
) -> Result<PathBuf, CorpusError> {
    let candidates: Vec<PathBuf> = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => config.candidates.clone(),
    };

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(CorpusError::NotFound { tried: candidates })
}
