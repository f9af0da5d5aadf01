//! CSV comment corpus reader.

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use super::{CommentRow, Corpus, CorpusStats};
use crate::error::CorpusError;
use crate::models::CorpusConfig;

/// Reads `Comment`/`Sentiment` style CSV files into a [`Corpus`].
#[derive(Debug, Clone)]
pub struct CsvCorpusReader {
    text_column: String,
    label_column: String,
}

impl CsvCorpusReader {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            text_column: config.text_column.clone(),
            label_column: config.label_column.clone(),
        }
    }

    pub fn read_path(&self, path: &Path) -> Result<Corpus, CorpusError> {
        let file = std::fs::File::open(path)?;
        let mut corpus = self.read(file)?;
        corpus.source = Some(path.to_path_buf());
        Ok(corpus)
    }

    /// Parse rows, skipping malformed rows and rows without comment text.
    pub fn read<R: Read>(&self, input: R) -> Result<Corpus, CorpusError> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);

        let headers = reader.headers()?.clone();
        let text_idx = find_column(&headers, &self.text_column)?;
        let label_idx = find_column(&headers, &self.label_column)?;

        let mut rows = Vec::new();
        let mut stats = CorpusStats::default();

        for (row, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(row = row + 1, error = %e, "skipping malformed row");
                    stats.skipped += 1;
                    continue;
                }
            };

            if record.len() > headers.len() {
                warn!(
                    row = row + 1,
                    fields = record.len(),
                    expected = headers.len(),
                    "skipping row with extra fields"
                );
                stats.skipped += 1;
                continue;
            }

            let comment = cell(&record, text_idx);
            if comment.is_empty() {
                debug!(row = row + 1, "skipping row without comment text");
                stats.skipped += 1;
                continue;
            }

            rows.push(CommentRow {
                comment,
                sentiment: cell(&record, label_idx),
            });
        }

        stats.rows = rows.len();
        Ok(Corpus {
            rows,
            stats,
            source: None,
        })
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, CorpusError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| CorpusError::MissingColumn(name.to_string()))
}

/// Missing cells read as empty strings.
fn cell(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or_default().trim().to_string()
}
