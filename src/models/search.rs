//! Search-related models for queries, filters and results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::record::ScoredRecord;

/// Selection value meaning "no label restriction".
pub const ALL_LABELS: &str = "All";

/// Output format for search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Predicate over record labels.
///
/// The three shapes are interchangeable views of one predicate: `Any`
/// accepts everything, `Exactly` is an equality match and `OneOf` a set
/// membership match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "labels", rename_all = "snake_case")]
pub enum LabelFilter {
    #[default]
    Any,
    Exactly(String),
    OneOf(BTreeSet<String>),
}

impl LabelFilter {
    /// Build a filter from a user selection.
    ///
    /// An empty selection, or one containing `All` (any case), is
    /// unrestricted. Blank entries are ignored and duplicates collapse.
    pub fn from_selection<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() {
                continue;
            }
            if label.eq_ignore_ascii_case(ALL_LABELS) {
                return LabelFilter::Any;
            }
            set.insert(label.to_string());
        }

        match set.len() {
            0 => LabelFilter::Any,
            1 => LabelFilter::Exactly(set.into_iter().next().unwrap_or_default()),
            _ => LabelFilter::OneOf(set),
        }
    }

    pub fn matches(&self, label: &str) -> bool {
        match self {
            LabelFilter::Any => true,
            LabelFilter::Exactly(expected) => expected == label,
            LabelFilter::OneOf(set) => set.is_empty() || set.contains(label),
        }
    }

    /// True for `Any` and for an empty `OneOf`.
    pub fn is_unrestricted(&self) -> bool {
        match self {
            LabelFilter::Any => true,
            LabelFilter::Exactly(_) => false,
            LabelFilter::OneOf(set) => set.is_empty(),
        }
    }

    /// Labels this filter admits, in sorted order. Empty for `Any`.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            LabelFilter::Any => Vec::new(),
            LabelFilter::Exactly(label) => vec![label.as_str()],
            LabelFilter::OneOf(set) => set.iter().map(String::as_str).collect(),
        }
    }
}

impl std::fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            _ if self.is_unrestricted() => write!(f, "{}", ALL_LABELS),
            _ => write!(f, "{}", self.labels().join(", ")),
        }
    }
}

/// User's search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Natural language query text
    pub query: String,

    /// Maximum results to return
    pub limit: u32,

    /// Label restriction
    pub labels: LabelFilter,

    /// Minimum similarity threshold
    pub min_score: Option<f32>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: 10,
            labels: LabelFilter::Any,
            min_score: None,
        }
    }
}

impl SearchQuery {
    /// Create a new search query with the given text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Restrict results to the given labels.
    pub fn with_labels(mut self, labels: LabelFilter) -> Self {
        self.labels = labels;
        self
    }

    /// Set the minimum score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// A single search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching record ID
    pub id: String,

    /// Cosine similarity with the query
    pub score: f32,

    /// Comment text
    pub content: String,

    /// Sentiment label
    pub label: String,
}

impl From<ScoredRecord> for SearchResult {
    fn from(hit: ScoredRecord) -> Self {
        Self {
            id: hit.record.id,
            score: hit.score,
            content: hit.record.document,
            label: hit.record.label,
        }
    }
}

/// Ordered label counts, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub counts: Vec<LabelCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

impl LabelDistribution {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }

    pub fn get(&self, label: &str) -> usize {
        self.counts
            .iter()
            .find(|c| c.label == label)
            .map_or(0, |c| c.count)
    }

    /// Share of `label` in percent, 0.0 for an empty distribution.
    pub fn percentage(&self, label: &str) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.get(label) as f64 * 100.0 / total as f64
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|c| (c.label.as_str(), c.count))
    }
}

/// Collection of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Query that was executed
    pub query: String,

    /// Label restriction that was applied
    pub labels: LabelFilter,

    /// Matching results, best first
    pub results: Vec<SearchResult>,

    /// Label counts over `results`
    pub distribution: LabelDistribution,

    /// Query execution time in milliseconds
    pub duration_ms: u64,
}

impl SearchResults {
    /// Check if there are no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get the number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }
}
