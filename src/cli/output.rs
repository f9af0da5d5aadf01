use std::fmt::Write as FmtWrite;
use std::path::PathBuf;

use console::style;
use serde::Serialize;

use crate::models::{LabelDistribution, OutputFormat, SearchResults};
use crate::services::RebuildStats;

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_rebuild_stats(&self, stats: &RebuildStats) -> String;
    fn format_corpus_overview(&self, overview: &CorpusOverview) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str, hint: Option<&str>) -> String;
}

/// Whether the stored index reflects the current corpus file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Built from the corpus as it is now
    Current,
    /// Built from a different version of the corpus
    Stale,
    /// Records present but the last rebuild did not finish
    Incomplete,
    Empty,
    /// Corpus could not be read to compare
    Unknown,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IndexState::Current => "up to date",
            IndexState::Stale => "stale (corpus changed, rebuild needed)",
            IndexState::Incomplete => "incomplete (last rebuild did not finish)",
            IndexState::Empty => "empty",
            IndexState::Unknown => "unknown (corpus not found)",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub daemon_running: bool,
    pub daemon_pid: Option<u32>,
    pub daemon_idle_secs: Option<u64>,
    pub embedding_model: String,
    pub store_driver: String,
    pub store_path: Option<PathBuf>,
    pub store_error: Option<String>,
    pub collection: String,
    pub records: usize,
    pub dimension: Option<usize>,
    pub index_state: IndexState,
}

/// Corpus size and label mix.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusOverview {
    pub source: Option<PathBuf>,
    pub rows: usize,
    pub skipped: usize,
    pub distribution: LabelDistribution,
}

fn render(build: impl FnOnce(&mut String) -> std::fmt::Result) -> String {
    let mut output = String::new();
    // writing into a String cannot fail
    let _ = build(&mut output);
    output
}

fn preview(content: &str) -> String {
    let preview: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        format!("{}...", preview)
    } else {
        preview
    }
}

fn styled_label(label: &str) -> String {
    let shown = if label.is_empty() { "(none)" } else { label };
    match label.to_ascii_lowercase().as_str() {
        "positive" => style(shown).green().to_string(),
        "negative" => style(shown).red().to_string(),
        "neutral" => style(shown).yellow().to_string(),
        _ => style(shown).cyan().to_string(),
    }
}

pub struct TextFormatter;

impl TextFormatter {
    fn write_distribution(out: &mut String, dist: &LabelDistribution) -> std::fmt::Result {
        for (label, count) in dist.iter() {
            writeln!(
                out,
                "  {:<12} {:>6}  ({:.1}%)",
                styled_label(label),
                count,
                dist.percentage(label)
            )?;
        }
        Ok(())
    }
}

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!(
                "No results found for: {} (labels: {})\n",
                results.query, results.labels
            );
        }

        render(|out| {
            writeln!(out, "Search results for: \"{}\"", results.query)?;
            writeln!(
                out,
                "Found {} results in {}ms (labels: {})\n",
                results.len(),
                results.duration_ms,
                results.labels
            )?;

            for (i, result) in results.results.iter().enumerate() {
                writeln!(
                    out,
                    "{}. [Score: {:.3}] {} {}",
                    i + 1,
                    result.score,
                    styled_label(&result.label),
                    style(&result.id).dim()
                )?;
                for line in preview(&result.content).lines() {
                    writeln!(out, "   {}", line)?;
                }
                writeln!(out)?;
            }

            writeln!(out, "Sentiment distribution")?;
            writeln!(out, "----------------------")?;
            Self::write_distribution(out, &results.distribution)
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|out| {
            writeln!(out, "Status")?;
            writeln!(out, "------")?;

            let daemon_status = if status.daemon_running {
                "[RUNNING]"
            } else {
                "[STOPPED]"
            };
            writeln!(out, "Embedding Daemon: {}", daemon_status)?;
            writeln!(out, "  Model:       {}", status.embedding_model)?;
            if let Some(pid) = status.daemon_pid {
                writeln!(out, "  PID:         {}", pid)?;
            }
            if let Some(idle) = status.daemon_idle_secs {
                writeln!(out, "  Idle:        {}s", idle)?;
            }
            writeln!(out)?;

            let store_status = if status.store_error.is_none() {
                "[OK]"
            } else {
                "[ERROR]"
            };
            writeln!(out, "Vector Store:  {} {}", status.store_driver, store_status)?;
            if let Some(ref path) = status.store_path {
                writeln!(out, "  Path:        {}", path.display())?;
            }
            if let Some(ref err) = status.store_error {
                writeln!(out, "  Error:       {}", err)?;
            }
            writeln!(out, "  Collection:  {}", status.collection)?;
            writeln!(out, "  Records:     {}", status.records)?;
            if let Some(dim) = status.dimension {
                writeln!(out, "  Dimension:   {}", dim)?;
            }
            writeln!(out, "  Index:       {}", status.index_state)
        })
    }

    fn format_rebuild_stats(&self, stats: &RebuildStats) -> String {
        render(|out| {
            writeln!(out, "Indexing Complete")?;
            writeln!(out, "-----------------")?;
            writeln!(out, "Collection:      {}", stats.collection)?;
            writeln!(out, "Rows read:       {}", stats.rows)?;
            writeln!(out, "Rows skipped:    {}", stats.skipped)?;
            writeln!(out, "Records indexed: {}", stats.records_indexed)?;
            writeln!(out, "Batches:         {}", stats.batches)?;
            writeln!(out, "Duration:        {}ms", stats.duration_ms)
        })
    }

    fn format_corpus_overview(&self, overview: &CorpusOverview) -> String {
        render(|out| {
            writeln!(out, "Dataset Overview")?;
            writeln!(out, "----------------")?;
            if let Some(ref source) = overview.source {
                writeln!(out, "File:           {}", source.display())?;
            }
            writeln!(out, "Total comments: {}", overview.rows)?;
            if overview.skipped > 0 {
                writeln!(out, "Skipped rows:   {}", overview.skipped)?;
            }
            writeln!(out)?;
            writeln!(out, "Sentiment distribution")?;
            Self::write_distribution(out, &overview.distribution)
        })
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str, hint: Option<&str>) -> String {
        match hint {
            Some(hint) => format!("Error: {}\nHint: {}\n", error, hint),
            None => format!("Error: {}\n", error),
        }
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json(&self, value: &impl Serialize) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        self.to_json(results)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.to_json(status)
    }

    fn format_rebuild_stats(&self, stats: &RebuildStats) -> String {
        self.to_json(stats)
    }

    fn format_corpus_overview(&self, overview: &CorpusOverview) -> String {
        let labels: Vec<serde_json::Value> = overview
            .distribution
            .iter()
            .map(|(label, count)| {
                serde_json::json!({
                    "label": label,
                    "count": count,
                    "percentage": overview.distribution.percentage(label),
                })
            })
            .collect();

        self.to_json(&serde_json::json!({
            "source": overview.source,
            "rows": overview.rows,
            "skipped": overview.skipped,
            "labels": labels,
        }))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str, hint: Option<&str>) -> String {
        serde_json::json!({"error": error, "hint": hint}).to_string()
    }
}

pub struct MarkdownFormatter;

impl MarkdownFormatter {
    fn write_distribution(out: &mut String, dist: &LabelDistribution) -> std::fmt::Result {
        writeln!(out, "| Sentiment | Count | Share |")?;
        writeln!(out, "|-----------|-------|-------|")?;
        for (label, count) in dist.iter() {
            writeln!(
                out,
                "| {} | {} | {:.1}% |",
                label,
                count,
                dist.percentage(label)
            )?;
        }
        Ok(())
    }
}

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        render(|out| {
            writeln!(out, "## Search Results\n")?;
            writeln!(out, "**Query:** `{}`\n", results.query)?;
            writeln!(out, "**Labels:** {}\n", results.labels)?;
            writeln!(
                out,
                "Found {} results in {}ms\n",
                results.len(),
                results.duration_ms
            )?;

            for (i, result) in results.results.iter().enumerate() {
                writeln!(
                    out,
                    "### {}. Score: {:.3} ({})\n",
                    i + 1,
                    result.score,
                    result.label
                )?;
                writeln!(out, "> {}\n", result.content.replace('\n', "\n> "))?;
            }

            writeln!(out, "### Sentiment Distribution\n")?;
            Self::write_distribution(out, &results.distribution)
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|out| {
            writeln!(out, "## Status\n")?;

            let daemon_status = if status.daemon_running { "✅" } else { "❌" };
            writeln!(out, "### Embedding Daemon {}\n", daemon_status)?;
            writeln!(out, "- **Model:** {}", status.embedding_model)?;
            if let Some(idle) = status.daemon_idle_secs {
                writeln!(out, "- **Idle:** {}s", idle)?;
            }
            writeln!(out)?;

            let store_status = if status.store_error.is_none() {
                "✅"
            } else {
                "❌"
            };
            writeln!(out, "### Vector Store ({}) {}\n", status.store_driver, store_status)?;
            if let Some(ref path) = status.store_path {
                writeln!(out, "- **Path:** `{}`", path.display())?;
            }
            writeln!(out, "- **Collection:** {}", status.collection)?;
            writeln!(out, "- **Records:** {}", status.records)?;
            writeln!(out, "- **Index:** {}", status.index_state)
        })
    }

    fn format_rebuild_stats(&self, stats: &RebuildStats) -> String {
        render(|out| {
            writeln!(out, "## Indexing Complete\n")?;
            writeln!(out, "| Metric | Value |")?;
            writeln!(out, "|--------|-------|")?;
            writeln!(out, "| Collection | {} |", stats.collection)?;
            writeln!(out, "| Rows read | {} |", stats.rows)?;
            writeln!(out, "| Rows skipped | {} |", stats.skipped)?;
            writeln!(out, "| Records indexed | {} |", stats.records_indexed)?;
            writeln!(out, "| Batches | {} |", stats.batches)?;
            writeln!(out, "| Duration | {}ms |", stats.duration_ms)
        })
    }

    fn format_corpus_overview(&self, overview: &CorpusOverview) -> String {
        render(|out| {
            writeln!(out, "## Dataset Overview\n")?;
            if let Some(ref source) = overview.source {
                writeln!(out, "- **File:** `{}`", source.display())?;
            }
            writeln!(out, "- **Total comments:** {}\n", overview.rows)?;
            Self::write_distribution(out, &overview.distribution)
        })
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str, hint: Option<&str>) -> String {
        match hint {
            Some(hint) => format!("> ⚠️ **Error:** {}\n>\n> {}\n", error, hint),
            None => format!("> ⚠️ **Error:** {}\n", error),
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelCount, LabelFilter, SearchResult};
    use crate::services::summarize;

    fn sample_results() -> SearchResults {
        let results = vec![
            SearchResult {
                id: "comment_0".into(),
                score: 0.91,
                content: "great video!".into(),
                label: "Positive".into(),
            },
            SearchResult {
                id: "comment_7".into(),
                score: 0.42,
                content: "first".into(),
                label: "Neutral".into(),
            },
        ];
        SearchResults {
            query: "loved it".into(),
            labels: LabelFilter::Any,
            distribution: summarize(&results),
            results,
            duration_ms: 3,
        }
    }

    #[test]
    fn test_text_results_include_distribution() {
        console::set_colors_enabled(false);
        let text = TextFormatter.format_search_results(&sample_results());
        assert!(text.contains("1. [Score: 0.910] Positive comment_0"));
        assert!(text.contains("great video!"));
        assert!(text.contains("Sentiment distribution"));
        assert!(text.contains("(50.0%)"));
    }

    #[test]
    fn test_json_results_roundtrip_fields() {
        let json = JsonFormatter::new(false).format_search_results(&sample_results());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["results"][0]["id"], "comment_0");
        assert_eq!(value["distribution"]["counts"][1]["label"], "Neutral");
        assert_eq!(value["labels"]["kind"], "any");
    }

    #[test]
    fn test_markdown_empty_results() {
        let mut results = sample_results();
        results.results.clear();
        let md = MarkdownFormatter.format_search_results(&results);
        assert!(md.starts_with("## No results found"));
    }

    #[test]
    fn test_error_with_hint() {
        let text = TextFormatter.format_error("the index is empty", Some("Build it"));
        assert_eq!(text, "Error: the index is empty\nHint: Build it\n");

        let json = JsonFormatter::new(false).format_error("boom", None);
        assert_eq!(json, r#"{"error":"boom","hint":null}"#);
    }

    #[test]
    fn test_corpus_overview_percentages() {
        let overview = CorpusOverview {
            source: None,
            rows: 4,
            skipped: 1,
            distribution: LabelDistribution {
                counts: vec![
                    LabelCount {
                        label: "Positive".into(),
                        count: 3,
                    },
                    LabelCount {
                        label: "Negative".into(),
                        count: 1,
                    },
                ],
            },
        };

        let json = JsonFormatter::new(false).format_corpus_overview(&overview);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["labels"][0]["percentage"], 75.0);

        let md = MarkdownFormatter.format_corpus_overview(&overview);
        assert!(md.contains("| Negative | 1 | 25.0% |"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(PREVIEW_CHARS + 10);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
