use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{CorpusOverview, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::count_labels;
use crate::sources::load_corpus;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// CSV file to summarize instead of the configured candidates
    #[arg(long)]
    pub file: Option<PathBuf>,
}

pub async fn handle_stats(args: StatsArgs, format: OutputFormat) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let corpus = load_corpus(&config.corpus, args.file.as_deref())
        .context("failed to load comment corpus")?;

    let overview = CorpusOverview {
        source: corpus.source.clone(),
        rows: corpus.len(),
        skipped: corpus.stats.skipped,
        distribution: count_labels(corpus.labels()),
    };

    print!("{}", formatter.format_corpus_overview(&overview));
    Ok(())
}
