use anyhow::Result;
use clap::Args;
use tracing::warn;

use crate::cli::output::get_formatter;
use crate::error::SearchError;
use crate::models::{Config, LabelFilter, OutputFormat, SearchQuery, SearchResults};
use crate::services::{QueryEngine, registry};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<u32>,

    #[arg(
        long = "label",
        short = 'l',
        help = "Only return comments with this sentiment (repeatable, 'All' for no filter)"
    )]
    pub labels: Vec<String>,

    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Minimum similarity score threshold (-1.0 to 1.0)"
    )]
    pub min_score: Option<f32>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let limit = args.limit.unwrap_or(config.search.default_limit);
    let min_score = args.min_score.or(config.search.default_min_score);
    if let Some(score) = min_score
        && !(-1.0..=1.0).contains(&score)
    {
        anyhow::bail!("min_score must be between -1.0 and 1.0");
    }

    let mut query = SearchQuery::new(args.query)
        .with_limit(limit)
        .with_labels(LabelFilter::from_selection(&args.labels));
    if let Some(score) = min_score {
        query = query.with_min_score(score);
    }

    if verbose {
        eprintln!("Query: \"{}\"", query.query.trim());
        eprintln!("  Limit: {}", query.limit);
        eprintln!("  Labels: {}", query.labels);
        if let Some(score) = query.min_score {
            eprintln!("  Min score: {score:.3}");
        }
    }

    match run_search(&config, &query).await {
        Ok(results) => print!("{}", formatter.format_search_results(&results)),
        Err(e) => {
            warn!(error = %e, recoverable = e.is_recoverable(), "search failed");
            print!("{}", formatter.format_error(&e.to_string(), e.hint()));
        }
    }

    Ok(())
}

async fn run_search(config: &Config, query: &SearchQuery) -> Result<SearchResults, SearchError> {
    let store = registry::store(&config.vector_store)?;
    let engine = QueryEngine::new(registry::embedder(config), store);
    engine.search(query).await
}
