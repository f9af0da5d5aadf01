//! CLI module for the comment search CLI.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Semantic search over a sentiment-labelled comment dataset.
#[derive(Debug, Parser)]
#[command(name = "csearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check embedding daemon and index status
    Status,

    /// Build or clear the search index
    #[command(subcommand)]
    Index(commands::IndexCommand),

    /// Search comments by meaning
    Search(commands::SearchArgs),

    /// Show dataset size and sentiment distribution
    Stats(commands::StatsArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Manage the embedding daemon
    Serve(commands::ServeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::IndexCommand;

    #[test]
    fn test_parse_search_with_labels() {
        let cli = Cli::try_parse_from([
            "csearch", "search", "funny", "-n", "5", "-l", "Positive", "-l", "Neutral", "-f",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "funny");
                assert_eq!(args.limit, Some(5));
                assert_eq!(args.labels, vec!["Positive", "Neutral"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_index_build() {
        let cli =
            Cli::try_parse_from(["csearch", "index", "build", "--file", "data.csv", "-b", "50"])
                .unwrap();
        match cli.command {
            Commands::Index(IndexCommand::Build { file, batch_size }) => {
                assert_eq!(file.unwrap().to_str(), Some("data.csv"));
                assert_eq!(batch_size, Some(50));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
