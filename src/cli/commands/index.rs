//! Index command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::output::get_formatter;
use crate::error::IndexError;
use crate::models::{Config, OutputFormat};
use crate::services::{IndexBuilder, registry};
use crate::sources::load_corpus;

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// Rebuild the index from the comment CSV
    Build {
        /// CSV file to index instead of the configured candidates
        #[arg(long)]
        file: Option<PathBuf>,

        /// Comments embedded per batch
        #[arg(long, short = 'b')]
        batch_size: Option<u32>,
    },

    /// Clear all indexed comments
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },
}

pub async fn handle_index(
    cmd: IndexCommand,
    format: OutputFormat,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    match cmd {
        IndexCommand::Build { file, batch_size } => {
            handle_build(file, batch_size, format, cancel).await
        }
        IndexCommand::Clear { force } => handle_clear(force, format).await,
    }
}

async fn handle_build(
    file: Option<PathBuf>,
    batch_size: Option<u32>,
    format: OutputFormat,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let corpus =
        load_corpus(&config.corpus, file.as_deref()).context("failed to load comment corpus")?;
    let batch_size = batch_size.unwrap_or(config.indexing.batch_size) as usize;

    let store = registry::store(&config.vector_store).context("failed to open vector store")?;
    let builder = IndexBuilder::new(registry::embedder(&config), store).with_cancel(cancel);

    let pb = if format == OutputFormat::Text {
        ProgressBar::new(corpus.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )?
            .progress_chars("#>-"),
    );
    pb.set_message("embedding comments");

    let result = builder
        .rebuild(&corpus, batch_size, |progress| {
            pb.set_position(progress.processed as u64);
        })
        .await;

    match result {
        Ok(stats) => {
            pb.finish_and_clear();
            print!("{}", formatter.format_rebuild_stats(&stats));
            Ok(())
        }
        Err(IndexError::Interrupted { committed }) => {
            pb.abandon();
            info!(committed, "index build interrupted");
            print!(
                "{}",
                formatter.format_error(
                    &format!("interrupted after indexing {committed} of {} comments", corpus.len()),
                    Some("Run `csearch index build` again to rebuild the full index"),
                )
            );
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            Err(e).context("index build failed")
        }
    }
}

async fn handle_clear(force: bool, format: OutputFormat) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    if !force {
        println!(
            "This will delete ALL indexed comments in '{}'. Continue? [y/N]",
            config.vector_store.collection
        );
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.format_message("Cancelled."));
            return Ok(());
        }
    }

    let store = registry::store(&config.vector_store).context("failed to open vector store")?;
    store.write().await.clear()?;

    println!(
        "{}",
        formatter.format_message("All indexed comments have been cleared.")
    );

    Ok(())
}
