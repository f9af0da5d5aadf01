use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use comment_search::cli::commands::{
    handle_config, handle_index, handle_search, handle_serve, handle_stats, handle_status,
};
use comment_search::cli::{Cli, Commands};
use comment_search::models::{Config, OutputFormat};

const LOG_ENV: &str = "CSEARCH_LOG";

/// Detect ONNX Runtime library path and set ORT_DYLIB_PATH if not already set.
/// Must be called before any ort code runs.
fn detect_and_set_ort_path() {
    if std::env::var("ORT_DYLIB_PATH")
        .map(|p| Path::new(&p).exists())
        .unwrap_or(false)
    {
        return;
    }

    let home = std::env::var("HOME").unwrap_or_default();

    let found = if cfg!(target_os = "macos") {
        [
            format!("{home}/.local/lib/comment-search/libonnxruntime.dylib"),
            "/opt/homebrew/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
            "/usr/local/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
        ]
        .into_iter()
        .find(|p| Path::new(p).exists())
    } else if cfg!(target_os = "linux") {
        [
            format!("{home}/.local/lib/comment-search/libonnxruntime.so"),
            "/usr/lib/libonnxruntime.so".into(),
            "/usr/local/lib/libonnxruntime.so".into(),
            "/usr/lib/x86_64-linux-gnu/libonnxruntime.so".into(),
            "/usr/lib/aarch64-linux-gnu/libonnxruntime.so".into(),
        ]
        .into_iter()
        .find(|p| Path::new(p).exists())
    } else {
        None
    };

    if let Some(path) = found {
        // SAFETY: Called at program start before any threads are spawned.
        unsafe {
            std::env::set_var("ORT_DYLIB_PATH", path);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    detect_and_set_ort_path();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let resolved = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "falling back to default config");
        Default::default()
    });
    let format = cli.format.unwrap_or(resolved.config.search.default_format);
    let verbose = cli.verbose;

    // The daemon handles its own signals so it can remove its socket.
    if let Commands::Serve(args) = cli.command {
        return handle_serve(args).await;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let graceful = matches!(cli.command, Commands::Index(_));

    tokio::select! {
        result = run_command(cli.command, format, verbose, cancel.clone()) => {
            result?;
        }
        _ = shutdown_signal(cancel, graceful) => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    format: OutputFormat,
    verbose: bool,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    match command {
        Commands::Status => handle_status(format).await,
        Commands::Index(cmd) => handle_index(cmd, format, cancel).await,
        Commands::Search(args) => handle_search(args, format, verbose).await,
        Commands::Stats(args) => handle_stats(args, format).await,
        Commands::Config(cmd) => handle_config(cmd, format).await,
        Commands::Serve(args) => handle_serve(args).await,
    }
}

/// Resolves when the process should stop.
///
/// With `graceful` set the first signal only raises `cancel`, giving a
/// running rebuild the chance to finish its current batch; a second
/// signal aborts.
async fn shutdown_signal(cancel: Arc<AtomicBool>, graceful: bool) {
    wait_for_signal().await;
    if !graceful {
        return;
    }

    cancel.store(true, Ordering::SeqCst);
    eprintln!("\nStopping after current batch (Ctrl-C again to abort)");
    wait_for_signal().await;
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
