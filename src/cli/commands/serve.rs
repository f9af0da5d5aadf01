use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use crate::client::{DaemonClient, spawn_daemon, stop_daemon};
use crate::error::DaemonError;
use crate::models::Config;
use crate::server::run_daemon;

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(subcommand)]
    pub command: Option<ServeCommand>,

    #[arg(long, hide = true)]
    pub daemon: bool,

    /// Run the daemon attached to this terminal
    #[arg(long)]
    pub foreground: bool,
}

#[derive(Debug, Subcommand)]
pub enum ServeCommand {
    /// Stop the running daemon
    Stop,
    /// Stop the daemon and start it again
    Restart,
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let config = Config::load()?.config;

    if args.daemon || args.foreground {
        if args.foreground {
            info!("starting daemon in foreground");
        }
        return run_daemon(config).await;
    }

    match args.command {
        Some(ServeCommand::Stop) => handle_stop(&config),
        Some(ServeCommand::Restart) => handle_restart(&config).await,
        None => handle_start(&config),
    }
}

fn handle_start(config: &Config) -> Result<()> {
    let client = DaemonClient::new(config);

    if client.is_running() {
        println!("Daemon is already running");
        return Ok(());
    }

    spawn_daemon()?;

    println!("Daemon started");
    println!("Socket: {}", config.socket_path().display());
    Ok(())
}

fn handle_stop(config: &Config) -> Result<()> {
    match stop_daemon(config) {
        Ok(()) => {
            println!("Daemon stopped");
            Ok(())
        }
        Err(DaemonError::NotRunning) => {
            println!("Daemon is not running");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_restart(config: &Config) -> Result<()> {
    let client = DaemonClient::new(config);
    if client.is_running() && client.shutdown().await.is_err() {
        let _ = stop_daemon(config);
    }
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    handle_start(config)
}
