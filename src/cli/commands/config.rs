use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create global config instead of project config"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let (scope, path) = if global {
        ("global", Config::global_path())
    } else {
        ("project", Config::project_path())
    };
    let path = path.ok_or_else(|| anyhow::anyhow!("could not determine {scope} config path"))?;

    if path.exists() && !force {
        anyhow::bail!(
            "{} config already exists at: {}\nUse --force to overwrite.",
            scope,
            path.display()
        );
    }

    Config::default()
        .save_to(&path)
        .with_context(|| format!("failed to create {scope} config"))?;

    println!(
        "{}",
        formatter.format_message(&format!("Created {} config at: {}", scope, path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let resolved = Config::load()?;

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "config": resolved.config,
            "source": resolved.source.to_string(),
            "path": resolved.path,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match resolved.path {
        Some(ref path) => println!("# Loaded from {} config: {}", resolved.source, path.display()),
        None => println!("# No config file found, using defaults"),
    }
    println!(
        "# Socket: {}",
        resolved.config.socket_path().display()
    );
    println!(
        "# Store:  {}",
        resolved.config.vector_store.store_dir().display()
    );
    println!();
    print!("{}", toml::to_string_pretty(&resolved.config)?);

    Ok(())
}

fn handle_path() -> Result<()> {
    let resolved = Config::load()?;

    println!("Configuration paths:");
    println!();

    for (label, path) in [
        ("Project", Config::project_path()),
        ("Global", Config::global_path()),
    ] {
        let Some(path) = path else { continue };
        let state = if resolved.path.as_ref() == Some(&path) {
            "active"
        } else if path.exists() {
            "shadowed"
        } else {
            "would be"
        };
        println!("{label} config ({state}): {}", path.display());
    }

    if let Some(dir) = Config::models_dir() {
        println!("Models directory: {}", dir.display());
    }

    Ok(())
}
