//! Markdown Curator CLI
//!
//! # Usage
//!
//! ```bash
//! # Update every query block in a vault once
//! markdown-curator --vault ~/notes once
//!
//! # Keep the vault up to date while it is being edited
//! markdown-curator --config curator.yaml daemon
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use curator_core::{Curator, CuratorConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "markdown-curator")]
#[command(about = "Keeps generated query blocks in a Markdown vault up to date", long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Vault root; overrides the configuration file
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single pass over the whole vault and exit
    Once,

    /// Run a full pass, then watch the vault and process every change
    Daemon,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let builder = Curator::builder(config);

    match cli.command {
        Commands::Once => {
            let mut curator = builder.build().context("Failed to start curator")?;
            let report = curator.run_once();
            info!(
                "Evaluated {} queries, wrote {} documents ({} skipped, {} failed)",
                report.evaluated,
                report.commit.written.len(),
                report.commit.skipped.len(),
                report.commit.failed.len()
            );
        }
        Commands::Daemon => {
            let curator = builder.build().context("Failed to start curator")?;
            curator.run_daemon().context("Curator stopped")?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<CuratorConfig> {
    let mut config = match &cli.config {
        Some(path) => CuratorConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => CuratorConfig::default(),
    };
    if let Some(vault) = &cli.vault {
        config.vault = Some(vault.clone());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
