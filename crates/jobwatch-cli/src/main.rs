//! jobwatch: start, watch and resume remote training jobs from the terminal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use jobwatch::MonitorConfig;

mod commands;
mod display;

/// Watch remote training jobs
#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(about = "Start, watch and resume remote training jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "JOBWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the job service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start training a model and watch its progress
    ///
    /// Ctrl-C stops watching but leaves the job registered, so
    /// `jobwatch resume` picks it up again.
    Train {
        /// Ticker symbol to train on
        ticker: String,

        /// Start the job and exit without watching
        #[arg(long)]
        detach: bool,
    },

    /// Resume watching the job left by an earlier run
    Resume,

    /// Show the registered job and query its status once
    Status,

    /// Stop monitoring the registered job
    ///
    /// The job is not aborted on the service; only local tracking ends.
    Cancel,

    /// List trained models
    Models,
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    jobwatch::logging::init_logging(log_filter(cli.verbose));

    let mut config =
        MonitorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
        config.validate().context("Invalid --base-url")?;
    }
    tracing::debug!(
        base_url = %config.base_url,
        registry = %config.registry_dir().display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Train { ticker, detach } => {
            commands::train::execute(&config, &ticker, detach).await
        },
        Commands::Resume => commands::resume::execute(&config).await,
        Commands::Status => commands::status::execute(&config).await,
        Commands::Cancel => commands::cancel::execute(&config).await,
        Commands::Models => commands::models::execute(&config).await,
    }
}
