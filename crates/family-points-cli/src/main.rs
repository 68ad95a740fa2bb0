//! Family Points CLI - keeps the points document in sync with a private Gist
//!
//! The CLI owns the local document file and drives the startup download,
//! conflict-checked uploads and the manual pull/push actions.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::Paths;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::remote::run_remote;
use crate::commands::reset::run_reset;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

const DEFAULT_LOG_DIRECTIVE: &str = "family_points=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let paths = Paths::resolve(cli.data, cli.config)?;
    tracing::debug!(
        "Using data file {} and config {}",
        paths.data.display(),
        paths.config.display()
    );

    match cli.command {
        Commands::Config { command } => run_config(command, &paths).await,
        Commands::Remote { command } => run_remote(command, &paths).await,
        Commands::Sync { command } => run_sync(command, &paths).await,
        Commands::Watch {
            debounce_ms,
            poll_ms,
        } => run_watch(debounce_ms, poll_ms, &paths).await,
        Commands::Reset => run_reset(&paths),
        Commands::Completions { .. } => Ok(()),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
