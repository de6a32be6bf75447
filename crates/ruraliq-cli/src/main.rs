//! RuralIQ CLI - field report capture from the command line
//!
//! Reports are sent straight to the ingestion server when it is reachable and
//! queued locally otherwise; `ruraliq sync` or `ruraliq watch` drains the queue.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::capture::{run_capture, CaptureArgs};
use crate::commands::common::resolve_config;
use crate::commands::history::run_history;
use crate::commands::pending::run_pending;
use crate::commands::prune::run_prune;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "ruraliq=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.db_path, cli.api_url.as_deref())?;

    match cli.command {
        Commands::Capture {
            village,
            lat,
            long,
            image,
            description,
        } => {
            let args = CaptureArgs {
                village,
                lat,
                long,
                image,
                description,
            };
            run_capture(args, config).await?;
        }
        Commands::Pending { json } => run_pending(json, &config).await?,
        Commands::History { limit, json } => run_history(limit, json, &config).await?,
        Commands::Sync => {
            run_sync(config).await?;
        }
        Commands::Status => run_status(&config).await?,
        Commands::Prune { older_than_days } => {
            run_prune(older_than_days, &config).await?;
        }
        Commands::Watch => run_watch(config).await?,
    }

    Ok(())
}
