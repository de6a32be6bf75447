use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ruraliq")]
#[command(about = "Capture village infrastructure reports, online or off")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local report database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Ingestion server base URL (overrides RURALIQ_API_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a report; sends it now when online, queues it otherwise
    #[command(alias = "report")]
    Capture {
        /// Village identifier
        #[arg(long, value_name = "ID")]
        village: String,
        /// Latitude in degrees
        #[arg(long, requires = "long", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude in degrees
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        long: Option<f64>,
        /// Photo to attach
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// What was observed
        #[arg(required = true, trailing_var_arg = true)]
        description: Vec<String>,
    },
    /// List reports waiting to be synced
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent reports of every status
    History {
        /// Number of reports to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send all pending reports to the server
    Sync,
    /// Show server reachability and queue size
    Status,
    /// Delete synced reports older than the given age
    Prune {
        /// Minimum age in days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
    },
    /// Watch connectivity and sync automatically on reconnect
    Watch,
}
