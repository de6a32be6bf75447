use std::time::Duration;

use ruraliq_core::config::ClientConfig;

use crate::commands::common::open_store;
use crate::error::CliError;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

pub async fn run_prune(older_than_days: u64, config: &ClientConfig) -> Result<u64, CliError> {
    let store = open_store(&config.db_path).await?;
    let older_than = Duration::from_secs(older_than_days.saturating_mul(SECS_PER_DAY));
    let deleted = store.prune_synced(older_than).await?;
    println!("Pruned {deleted} synced reports");
    Ok(deleted)
}
