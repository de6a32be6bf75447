use ruraliq_core::config::ClientConfig;

use crate::commands::common::{open_store, print_reports};
use crate::error::CliError;

pub async fn run_history(limit: usize, as_json: bool, config: &ClientConfig) -> Result<(), CliError> {
    let store = open_store(&config.db_path).await?;
    let reports = store.list_recent(limit).await?;
    print_reports(&reports, as_json, "No reports captured yet.")
}
