use ruraliq_core::config::ClientConfig;

use crate::commands::common::{open_store, probe_once};
use crate::error::CliError;

pub async fn run_status(config: &ClientConfig) -> Result<(), CliError> {
    let status = probe_once(config).await?;
    let store = open_store(&config.db_path).await?;
    let pending = store.count().await?;

    println!("Server:   {} ({status})", config.api_base_url);
    println!("Database: {}", config.db_path.display());
    println!("Pending:  {pending}");
    Ok(())
}
