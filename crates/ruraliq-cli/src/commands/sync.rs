use ruraliq_core::config::ClientConfig;
use ruraliq_core::{FlushReport, FlushStatus};

use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_sync(config: ClientConfig) -> Result<FlushReport, CliError> {
    let session = Session::open_probed(config).await?;
    let report = session.coordinator.flush().await?;

    match &report.status {
        FlushStatus::NothingPending => println!("Nothing to sync"),
        FlushStatus::Completed => println!(
            "Synced {}, failed {}, pending {}",
            report.synced_count, report.failed_count, report.pending_count
        ),
        FlushStatus::Offline => {
            return Err(CliError::SyncFailed(format!(
                "server {} is unreachable; {} reports pending",
                session.config.api_base_url, report.pending_count
            )));
        }
        FlushStatus::NetworkError(message) | FlushStatus::Rejected(message) => {
            return Err(CliError::SyncFailed(message.clone()));
        }
    }

    Ok(report)
}
