use std::sync::Arc;

use ruraliq_core::config::ClientConfig;
use ruraliq_core::connectivity::{spawn_probe, HttpHealthProbe};
use ruraliq_core::ConnectivityStatus;

use crate::commands::common::Session;
use crate::error::CliError;

/// Probe the server until Ctrl-C, flushing on every reconnect.
///
/// The monitor starts Offline so the first successful probe drains anything
/// left over from earlier runs.
pub async fn run_watch(config: ClientConfig) -> Result<(), CliError> {
    let probe = HttpHealthProbe::new(&config.api_base_url, config.request_timeout)?;
    let interval = config.probe_interval;
    let session = Session::open(config, ConnectivityStatus::Offline).await?;
    let monitor = session.coordinator.monitor().clone();

    let _auto_flush = session.coordinator.attach(&monitor)?;
    let _announce = monitor.on_transition(|transition| {
        println!("{} -> {}", transition.from, transition.to);
    });

    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        session.config.api_base_url,
        interval.as_secs()
    );
    let probe_task = spawn_probe(monitor, Arc::new(probe), interval);

    tokio::signal::ctrl_c().await?;
    probe_task.abort();

    let pending = session.store().count().await?;
    println!("Stopped; {pending} reports pending");
    Ok(())
}
