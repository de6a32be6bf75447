//! Reachability probes feeding the connectivity monitor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{ConnectivityMonitor, ConnectivityStatus};
use crate::error::{Error, Result};
use crate::sync::protocol::HEALTH_PATH;
use crate::util::normalize_base_url;

/// Boxed future returned by probes
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ConnectivityStatus> + Send + 'a>>;

/// A source of connectivity signals.
///
/// Implementations never fail; an unreachable target is `Offline`.
pub trait ConnectivityProbe: Send + Sync {
    fn check(&self) -> ProbeFuture<'_>;
}

/// Probe that treats a successful `GET {base}/healthz` as Online
#[derive(Clone)]
pub struct HttpHealthProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url).map_err(Error::InvalidInput)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::InvalidInput(format!("HTTP client setup failed: {error}")))?;
        Ok(Self {
            url: format!("{base_url}{HEALTH_PATH}"),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ConnectivityProbe for HttpHealthProbe {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            match self.client.get(&self.url).send().await {
                Ok(response) if response.status().is_success() => ConnectivityStatus::Online,
                Ok(response) => {
                    tracing::debug!("Health check returned HTTP {}", response.status());
                    ConnectivityStatus::Offline
                }
                Err(error) => {
                    tracing::debug!("Health check failed: {error}");
                    ConnectivityStatus::Offline
                }
            }
        })
    }
}

/// Poll `probe` every `interval` and feed the result into `monitor`.
///
/// The first check runs immediately. The task runs until aborted.
pub fn spawn_probe(
    monitor: ConnectivityMonitor,
    probe: Arc<dyn ConnectivityProbe>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let status = probe.check().await;
            monitor.set_status(status);
        }
    })
}
