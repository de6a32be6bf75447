//! Moves reports from the local queue to the ingestion server.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use super::protocol::ItemVerdict;
use super::transport::{HttpReportTransport, ReportTransport, TransportError};
use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus, Subscription};
use crate::error::{Error, Result};
use crate::models::{ClientId, Report};
use crate::store::LocalReportStore;

/// What happened to a report handed to [`SyncCoordinator::submit_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted by the server immediately; never stored locally
    Delivered { server_id: String },
    /// Persisted locally as pending
    Queued { client_id: ClientId },
}

/// Overall result of one flush cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FlushStatus {
    /// The batch call returned and verdicts were applied
    Completed,
    NothingPending,
    /// Skipped because the monitor reports Offline
    Offline,
    /// Batch aborted before verdicts arrived; nothing was marked
    NetworkError(String),
    /// Server refused the whole batch; nothing was marked
    Rejected(String),
}

impl fmt::Display for FlushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::NothingPending => f.write_str("nothing pending"),
            Self::Offline => f.write_str("offline"),
            Self::NetworkError(message) => write!(f, "network error: {message}"),
            Self::Rejected(message) => write!(f, "rejected: {message}"),
        }
    }
}

/// Counts for one flush cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Reports marked synced by this flush
    pub synced_count: usize,
    /// Snapshot reports left pending
    pub failed_count: usize,
    /// Pending reports in the store once the flush finished
    pub pending_count: usize,
    pub status: FlushStatus,
}

impl FlushReport {
    const fn untouched(status: FlushStatus, snapshot_len: usize, pending_count: usize) -> Self {
        Self {
            synced_count: 0,
            failed_count: snapshot_len,
            pending_count,
            status,
        }
    }

    /// Whether the batch failed to reach the server or was refused
    pub const fn is_failure(&self) -> bool {
        matches!(
            self.status,
            FlushStatus::NetworkError(_) | FlushStatus::Rejected(_)
        )
    }
}

#[derive(Default)]
struct FlushState {
    completed: u64,
    last: Option<FlushReport>,
}

struct Inner<T> {
    store: LocalReportStore,
    monitor: ConnectivityMonitor,
    transport: T,
    flush_gate: tokio::sync::Mutex<()>,
    flush_state: Mutex<FlushState>,
}

/// Decides between direct delivery and queueing, and drains the queue.
///
/// Cloning is cheap; clones share the in-flight flush guard.
pub struct SyncCoordinator<T = HttpReportTransport> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SyncCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ReportTransport + 'static> SyncCoordinator<T> {
    pub fn new(store: LocalReportStore, monitor: ConnectivityMonitor, transport: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                monitor,
                transport,
                flush_gate: tokio::sync::Mutex::new(()),
                flush_state: Mutex::new(FlushState::default()),
            }),
        }
    }

    pub fn store(&self) -> &LocalReportStore {
        &self.inner.store
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.inner.monitor
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Deliver a freshly captured report, or queue it when that is not possible.
    ///
    /// Online: one direct submission. A network failure marks the monitor
    /// Offline and queues the report. A rejection is returned to the caller.
    /// Offline: the report is queued without touching the network.
    pub async fn submit_report(&self, report: &Report) -> Result<SubmitOutcome> {
        if !self.inner.monitor.is_online() {
            return self.queue(report).await;
        }

        match self.inner.transport.submit_report(report).await {
            Ok(server_id) => {
                tracing::info!(client_id = %report.client_id, %server_id, "Report delivered directly");
                Ok(SubmitOutcome::Delivered { server_id })
            }
            Err(error) if error.is_retryable() => {
                tracing::warn!(
                    client_id = %report.client_id,
                    "Direct submission failed, queueing report: {error}"
                );
                self.inner.monitor.set_status(ConnectivityStatus::Offline);
                self.queue(report).await
            }
            Err(error) => {
                tracing::warn!(client_id = %report.client_id, "Report rejected: {error}");
                Err(error.into())
            }
        }
    }

    /// Submit every pending report in one batch and apply the verdicts.
    ///
    /// A flush requested while another is running waits for it and returns
    /// its result instead of sending a second batch.
    pub async fn flush(&self) -> Result<FlushReport> {
        let observed = self.flush_state().completed;

        let _gate = match self.inner.flush_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                tracing::debug!("Flush already in flight, waiting for it");
                let gate = self.inner.flush_gate.lock().await;
                let finished = {
                    let state = self.flush_state();
                    if state.completed > observed {
                        state.last.clone()
                    } else {
                        None
                    }
                };
                if let Some(report) = finished {
                    return Ok(report);
                }
                gate
            }
        };

        let result = self.run_flush().await;

        let mut state = self.flush_state();
        state.completed += 1;
        state.last = result.as_ref().ok().cloned();
        drop(state);

        result
    }

    /// Flush automatically on every Offline→Online edge of `monitor`.
    ///
    /// Must be called from within a tokio runtime; flushes are spawned on it.
    /// Dropping the returned subscription stops automatic flushing.
    pub fn attach(&self, monitor: &ConnectivityMonitor) -> Result<Subscription> {
        let handle = tokio::runtime::Handle::try_current().map_err(|error| {
            Error::InvalidInput(format!("automatic flush needs a tokio runtime: {error}"))
        })?;
        let inner: Weak<Inner<T>> = Arc::downgrade(&self.inner);

        Ok(monitor.on_transition(move |transition| {
            if !transition.is_reconnect() {
                return;
            }
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let coordinator = Self { inner };
            handle.spawn(async move {
                match coordinator.flush().await {
                    Ok(report) => tracing::info!(
                        synced = report.synced_count,
                        failed = report.failed_count,
                        "Reconnect flush finished: {}",
                        report.status
                    ),
                    Err(error) => tracing::warn!("Reconnect flush failed: {error}"),
                }
            });
        }))
    }

    async fn queue(&self, report: &Report) -> Result<SubmitOutcome> {
        let client_id = self.inner.store.enqueue(report).await?;
        Ok(SubmitOutcome::Queued { client_id })
    }

    async fn run_flush(&self) -> Result<FlushReport> {
        let store = &self.inner.store;

        if !self.inner.monitor.is_online() {
            let pending = store.count().await?;
            tracing::debug!(pending, "Skipping flush while offline");
            return Ok(FlushReport::untouched(FlushStatus::Offline, 0, pending));
        }

        let snapshot = store.list_pending().await?;
        if snapshot.is_empty() {
            return Ok(FlushReport::untouched(FlushStatus::NothingPending, 0, 0));
        }

        tracing::info!("Flushing {} pending reports", snapshot.len());
        let verdicts = match self.inner.transport.submit_batch(&snapshot).await {
            Ok(verdicts) => verdicts,
            Err(error) => {
                tracing::warn!("Batch sync aborted: {error}");
                let status = match error {
                    TransportError::Rejected { .. } => FlushStatus::Rejected(error.to_string()),
                    other => FlushStatus::NetworkError(other.to_string()),
                };
                return Ok(FlushReport::untouched(
                    status,
                    snapshot.len(),
                    snapshot.len(),
                ));
            }
        };

        let acknowledged = acknowledged_ids(&snapshot, &verdicts);
        if !acknowledged.is_empty() {
            store.mark_synced(&acknowledged).await?;
        }

        let report = FlushReport {
            synced_count: acknowledged.len(),
            failed_count: snapshot.len() - acknowledged.len(),
            pending_count: store.count().await?,
            status: FlushStatus::Completed,
        };
        tracing::info!(
            synced = report.synced_count,
            failed = report.failed_count,
            pending = report.pending_count,
            "Batch sync completed"
        );
        Ok(report)
    }

    fn flush_state(&self) -> std::sync::MutexGuard<'_, FlushState> {
        self.inner
            .flush_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Snapshot ids the server acknowledged, in snapshot order.
///
/// Verdicts for ids outside the snapshot are ignored; snapshot ids without a
/// verdict count as not acknowledged.
fn acknowledged_ids(snapshot: &[Report], verdicts: &[ItemVerdict]) -> Vec<ClientId> {
    let mut acked: HashMap<&str, bool> = snapshot
        .iter()
        .map(|report| (report.client_id.as_str(), false))
        .collect();

    for verdict in verdicts {
        let Some(client_id) = verdict.client_id.as_deref() else {
            continue;
        };
        match acked.get_mut(client_id) {
            Some(flag) if verdict.status.is_acknowledged() => *flag = true,
            Some(_) => tracing::debug!(
                client_id,
                status = ?verdict.status,
                "Server did not accept report: {}",
                verdict.error.as_deref().unwrap_or("no reason given")
            ),
            None => tracing::debug!(client_id, "Ignoring verdict for report outside this batch"),
        }
    }

    snapshot
        .iter()
        .filter(|report| acked.get(report.client_id.as_str()).copied().unwrap_or(false))
        .map(|report| report.client_id.clone())
        .collect()
}
