//! In-process ingestion server used by coordinator tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::protocol::ItemVerdict;
use super::transport::{ReportTransport, TransportError, TransportFuture};
use crate::models::Report;

/// Signals for pausing a batch call mid-flight
#[derive(Default)]
pub struct BatchHold {
    /// Notified once a held batch call has recorded its snapshot
    pub started: Notify,
    /// Notify to let the held call finish
    pub release: Notify,
}

#[derive(Default)]
struct MockState {
    network_down: bool,
    rejection: Option<(u16, String)>,
    drop_next_response: bool,
    failing: HashMap<String, String>,
    omitted: HashSet<String>,
    extra_verdicts: Vec<ItemVerdict>,
    ingested: HashMap<String, String>,
    batches: Vec<Vec<String>>,
    calls: usize,
    hold: Option<Arc<BatchHold>>,
}

/// Idempotent fake server keyed by client id
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn set_network_down(&self, down: bool) {
        self.state().network_down = down;
    }

    pub fn reject_with(&self, status: u16, message: &str) {
        self.state().rejection = Some((status, message.to_string()));
    }

    /// Ingest the next batch, then fail as if the response was lost
    pub fn drop_next_response(&self) {
        self.state().drop_next_response = true;
    }

    pub fn fail_item(&self, client_id: &str, reason: &str) {
        self.state()
            .failing
            .insert(client_id.to_string(), reason.to_string());
    }

    pub fn omit_item(&self, client_id: &str) {
        self.state().omitted.insert(client_id.to_string());
    }

    pub fn add_extra_verdict(&self, verdict: ItemVerdict) {
        self.state().extra_verdicts.push(verdict);
    }

    /// Pause every following batch call until released
    pub fn hold_batches(&self) -> Arc<BatchHold> {
        let hold = Arc::new(BatchHold::default());
        self.state().hold = Some(Arc::clone(&hold));
        hold
    }

    /// Client ids of every batch received, in arrival order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.state().batches.clone()
    }

    /// Number of reports the server holds
    pub fn ingested_count(&self) -> usize {
        self.state().ingested.len()
    }

    /// Number of calls of either kind
    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn check_reachable(state: &mut MockState) -> Result<(), TransportError> {
        state.calls += 1;
        if state.network_down {
            return Err(TransportError::Network("connection refused".to_string()));
        }
        if let Some((status, message)) = &state.rejection {
            return Err(TransportError::Rejected {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(())
    }

    fn ingest(state: &mut MockState, client_id: &str) -> (String, bool) {
        if let Some(id) = state.ingested.get(client_id) {
            return (id.clone(), false);
        }
        let id = (state.ingested.len() + 1).to_string();
        state.ingested.insert(client_id.to_string(), id.clone());
        (id, true)
    }
}

impl ReportTransport for MockTransport {
    fn submit_report<'a>(&'a self, report: &'a Report) -> TransportFuture<'a, String> {
        let result = {
            let mut state = self.state();
            Self::check_reachable(&mut state)
                .map(|()| Self::ingest(&mut state, report.client_id.as_str()).0)
        };
        Box::pin(async move { result })
    }

    fn submit_batch<'a>(&'a self, reports: &'a [Report]) -> TransportFuture<'a, Vec<ItemVerdict>> {
        Box::pin(async move {
            let hold = {
                let mut state = self.state();
                Self::check_reachable(&mut state)?;
                state.batches.push(
                    reports
                        .iter()
                        .map(|report| report.client_id.to_string())
                        .collect(),
                );
                state.hold.clone()
            };

            if let Some(hold) = hold {
                hold.started.notify_one();
                hold.release.notified().await;
            }

            let mut state = self.state();
            let mut verdicts = Vec::with_capacity(reports.len());
            for report in reports {
                let client_id = report.client_id.as_str();
                if let Some(reason) = state.failing.get(client_id).cloned() {
                    verdicts.push(ItemVerdict::error(Some(client_id.to_string()), reason));
                } else if state.omitted.contains(client_id) {
                    continue;
                } else {
                    let (id, fresh) = Self::ingest(&mut state, client_id);
                    verdicts.push(if fresh {
                        ItemVerdict::success(client_id, id)
                    } else {
                        ItemVerdict::duplicate(client_id, Some(id))
                    });
                }
            }
            verdicts.extend(state.extra_verdicts.iter().cloned());

            if std::mem::take(&mut state.drop_next_response) {
                return Err(TransportError::Network("connection reset".to_string()));
            }
            Ok(verdicts)
        })
    }
}
