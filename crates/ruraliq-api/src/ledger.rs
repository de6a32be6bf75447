//! In-memory record of ingested reports, keyed by client id.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// A report as received by the server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingReport {
    pub client_id: String,
    pub village_id: String,
    pub description: String,
    pub gps_lat: Option<f64>,
    pub gps_long: Option<f64>,
    pub captured_at: Option<DateTime<Utc>>,
    pub image: Option<ImageInfo>,
}

/// Metadata of an uploaded photo; the bytes are not retained
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReport {
    pub id: String,
    #[serde(flatten)]
    pub report: IncomingReport,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Created(String),
    /// Already held under the same client id
    Duplicate(String),
}

impl IngestOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Created(id) | Self::Duplicate(id) => id,
        }
    }
}

#[derive(Default)]
struct LedgerState {
    by_client_id: HashMap<String, usize>,
    records: Vec<StoredReport>,
}

#[derive(Clone, Default)]
pub struct ReportLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl ReportLedger {
    /// Validate and store a report. Resubmitting a client id never creates a
    /// second record.
    pub async fn ingest(&self, report: IncomingReport) -> Result<IngestOutcome, String> {
        validate(&report)?;

        let mut state = self.state.lock().await;
        if let Some(&index) = state.by_client_id.get(&report.client_id) {
            return Ok(IngestOutcome::Duplicate(state.records[index].id.clone()));
        }

        let id = uuid::Uuid::now_v7().to_string();
        let index = state.records.len();
        state.by_client_id.insert(report.client_id.clone(), index);
        state.records.push(StoredReport {
            id: id.clone(),
            report,
            received_at: Utc::now(),
        });
        Ok(IngestOutcome::Created(id))
    }

    /// Most recent `limit` reports in ingestion order
    pub async fn recent(&self, limit: usize) -> Vec<StoredReport> {
        let state = self.state.lock().await;
        let skip = state.records.len().saturating_sub(limit);
        state.records[skip..].to_vec()
    }

    pub async fn count(&self) -> usize {
        self.state.lock().await.records.len()
    }
}

fn validate(report: &IncomingReport) -> Result<(), String> {
    if report.client_id.trim().is_empty() {
        return Err("client_id is required".to_string());
    }
    if report.village_id.trim().is_empty() {
        return Err("village_id is required".to_string());
    }
    if report.description.trim().is_empty() {
        return Err("description must not be empty".to_string());
    }
    match (report.gps_lat, report.gps_long) {
        (None, None) => Ok(()),
        (Some(lat), Some(long)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&long) {
                Err("coordinates out of range".to_string())
            } else {
                Ok(())
            }
        }
        _ => Err("gps_lat and gps_long must be provided together".to_string()),
    }
}
