//! Wire format shared by the client transport and the ingestion server.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Report;

/// Path of the single-report endpoint
pub const REPORTS_PATH: &str = "/api/reports";
/// Path of the batch sync endpoint
pub const SYNC_REPORTS_PATH: &str = "/api/sync/reports";
/// Path of the health endpoint used by connectivity probes
pub const HEALTH_PATH: &str = "/healthz";

/// One report inside a batch sync request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub client_id: String,
    pub village_id: String,
    pub description: String,
    #[serde(default)]
    pub gps_lat: Option<f64>,
    #[serde(default)]
    pub gps_long: Option<f64>,
    /// Capture time
    pub timestamp: DateTime<Utc>,
}

impl From<&Report> for BatchItem {
    fn from(report: &Report) -> Self {
        Self {
            client_id: report.client_id.to_string(),
            village_id: report.village_id.clone(),
            description: report.description.clone(),
            gps_lat: report.location.map(|point| point.latitude),
            gps_long: report.location.map(|point| point.longitude),
            timestamp: capture_time(report.captured_at),
        }
    }
}

/// Server outcome for one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    /// Ingested by this request
    Success,
    /// Already ingested earlier under the same client id
    Duplicate,
    /// Not ingested; the client keeps the report pending
    #[serde(alias = "failure")]
    Error,
    #[serde(other)]
    Unknown,
}

impl VerdictStatus {
    /// Whether the server now holds the report
    pub const fn is_acknowledged(self) -> bool {
        matches!(self, Self::Success | Self::Duplicate)
    }
}

/// Per-item verdict, keyed by client id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVerdict {
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: VerdictStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemVerdict {
    pub fn success(client_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            id: Some(id.into()),
            status: VerdictStatus::Success,
            error: None,
        }
    }

    pub fn duplicate(client_id: impl Into<String>, id: Option<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            id,
            status: VerdictStatus::Duplicate,
            error: None,
        }
    }

    pub fn error(client_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            client_id,
            id: None,
            status: VerdictStatus::Error,
            error: Some(reason.into()),
        }
    }
}

/// Batch sync response body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    pub processed: Vec<ItemVerdict>,
}

/// Single-report submission response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Capture timestamp (Unix ms) as a UTC date-time
pub fn capture_time(captured_at_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(captured_at_ms)
        .single()
        .unwrap_or_default()
}
