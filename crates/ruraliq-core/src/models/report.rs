//! Report model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Client-generated idempotency key for a report.
///
/// Fresh ids are UUID v7 strings (time-sortable). Ids received from elsewhere
/// are kept verbatim; the only requirement is that they are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a new unique client id using UUID v7
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("client id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Synchronization status of a locally captured report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Captured locally, not yet acknowledged by the server
    Pending,
    /// Acknowledged by the server (terminal)
    Synced,
}

impl SyncStatus {
    /// Storage representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            other => Err(Error::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// GPS coordinates attached to a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point, rejecting out-of-range or non-finite coordinates
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude must be within [-90, 90], got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude must be within [-180, 180], got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// User input for a report before it is captured
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportDraft {
    pub village_id: String,
    pub description: String,
    pub location: Option<GeoPoint>,
    /// Local path of an attached photo
    pub image: Option<String>,
}

impl ReportDraft {
    /// Start a draft for the given village
    pub fn new(village_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            village_id: village_id.into(),
            description: description.into(),
            location: None,
            image: None,
        }
    }

    #[must_use]
    pub const fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Capture the draft as a new report with a freshly generated client id
    pub fn capture(self) -> Result<Report> {
        self.capture_with_id(ClientId::generate())
    }

    /// Capture the draft under a caller-supplied client id
    pub fn capture_with_id(self, client_id: ClientId) -> Result<Report> {
        let village_id = self.village_id.trim().to_string();
        if village_id.is_empty() {
            return Err(Error::InvalidInput("village id cannot be empty".into()));
        }
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(Error::InvalidInput(
                "report description cannot be empty".into(),
            ));
        }
        let image = self
            .image
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty());

        Ok(Report {
            client_id,
            village_id,
            description,
            location: self.location,
            image,
            captured_at: chrono::Utc::now().timestamp_millis(),
            sync_status: SyncStatus::Pending,
            synced_at: None,
        })
    }
}

/// A field report about a village infrastructure issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Idempotency key, assigned once at capture
    pub client_id: ClientId,
    /// Target village (owned by the village registry)
    pub village_id: String,
    /// Free-text observation
    pub description: String,
    pub location: Option<GeoPoint>,
    /// Local path of an attached photo
    pub image: Option<String>,
    /// Capture timestamp (Unix ms)
    pub captured_at: i64,
    pub sync_status: SyncStatus,
    /// When the server acknowledged the report (Unix ms)
    pub synced_at: Option<i64>,
}
