//! Client configuration.
//!
//! Read from `RURALIQ_*` environment variables. Parsing goes through a lookup
//! closure so tests can supply values without touching the process
//! environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::normalize_base_url;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8002";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 10;
const DB_FILE_NAME: &str = "reports.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Could not determine a data directory; set RURALIQ_DB_PATH")]
    NoDataDir,
}

/// Settings shared by every client shell
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Ingestion server base URL, without a trailing slash
    pub api_base_url: String,
    /// Static bearer token sent with every request
    pub api_token: Option<String>,
    /// Local report database file
    pub db_path: PathBuf,
    pub request_timeout: Duration,
    /// How often the connectivity probe checks the server
    pub probe_interval: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("db_path", &self.db_path)
            .field("request_timeout", &self.request_timeout)
            .field("probe_interval", &self.probe_interval)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(&value_or_default(
            &lookup,
            "RURALIQ_API_BASE_URL",
            DEFAULT_API_BASE_URL,
        ))
        .map_err(|error| ConfigError::Invalid(format!("RURALIQ_API_BASE_URL: {error}")))?;

        let api_token = optional_trimmed(&lookup, "RURALIQ_API_TOKEN");

        let db_path = match optional_trimmed(&lookup, "RURALIQ_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        let request_timeout = bounded_secs(
            &lookup,
            "RURALIQ_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
            1..=300,
        )?;
        let probe_interval = bounded_secs(
            &lookup,
            "RURALIQ_PROBE_INTERVAL_SECS",
            DEFAULT_PROBE_INTERVAL_SECS,
            1..=3_600,
        )?;

        Ok(Self {
            api_base_url,
            api_token,
            db_path,
            request_timeout,
            probe_interval,
        })
    }

    /// Replace the server URL, e.g. from a command-line flag
    pub fn with_api_base_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.api_base_url = normalize_base_url(url).map_err(ConfigError::Invalid)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

/// `<data dir>/ruraliq/reports.db`
pub fn default_db_path() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .map(|dir| dir.join("ruraliq").join(DB_FILE_NAME))
        .ok_or(ConfigError::NoDataDir)
}

fn bounded_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<Duration, ConfigError> {
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let secs = match optional_trimmed(lookup, name) {
        Some(value) => value.parse::<u64>().map_err(|_| invalid())?,
        None => default,
    };
    if range.contains(&secs) {
        Ok(Duration::from_secs(secs))
    } else {
        Err(invalid())
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
