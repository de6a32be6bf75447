use std::path::{Path, PathBuf};

use chrono::Utc;
use ruraliq_core::config::ClientConfig;
use ruraliq_core::connectivity::{ConnectivityProbe, HttpHealthProbe};
use ruraliq_core::sync::HttpReportTransport;
use ruraliq_core::{ConnectivityMonitor, ConnectivityStatus, LocalReportStore, Report, SyncCoordinator};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ReportListItem {
    pub client_id: String,
    pub village_id: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image: Option<String>,
    pub captured_at: i64,
    pub captured_at_iso: String,
    pub relative_time: String,
    pub sync_status: String,
    pub synced_at: Option<i64>,
}

/// Everything a command needs to talk to the queue and the server
pub struct Session {
    pub config: ClientConfig,
    pub coordinator: SyncCoordinator,
}

impl Session {
    /// Open the store and build a coordinator whose monitor starts at `initial`.
    pub async fn open(config: ClientConfig, initial: ConnectivityStatus) -> Result<Self, CliError> {
        let store = open_store(&config.db_path).await?;
        let transport = HttpReportTransport::from_config(&config)?;
        let monitor = ConnectivityMonitor::new(Some(initial));
        Ok(Self {
            coordinator: SyncCoordinator::new(store, monitor, transport),
            config,
        })
    }

    /// Open with the monitor seeded from one health check.
    pub async fn open_probed(config: ClientConfig) -> Result<Self, CliError> {
        let status = probe_once(&config).await?;
        Self::open(config, status).await
    }

    pub fn store(&self) -> &LocalReportStore {
        self.coordinator.store()
    }
}

pub fn resolve_config(
    db_path: Option<PathBuf>,
    api_url: Option<&str>,
) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(path) = db_path {
        config = config.with_db_path(path);
    }
    if let Some(url) = api_url {
        config = config.with_api_base_url(url)?;
    }
    tracing::debug!(?config, "Resolved client configuration");
    Ok(config)
}

pub async fn open_store(path: &Path) -> Result<LocalReportStore, CliError> {
    Ok(LocalReportStore::open(path).await?)
}

pub async fn probe_once(config: &ClientConfig) -> Result<ConnectivityStatus, CliError> {
    let probe = HttpHealthProbe::new(&config.api_base_url, config.request_timeout)?;
    Ok(probe.check().await)
}

pub fn resolve_description(parts: &[String]) -> Result<String, CliError> {
    normalize_description(&parts.join(" ")).ok_or(CliError::EmptyDescription)
}

pub fn normalize_description(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Absolute path of an attachment, so a later flush from another directory still finds it
pub fn resolve_image_path(path: &Path) -> Result<String, CliError> {
    let resolved = path
        .canonicalize()
        .map_err(|_| CliError::ImageNotFound(path.display().to_string()))?;
    Ok(resolved.to_string_lossy().to_string())
}

pub fn report_to_list_item(report: &Report) -> ReportListItem {
    let now_ms = Utc::now().timestamp_millis();
    ReportListItem {
        client_id: report.client_id.to_string(),
        village_id: report.village_id.clone(),
        description: report.description.clone(),
        latitude: report.location.map(|point| point.latitude),
        longitude: report.location.map(|point| point.longitude),
        image: report.image.clone(),
        captured_at: report.captured_at,
        captured_at_iso: format_timestamp(report.captured_at),
        relative_time: format_relative_time(report.captured_at, now_ms),
        sync_status: report.sync_status.to_string(),
        synced_at: report.synced_at,
    }
}

pub fn format_report_lines(reports: &[Report]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    reports
        .iter()
        .map(|report| {
            let id = report.client_id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let village = report_preview(&report.village_id, 12);
            let preview = report_preview(&report.description, 40);
            let relative_time = format_relative_time(report.captured_at, now_ms);
            format!(
                "{short_id:<13}  {village:<12}  {preview:<40}  {relative_time:<10}  {}",
                report.sync_status
            )
        })
        .collect()
}

/// First line, whitespace collapsed, truncated with an ellipsis
pub fn report_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn print_reports(reports: &[Report], as_json: bool, empty_message: &str) -> Result<(), CliError> {
    if as_json {
        let json_items = reports
            .iter()
            .map(report_to_list_item)
            .collect::<Vec<ReportListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if reports.is_empty() {
        println!("{empty_message}");
    } else {
        for line in format_report_lines(reports) {
            println!("{line}");
        }
    }
    Ok(())
}
