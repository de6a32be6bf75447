//! Transport abstraction for the remote report-ingestion endpoint.
//!
//! The coordinator only talks to [`ReportTransport`], so tests can swap in an
//! in-process fake while production uses [`HttpReportTransport`].

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use super::protocol::{
    capture_time, BatchItem, BatchResponse, ItemVerdict, SubmitResponse, REPORTS_PATH,
    SYNC_REPORTS_PATH,
};
use crate::config::ClientConfig;
use crate::models::Report;
use crate::util::{compact_text, normalize_base_url};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached or answered with a transient failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server refused the request.
    #[error("rejected by server: {message} ({status})")]
    Rejected { status: u16, message: String },

    /// The server answered with a body we could not understand.
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// The report's attachment could not be read.
    #[error("attachment error: {0}")]
    Attachment(String),

    /// Bad transport configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfiguration(String),
}

impl TransportError {
    /// Whether retrying later may succeed without changing the request
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::InvalidResponse(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by transports.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Remote report-ingestion endpoint.
pub trait ReportTransport: Send + Sync {
    /// Submit one report immediately; returns the server-side id.
    fn submit_report<'a>(&'a self, report: &'a Report) -> TransportFuture<'a, String>;

    /// Submit a batch in a single call; returns per-item verdicts keyed by client id.
    fn submit_batch<'a>(&'a self, reports: &'a [Report]) -> TransportFuture<'a, Vec<ItemVerdict>>;
}

impl<T: ReportTransport + ?Sized> ReportTransport for Arc<T> {
    fn submit_report<'a>(&'a self, report: &'a Report) -> TransportFuture<'a, String> {
        (**self).submit_report(report)
    }

    fn submit_batch<'a>(&'a self, reports: &'a [Report]) -> TransportFuture<'a, Vec<ItemVerdict>> {
        (**self).submit_batch(reports)
    }
}

/// HTTP transport using reqwest.
#[derive(Clone)]
pub struct HttpReportTransport {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpReportTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpReportTransport")
            .field("base_url", &self.base_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpReportTransport {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let base_url = normalize_base_url(base_url).map_err(TransportError::InvalidConfiguration)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::InvalidConfiguration(error.to_string()))?;
        Ok(Self {
            base_url,
            auth_token,
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> TransportResult<Self> {
        Self::new(
            &config.api_base_url,
            config.api_token.clone(),
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Accept", "application/json");
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn build_form(report: &Report) -> TransportResult<Form> {
        let mut form = Form::new()
            .text("client_id", report.client_id.to_string())
            .text("village_id", report.village_id.clone())
            .text("description", report.description.clone())
            .text("captured_at", capture_time(report.captured_at).to_rfc3339());

        if let Some(point) = report.location {
            form = form
                .text("gps_lat", point.latitude.to_string())
                .text("gps_long", point.longitude.to_string());
        }

        if let Some(image) = &report.image {
            form = form.part("image", Self::image_part(Path::new(image)).await?);
        }

        Ok(form)
    }

    async fn image_part(path: &Path) -> TransportResult<Part> {
        let bytes = tokio::fs::read(path).await.map_err(|error| {
            TransportError::Attachment(format!("{}: {error}", path.display()))
        })?;
        let filename = path
            .file_name()
            .map_or_else(|| "image".to_string(), |name| name.to_string_lossy().to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime.as_ref())
            .map_err(|error| TransportError::Attachment(error.to_string()))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> TransportResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| {
            TransportError::InvalidResponse(format!("{error}: {}", compact_text(&body)))
        })
    }
}

impl ReportTransport for HttpReportTransport {
    fn submit_report<'a>(&'a self, report: &'a Report) -> TransportFuture<'a, String> {
        Box::pin(async move {
            let form = Self::build_form(report).await?;
            let response = self.post(REPORTS_PATH).multipart(form).send().await?;
            let body: SubmitResponse = Self::read_json(response).await?;
            tracing::debug!(client_id = %report.client_id, server_id = %body.id, "Report delivered");
            Ok(body.id)
        })
    }

    fn submit_batch<'a>(&'a self, reports: &'a [Report]) -> TransportFuture<'a, Vec<ItemVerdict>> {
        Box::pin(async move {
            let items: Vec<BatchItem> = reports.iter().map(BatchItem::from).collect();
            let response = self.post(SYNC_REPORTS_PATH).json(&items).send().await?;
            let body: BatchResponse = Self::read_json(response).await?;
            Ok(body.processed)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    detail: Option<String>,
}

/// Map a non-success HTTP status to a transport error.
///
/// Server-side and throttling failures are transient; other client errors
/// mean the server refused this request.
fn classify_failure(status: StatusCode, body: &str) -> TransportError {
    let message = parse_api_error(status, body);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        TransportError::Network(message)
    } else {
        TransportError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message).or(payload.detail) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_base_url() {
        let error = HttpReportTransport::new("api.example.com", None, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(error, TransportError::InvalidConfiguration(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let transport = HttpReportTransport::new(
            "https://api.example.com/",
            Some("secret-token".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        let debug = format!("{transport:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(transport.base_url(), "https://api.example.com");
    }

    #[test]
    fn server_errors_are_retryable() {
        let error = classify_failure(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(error.is_retryable());
        assert!(error.to_string().contains("HTTP 503"));

        let throttled = classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(throttled.is_retryable());
    }

    #[test]
    fn client_errors_are_rejections() {
        let error = classify_failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error": "description must not be empty"}"#,
        );
        assert!(!error.is_retryable());
        match error {
            TransportError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "description must not be empty");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_attachment_is_reported() {
        let report = crate::models::ReportDraft::new("v1", "broken pump")
            .with_image("/definitely/not/here.jpg")
            .capture()
            .unwrap();
        let error = HttpReportTransport::build_form(&report).await.unwrap_err();
        assert!(matches!(error, TransportError::Attachment(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_server_is_a_network_error() {
        let transport =
            HttpReportTransport::new("http://127.0.0.1:9", None, Duration::from_millis(500))
                .unwrap();
        let report = crate::models::ReportDraft::new("v1", "broken pump")
            .capture()
            .unwrap();
        let error = transport.submit_batch(&[report]).await.unwrap_err();
        assert!(error.is_retryable());
    }
}
