use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ruraliq_core::sync::protocol::{
    BatchItem, BatchResponse, ItemVerdict, SubmitResponse, HEALTH_PATH, REPORTS_PATH,
    SYNC_REPORTS_PATH,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::verify_static_token;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::ledger::{ImageInfo, IncomingReport, IngestOutcome, ReportLedger, StoredReport};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    ledger: ReportLedger,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            ledger: ReportLedger::default(),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(REPORTS_PATH, post(submit_report).get(list_reports))
        .route(SYNC_REPORTS_PATH, post(sync_reports))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route(HEALTH_PATH, get(healthz))
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    reports: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        reports: state.ledger.count().await,
    })
}

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.config.api_token.as_deref() {
        verify_static_token(request.headers(), expected)?;
    }
    Ok(next.run(request).await)
}

async fn submit_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let mut form = ReportForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::bad_request(error.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().map(ToString::to_string);
            let content_type = field.content_type().map(ToString::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|error| AppError::bad_request(error.body_text()))?;
            if !bytes.is_empty() {
                form.image = Some(ImageInfo {
                    file_name,
                    content_type,
                    size: bytes.len(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|error| AppError::bad_request(error.body_text()))?;
            form.set_text(&name, value)?;
        }
    }

    let report = form.into_incoming();
    let client_id = report.client_id.clone();
    let outcome = state
        .ledger
        .ingest(report)
        .await
        .map_err(AppError::BadRequest)?;

    let (status, message) = match &outcome {
        IngestOutcome::Created(_) => (StatusCode::CREATED, "Report submitted successfully"),
        IngestOutcome::Duplicate(_) => (StatusCode::OK, "Report already received"),
    };
    tracing::info!(
        endpoint = "submit_report",
        client_id = %client_id,
        id = outcome.id(),
        duplicate = matches!(outcome, IngestOutcome::Duplicate(_)),
        "Ingested report"
    );
    Ok((
        status,
        Json(SubmitResponse {
            id: outcome.id().to_string(),
            message: Some(message.to_string()),
        }),
    ))
}

async fn sync_reports(
    State(state): State<AppState>,
    Json(items): Json<Vec<BatchItem>>,
) -> Json<BatchResponse> {
    let limit = state.config.max_batch_size;
    let mut processed = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let client_id = item.client_id.clone();
        // Items past the limit are left for the client's next flush
        if index >= limit {
            let client_id = Some(client_id).filter(|id| !id.trim().is_empty());
            processed.push(ItemVerdict::error(
                client_id,
                format!("batch limit exceeded ({limit} per request)"),
            ));
            continue;
        }
        let verdict = match state.ledger.ingest(incoming_from_batch(item)).await {
            Ok(IngestOutcome::Created(id)) => ItemVerdict::success(client_id, id),
            Ok(IngestOutcome::Duplicate(id)) => ItemVerdict::duplicate(client_id, Some(id)),
            Err(reason) => {
                let client_id = Some(client_id).filter(|id| !id.trim().is_empty());
                ItemVerdict::error(client_id, reason)
            }
        };
        processed.push(verdict);
    }

    let accepted = processed
        .iter()
        .filter(|verdict| verdict.status.is_acknowledged())
        .count();
    tracing::info!(
        endpoint = "sync_reports",
        received = processed.len(),
        accepted,
        "Processed report batch"
    );
    Json(BatchResponse { processed })
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    reports: Vec<StoredReport>,
}

async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ListResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Json(ListResponse {
        reports: state.ledger.recent(limit).await,
    })
}

#[derive(Debug, Default)]
struct ReportForm {
    client_id: Option<String>,
    village_id: String,
    description: String,
    gps_lat: Option<f64>,
    gps_long: Option<f64>,
    captured_at: Option<DateTime<Utc>>,
    image: Option<ImageInfo>,
}

impl ReportForm {
    fn set_text(&mut self, name: &str, value: String) -> Result<(), AppError> {
        match name {
            "client_id" => self.client_id = Some(value),
            "village_id" => self.village_id = value,
            "description" => self.description = value,
            "gps_lat" => self.gps_lat = parse_coordinate("gps_lat", &value)?,
            "gps_long" => self.gps_long = parse_coordinate("gps_long", &value)?,
            "captured_at" => {
                self.captured_at = Some(
                    DateTime::parse_from_rfc3339(value.trim())
                        .map_err(|_| AppError::bad_request("captured_at must be RFC 3339"))?
                        .with_timezone(&Utc),
                );
            }
            other => tracing::debug!("Ignoring unknown form field {other}"),
        }
        Ok(())
    }

    /// Submissions without a client id get a server-generated one
    fn into_incoming(self) -> IncomingReport {
        let client_id = self
            .client_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("server_{}", uuid::Uuid::now_v7()));
        IncomingReport {
            client_id,
            village_id: self.village_id.trim().to_string(),
            description: self.description.trim().to_string(),
            gps_lat: self.gps_lat,
            gps_long: self.gps_long,
            captured_at: self.captured_at,
            image: self.image,
        }
    }
}

fn parse_coordinate(field: &str, value: &str) -> Result<Option<f64>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| AppError::bad_request(format!("{field} must be a number")))
}

fn incoming_from_batch(item: BatchItem) -> IncomingReport {
    IncomingReport {
        client_id: item.client_id.trim().to_string(),
        village_id: item.village_id.trim().to_string(),
        description: item.description.trim().to_string(),
        gps_lat: item.gps_lat,
        gps_long: item.gps_long,
        captured_at: Some(item.timestamp),
        image: None,
    }
}
