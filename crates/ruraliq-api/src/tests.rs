use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use ruraliq_core::sync::{HttpReportTransport, ReportTransport, TransportError};
use ruraliq_core::{
    ConnectivityMonitor, ConnectivityStatus, FlushStatus, GeoPoint, LocalReportStore,
    ReportDraft, SubmitOutcome, SyncCoordinator, SyncStatus,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::routes::{app_router, AppState};

fn router_with(config: AppConfig) -> Router {
    app_router(AppState::from_config(Arc::new(config)))
}

fn router() -> Router {
    router_with(AppConfig::default())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn batch_item(client_id: &str, description: &str) -> Value {
    json!({
        "client_id": client_id,
        "village_id": "v42",
        "description": description,
        "gps_lat": 28.6,
        "gps_long": 77.2,
        "timestamp": "2026-01-15T08:30:00Z"
    })
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (status, body) = send(
        &router(),
        Request::get("/healthz").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["reports"], 0);
}

#[tokio::test]
async fn batch_sync_is_idempotent_by_client_id() {
    let router = router();
    let batch = json!([batch_item("c1", "No water for 3 days")]);

    let (status, first) = send(&router, post_json("/api/sync/reports", &batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["processed"][0]["status"], "success");
    assert_eq!(first["processed"][0]["client_id"], "c1");

    let (_, second) = send(&router, post_json("/api/sync/reports", &batch)).await;
    assert_eq!(second["processed"][0]["status"], "duplicate");
    assert_eq!(second["processed"][0]["id"], first["processed"][0]["id"]);

    let (_, listed) = send(
        &router,
        Request::get("/api/reports").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(listed["reports"].as_array().unwrap().len(), 1);
    assert_eq!(listed["reports"][0]["village_id"], "v42");
}

#[tokio::test]
async fn batch_sync_reports_per_item_failures() {
    let router = router();
    let batch = json!([
        batch_item("a", "Broken handpump"),
        batch_item("b", "   "),
        batch_item("", "No client id"),
    ]);

    let (status, body) = send(&router, post_json("/api/sync/reports", &batch)).await;

    assert_eq!(status, StatusCode::OK);
    let processed = body["processed"].as_array().unwrap();
    assert_eq!(processed.len(), 3);
    assert_eq!(processed[0]["status"], "success");
    assert_eq!(processed[1]["status"], "error");
    assert_eq!(processed[1]["client_id"], "b");
    assert!(processed[1]["error"].as_str().unwrap().contains("description"));
    assert_eq!(processed[2]["status"], "error");
    assert_eq!(processed[2]["client_id"], Value::Null);
}

#[tokio::test]
async fn items_past_batch_limit_get_error_verdicts() {
    let router = router_with(AppConfig {
        max_batch_size: 1,
        ..AppConfig::default()
    });
    let batch = json!([batch_item("a", "one"), batch_item("b", "two")]);

    let (status, body) = send(&router, post_json("/api/sync/reports", &batch)).await;

    assert_eq!(status, StatusCode::OK);
    let processed = body["processed"].as_array().unwrap();
    assert_eq!(processed[0]["status"], "success");
    assert_eq!(processed[1]["status"], "error");
    assert_eq!(processed[1]["client_id"], "b");
    assert!(processed[1]["error"]
        .as_str()
        .unwrap()
        .contains("batch limit exceeded"));

    let (_, health) = send(
        &router,
        Request::get("/healthz").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(health["reports"], 1);
}

#[tokio::test]
async fn configured_token_is_required_on_api_routes() {
    let router = router_with(AppConfig {
        api_token: Some("field-token".to_string()),
        ..AppConfig::default()
    });
    let batch = json!([batch_item("a", "one")]);

    let (status, body) = send(&router, post_json("/api/sync/reports", &batch)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let request = Request::post("/api/sync/reports")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer field-token")
        .body(Body::from(batch.to_string()))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        Request::get("/healthz").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn multipart_submission_accepts_image() {
    let boundary = "ruraliq-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"client_id\"\r\n\r\n\
         c9\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"village_id\"\r\n\r\n\
         v42\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"description\"\r\n\r\n\
         Bridge washed out\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"gps_lat\"\r\n\r\n\
         28.6\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"gps_long\"\r\n\r\n\
         77.2\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"bridge.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n\
         not-really-a-jpeg\r\n\
         --{boundary}--\r\n"
    );
    let router = router();
    let request = Request::post("/api/reports")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, created) = send(&router, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["id"].is_string());

    let (_, listed) = send(
        &router,
        Request::get("/api/reports?limit=5").body(Body::empty()).unwrap(),
    )
    .await;
    let stored = &listed["reports"][0];
    assert_eq!(stored["client_id"], "c9");
    assert_eq!(stored["gps_lat"], 28.6);
    assert_eq!(stored["image"]["file_name"], "bridge.jpg");
    assert_eq!(stored["image"]["content_type"], "image/jpeg");
}

#[tokio::test]
async fn malformed_batch_body_is_a_client_error() {
    let request = Request::post("/api/sync/reports")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"not\": \"an array\"}"))
        .unwrap();

    let response = router().oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

async fn spawn_server(config: AppConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = router_with(config);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread")]
async fn client_flush_round_trip_over_http() {
    let base_url = spawn_server(AppConfig {
        api_token: Some("field-token".to_string()),
        ..AppConfig::default()
    })
    .await;
    let transport = HttpReportTransport::new(
        &base_url,
        Some("field-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    let store = LocalReportStore::open_in_memory().await.unwrap();
    let monitor = ConnectivityMonitor::new(Some(ConnectivityStatus::Offline));
    let coordinator = SyncCoordinator::new(store.clone(), monitor.clone(), transport);

    let report = ReportDraft::new("v42", "No water for 3 days")
        .with_location(GeoPoint::new(28.6, 77.2).unwrap())
        .capture_with_id("c1".parse().unwrap())
        .unwrap();
    let outcome = coordinator.submit_report(&report).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Queued { .. }));

    monitor.set_status(ConnectivityStatus::Online);
    let first = coordinator.flush().await.unwrap();
    assert_eq!(first.status, FlushStatus::Completed);
    assert_eq!(first.synced_count, 1);

    let stored = store.get(&"c1".parse().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);

    // Resending the same report is acknowledged as a duplicate
    let verdicts = coordinator
        .transport()
        .submit_batch(std::slice::from_ref(&report))
        .await
        .unwrap();
    assert!(verdicts[0].status.is_acknowledged());
    assert_eq!(verdicts[0].client_id.as_deref(), Some("c1"));

    let direct = coordinator
        .submit_report(
            &ReportDraft::new("v42", "Road flooded")
                .capture()
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(matches!(direct, SubmitOutcome::Delivered { .. }));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_larger_than_batch_limit_drains_over_several_flushes() {
    let base_url = spawn_server(AppConfig {
        max_batch_size: 2,
        ..AppConfig::default()
    })
    .await;
    let transport = HttpReportTransport::new(&base_url, None, Duration::from_secs(5)).unwrap();
    let store = LocalReportStore::open_in_memory().await.unwrap();
    let monitor = ConnectivityMonitor::new(Some(ConnectivityStatus::Offline));
    let coordinator = SyncCoordinator::new(store.clone(), monitor.clone(), transport);

    let captured = [
        ("c1", "No water"),
        ("c2", "Road flooded"),
        ("c3", "No power"),
    ];
    for (client_id, description) in captured {
        let report = ReportDraft::new("v42", description)
            .capture_with_id(client_id.parse().unwrap())
            .unwrap();
        coordinator.submit_report(&report).await.unwrap();
    }
    assert_eq!(store.count().await.unwrap(), 3);

    monitor.set_status(ConnectivityStatus::Online);
    let first = coordinator.flush().await.unwrap();
    assert_eq!(first.status, FlushStatus::Completed);
    assert_eq!(first.synced_count, 2);
    assert_eq!(first.failed_count, 1);
    assert_eq!(first.pending_count, 1);

    let second = coordinator.flush().await.unwrap();
    assert_eq!(second.status, FlushStatus::Completed);
    assert_eq!(second.synced_count, 1);
    assert_eq!(second.pending_count, 0);

    let third = coordinator.flush().await.unwrap();
    assert_eq!(third.status, FlushStatus::NothingPending);
}

#[tokio::test(flavor = "multi_thread")]
async fn client_sees_rejection_for_wrong_token() {
    let base_url = spawn_server(AppConfig {
        api_token: Some("field-token".to_string()),
        ..AppConfig::default()
    })
    .await;
    let transport = HttpReportTransport::new(
        &base_url,
        Some("wrong-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    let report = ReportDraft::new("v1", "broken pump").capture().unwrap();

    let error = transport.submit_report(&report).await.unwrap_err();
    assert!(matches!(
        error,
        TransportError::Rejected { status: 401, .. }
    ));
}
