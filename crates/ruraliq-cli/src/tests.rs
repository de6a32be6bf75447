use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use ruraliq_core::config::ClientConfig;
use ruraliq_core::{ReportDraft, SubmitOutcome, SyncStatus};

use crate::cli::{Cli, Commands};
use crate::commands::capture::{build_draft, run_capture, CaptureArgs};
use crate::commands::common::{
    format_relative_time, format_report_lines, format_timestamp, normalize_description,
    open_store, report_preview, report_to_list_item, resolve_description,
};
use crate::commands::prune::run_prune;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[test]
fn normalize_description_trims_and_rejects_empty() {
    assert_eq!(
        normalize_description("  pump broken  "),
        Some("pump broken".to_string())
    );
    assert_eq!(normalize_description(" \n\t "), None);
}

#[test]
fn resolve_description_joins_words() {
    let parts = vec!["No".to_string(), "water".to_string(), "today".to_string()];
    assert_eq!(resolve_description(&parts).unwrap(), "No water today");
    assert!(matches!(
        resolve_description(&[]),
        Err(CliError::EmptyDescription)
    ));
}

#[test]
fn report_preview_truncates_with_ellipsis() {
    let preview = report_preview("The borewell pump has been broken since last monsoon", 20);
    assert_eq!(preview, "The borewell pump...");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn report_lines_include_status_and_village() {
    let report = ReportDraft::new("v42", "No water for 3 days")
        .capture()
        .unwrap();
    let lines = format_report_lines(&[report]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("v42"));
    assert!(lines[0].contains("No water for 3 days"));
    assert!(lines[0].ends_with("pending"));
}

#[test]
fn list_item_exposes_coordinates() {
    let report = ReportDraft::new("v42", "No water for 3 days")
        .with_location(ruraliq_core::GeoPoint::new(28.6, 77.2).unwrap())
        .capture()
        .unwrap();
    let item = report_to_list_item(&report);
    assert_eq!(item.latitude, Some(28.6));
    assert_eq!(item.longitude, Some(77.2));
    assert_eq!(item.sync_status, "pending");
}

#[test]
fn capture_command_parses_location_and_description() {
    let cli = Cli::try_parse_from([
        "ruraliq",
        "capture",
        "--village",
        "v42",
        "--lat",
        "-12.5",
        "--long",
        "77.2",
        "No",
        "water",
    ])
    .unwrap();

    match cli.command {
        Commands::Capture {
            village,
            lat,
            long,
            description,
            ..
        } => {
            assert_eq!(village, "v42");
            assert_eq!(lat, Some(-12.5));
            assert_eq!(long, Some(77.2));
            assert_eq!(description, vec!["No", "water"]);
        }
        _ => panic!("expected capture command"),
    }
}

#[test]
fn capture_requires_both_coordinates() {
    let result = Cli::try_parse_from([
        "ruraliq", "capture", "--village", "v1", "--lat", "10.0", "broken",
    ]);
    assert!(result.is_err());
}

#[test]
fn build_draft_rejects_out_of_range_coordinates() {
    let args = CaptureArgs {
        village: "v1".to_string(),
        lat: Some(95.0),
        long: Some(10.0),
        image: None,
        description: vec!["broken".to_string()],
    };
    assert!(matches!(build_draft(args), Err(CliError::Core(_))));
}

#[test]
fn build_draft_rejects_missing_image() {
    let args = CaptureArgs {
        village: "v1".to_string(),
        lat: None,
        long: None,
        image: Some(PathBuf::from("/definitely/not/here.jpg")),
        description: vec!["broken".to_string()],
    };
    assert!(matches!(build_draft(args), Err(CliError::ImageNotFound(_))));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn capture_while_server_unreachable_queues_report() {
    let db_path = unique_test_db_path();
    let config = unreachable_config(&db_path);

    let args = CaptureArgs {
        village: "v42".to_string(),
        lat: Some(28.6),
        long: Some(77.2),
        image: None,
        description: vec!["No water for 3 days".to_string()],
    };
    let outcome = run_capture(args, config.clone()).await.unwrap();
    let SubmitOutcome::Queued { client_id } = outcome else {
        panic!("expected report to be queued");
    };

    let store = open_store(&config.db_path).await.unwrap();
    let pending = store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].client_id, client_id);
    assert_eq!(pending[0].village_id, "v42");
    drop(store);

    cleanup_db_files(&db_path);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn sync_fails_when_server_unreachable() {
    let db_path = unique_test_db_path();
    let config = unreachable_config(&db_path);
    {
        let store = open_store(&db_path).await.unwrap();
        store
            .enqueue(&ReportDraft::new("v1", "broken pump").capture().unwrap())
            .await
            .unwrap();
    }

    let error = run_sync(config.clone()).await.unwrap_err();
    assert!(matches!(error, CliError::SyncFailed(_)));

    let store = open_store(&db_path).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
    drop(store);

    cleanup_db_files(&db_path);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn prune_keeps_pending_reports() {
    let db_path = unique_test_db_path();
    let config = unreachable_config(&db_path);
    {
        let store = open_store(&db_path).await.unwrap();
        let synced = ReportDraft::new("v1", "fixed already").capture().unwrap();
        store.enqueue(&synced).await.unwrap();
        store
            .mark_synced(std::slice::from_ref(&synced.client_id))
            .await
            .unwrap();
        store
            .enqueue(&ReportDraft::new("v1", "still broken").capture().unwrap())
            .await
            .unwrap();
    }

    let deleted = run_prune(0, &config).await.unwrap();
    assert_eq!(deleted, 1);

    let store = open_store(&db_path).await.unwrap();
    let remaining = store.list_recent(10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].sync_status, SyncStatus::Pending);
    drop(store);

    cleanup_db_files(&db_path);
}

fn unreachable_config(db_path: &Path) -> ClientConfig {
    // Port 9 (discard) on loopback is closed in test environments
    let db_path = db_path.to_string_lossy().to_string();
    ClientConfig::from_lookup(|name| match name {
        "RURALIQ_API_BASE_URL" => Some("http://127.0.0.1:9".to_string()),
        "RURALIQ_DB_PATH" => Some(db_path.clone()),
        "RURALIQ_REQUEST_TIMEOUT_SECS" => Some("1".to_string()),
        _ => None,
    })
    .map(|config| ClientConfig {
        request_timeout: Duration::from_millis(500),
        ..config
    })
    .unwrap()
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("ruraliq-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &Path) {
    // On Windows, libsql can keep file handles alive briefly after drop.
    if cfg!(windows) {
        return;
    }

    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
}
