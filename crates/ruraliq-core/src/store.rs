//! Durable client-side queue of captured reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlReportRepository, ReportRepository};
use crate::error::{Error, Result};
use crate::models::{ClientId, Report, SyncStatus};

/// Thread-safe handle to the local report queue.
///
/// Every operation goes through one async mutex around the connection, so a
/// reader never observes a half-applied write and status transitions are
/// serialized even on a multi-threaded runtime.
#[derive(Clone)]
pub struct LocalReportStore {
    db: Arc<Mutex<Option<Database>>>,
}

impl LocalReportStore {
    /// Open (or create) the store at the given filesystem path.
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::info!("Report store opened at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
        })
    }

    /// Close the underlying database. Later calls on any clone fail.
    pub async fn close(&self) {
        let mut db = self.db.lock().await;
        if db.take().is_some() {
            tracing::debug!("Report store closed");
        }
    }

    /// Persist a report as pending. Durable once this returns.
    ///
    /// Enqueueing a client id that is already stored leaves the existing row
    /// untouched and returns the same id.
    pub async fn enqueue(&self, report: &Report) -> Result<ClientId> {
        let report = Report {
            sync_status: SyncStatus::Pending,
            synced_at: None,
            ..report.clone()
        };

        let guard = self.db.lock().await;
        let repo = LibSqlReportRepository::new(Self::connection(&guard)?.connection());
        let inserted = repo
            .insert(&report)
            .await
            .map_err(|error| Self::storage_error("enqueue report", &error))?;

        if inserted {
            tracing::debug!(client_id = %report.client_id, "Queued report for sync");
        } else {
            tracing::debug!(client_id = %report.client_id, "Report already queued");
        }
        Ok(report.client_id)
    }

    /// All pending reports in capture order.
    pub async fn list_pending(&self) -> Result<Vec<Report>> {
        let guard = self.db.lock().await;
        let repo = LibSqlReportRepository::new(Self::connection(&guard)?.connection());
        repo.list_by_status(SyncStatus::Pending).await
    }

    /// Mark the given reports synced. Unknown or already-synced ids are no-ops.
    ///
    /// Returns how many reports changed state.
    pub async fn mark_synced(&self, client_ids: &[ClientId]) -> Result<u64> {
        let now = chrono::Utc::now().timestamp_millis();
        let guard = self.db.lock().await;
        let repo = LibSqlReportRepository::new(Self::connection(&guard)?.connection());
        let changed = repo
            .mark_synced(client_ids, now)
            .await
            .map_err(|error| Self::storage_error("mark reports synced", &error))?;

        tracing::debug!(
            requested = client_ids.len(),
            changed,
            "Marked reports as synced"
        );
        Ok(changed)
    }

    /// Number of pending reports.
    pub async fn count(&self) -> Result<usize> {
        let guard = self.db.lock().await;
        let repo = LibSqlReportRepository::new(Self::connection(&guard)?.connection());
        repo.count_by_status(SyncStatus::Pending).await
    }

    /// Fetch one report by client id.
    pub async fn get(&self, client_id: &ClientId) -> Result<Option<Report>> {
        let guard = self.db.lock().await;
        let repo = LibSqlReportRepository::new(Self::connection(&guard)?.connection());
        repo.get(client_id).await
    }

    /// The most recent reports of any status, oldest first.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Report>> {
        let guard = self.db.lock().await;
        let repo = LibSqlReportRepository::new(Self::connection(&guard)?.connection());
        repo.list_recent(limit).await
    }

    /// Delete synced reports acknowledged longer ago than `older_than`.
    ///
    /// Pending reports are never touched.
    pub async fn prune_synced(&self, older_than: Duration) -> Result<u64> {
        let age_ms = i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now()
            .timestamp_millis()
            .saturating_sub(age_ms);

        let guard = self.db.lock().await;
        let repo = LibSqlReportRepository::new(Self::connection(&guard)?.connection());
        let deleted = repo.prune_synced(cutoff).await?;
        if deleted > 0 {
            tracing::info!("Pruned {deleted} synced reports");
        }
        Ok(deleted)
    }

    fn connection(db: &Option<Database>) -> Result<&Database> {
        db.as_ref()
            .ok_or_else(|| Error::Storage("report store is closed".to_string()))
    }

    fn storage_error(action: &str, error: &Error) -> Error {
        tracing::warn!("Failed to {action}: {error}");
        Error::Storage(format!("failed to {action}: {error}"))
    }
}
