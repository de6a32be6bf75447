//! Report repository implementation

use crate::error::{Error, Result};
use crate::models::{ClientId, GeoPoint, Report, SyncStatus};
use libsql::{Connection, Row, Value};

/// Upper bound on bound parameters per `IN (...)` statement
const MAX_IDS_PER_STATEMENT: usize = 500;

const REPORT_COLUMNS: &str = "client_id, village_id, description, latitude, longitude, image, \
                              captured_at, sync_status, synced_at";

/// Trait for report storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ReportRepository {
    /// Insert a report; returns `false` when its client id is already stored
    async fn insert(&self, report: &Report) -> Result<bool>;

    /// Get a report by client id
    async fn get(&self, client_id: &ClientId) -> Result<Option<Report>>;

    /// List reports with the given status in capture order
    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Report>>;

    /// List the most recent reports of any status, oldest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Report>>;

    /// Count reports with the given status
    async fn count_by_status(&self, status: SyncStatus) -> Result<usize>;

    /// Transition pending reports to synced; returns the number of rows changed
    async fn mark_synced(&self, client_ids: &[ClientId], synced_at: i64) -> Result<u64>;

    /// Delete synced reports acknowledged before `synced_before` (Unix ms)
    async fn prune_synced(&self, synced_before: i64) -> Result<u64>;
}

/// libSQL implementation of `ReportRepository`
pub struct LibSqlReportRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlReportRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a report from a database row selected with `REPORT_COLUMNS`
    fn parse_report(row: &Row) -> Result<Report> {
        let client_id: String = row.get(0)?;
        let latitude: Option<f64> = row.get(3)?;
        let longitude: Option<f64> = row.get(4)?;
        let status: String = row.get(7)?;

        let location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };

        Ok(Report {
            client_id: client_id.parse()?,
            village_id: row.get(1)?,
            description: row.get(2)?,
            location,
            image: row.get(5)?,
            captured_at: row.get(6)?,
            sync_status: status.parse()?,
            synced_at: row.get(8)?,
        })
    }

    async fn collect(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Report>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut reports = Vec::new();
        while let Some(row) = rows.next().await? {
            reports.push(Self::parse_report(&row)?);
        }
        Ok(reports)
    }

    async fn mark_chunk(&self, chunk: &[ClientId], synced_at: i64) -> Result<u64> {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "UPDATE reports SET sync_status = 'synced', synced_at = ?
             WHERE sync_status = 'pending' AND client_id IN ({placeholders})"
        );

        let mut values = Vec::with_capacity(chunk.len() + 1);
        values.push(Value::Integer(synced_at));
        values.extend(chunk.iter().map(|id| Value::Text(id.as_str().to_string())));

        Ok(self.conn.execute(&sql, values).await?)
    }
}

impl ReportRepository for LibSqlReportRepository<'_> {
    async fn insert(&self, report: &Report) -> Result<bool> {
        let (latitude, longitude) = report
            .location
            .map_or((None, None), |point| {
                (Some(point.latitude), Some(point.longitude))
            });

        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO reports (
                    client_id, village_id, description, latitude, longitude, image,
                    captured_at, sync_status, synced_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    report.client_id.as_str(),
                    report.village_id.as_str(),
                    report.description.as_str(),
                    latitude,
                    longitude,
                    report.image.clone(),
                    report.captured_at,
                    report.sync_status.as_str(),
                    report.synced_at
                ],
            )
            .await?;

        Ok(inserted > 0)
    }

    async fn get(&self, client_id: &ClientId) -> Result<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE client_id = ?");
        let mut rows = self.conn.query(&sql, [client_id.as_str()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_report(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Report>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE sync_status = ? ORDER BY seq ASC"
        );
        self.collect(&sql, [status.as_str()]).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Report>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM (
                SELECT seq, {REPORT_COLUMNS} FROM reports ORDER BY seq DESC LIMIT ?
             ) ORDER BY seq ASC"
        );
        self.collect(&sql, [limit]).await
    }

    async fn count_by_status(&self, status: SyncStatus) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM reports WHERE sync_status = ?",
                [status.as_str()],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Storage(format!("invalid row count {count}")))
    }

    async fn mark_synced(&self, client_ids: &[ClientId], synced_at: i64) -> Result<u64> {
        if client_ids.is_empty() {
            return Ok(0);
        }

        self.conn.execute("BEGIN IMMEDIATE", ()).await?;

        let mut changed = 0;
        for chunk in client_ids.chunks(MAX_IDS_PER_STATEMENT) {
            match self.mark_chunk(chunk, synced_at).await {
                Ok(rows) => changed += rows,
                Err(e) => {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(changed)
    }

    async fn prune_synced(&self, synced_before: i64) -> Result<u64> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM reports
                 WHERE sync_status = 'synced' AND synced_at IS NOT NULL AND synced_at < ?",
                [synced_before],
            )
            .await?;
        Ok(deleted)
    }
}
