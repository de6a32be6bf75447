//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    if version < CURRENT_VERSION {
        tracing::info!("Report database schema is at version {CURRENT_VERSION}");
    }
    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Run a migration's statements inside one transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            [i64::from(version)],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated report database to version {version}");
    Ok(())
}

/// Migration to version 1: report queue
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // seq gives a stable capture order independent of clock skew
            "CREATE TABLE IF NOT EXISTS reports (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id TEXT NOT NULL UNIQUE,
                village_id TEXT NOT NULL,
                description TEXT NOT NULL,
                latitude REAL,
                longitude REAL,
                image TEXT,
                captured_at INTEGER NOT NULL,
                sync_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (sync_status IN ('pending', 'synced')),
                synced_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_reports_status_seq ON reports(sync_status, seq)",
        ],
    )
    .await
}

/// Migration to version 2: lifecycle guards
///
/// Pending rows may only leave the table by becoming synced, and synced rows
/// never go back to pending.
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "CREATE TRIGGER IF NOT EXISTS reports_pending_delete_guard BEFORE DELETE ON reports
             FOR EACH ROW
             WHEN OLD.sync_status = 'pending'
             BEGIN
                 SELECT RAISE(ABORT, 'pending reports cannot be deleted');
             END",
            "CREATE TRIGGER IF NOT EXISTS reports_status_regression_guard BEFORE UPDATE OF sync_status ON reports
             FOR EACH ROW
             WHEN OLD.sync_status = 'synced' AND NEW.sync_status = 'pending'
             BEGIN
                 SELECT RAISE(ABORT, 'synced reports cannot return to pending');
             END",
            "CREATE INDEX IF NOT EXISTS idx_reports_synced_at ON reports(synced_at)",
        ],
    )
    .await
}
