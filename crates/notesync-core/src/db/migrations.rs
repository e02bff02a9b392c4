//! Versioned schema for the documents and snapshots tables.
//!
//! Each migration runs in its own transaction and is recorded in
//! `schema_version`, so reopening an up-to-date database is a no-op.

use libsql::{params, Connection};

use crate::error::Result;

struct Migration {
    version: i64,
    description: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "documents and snapshots",
    statements: &[
        "CREATE TABLE documents (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            mode TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
        "CREATE TABLE snapshots (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            content TEXT NOT NULL,
            mode TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
        "CREATE INDEX idx_snapshots_document ON snapshots(document_id, updated_at DESC)",
    ],
}];

pub const LATEST_VERSION: i64 = MIGRATIONS[MIGRATIONS.len() - 1].version;

/// Apply every migration newer than the recorded schema version
pub async fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    let current = schema_version(conn).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration).await?;
    }
    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction().await?;
    if let Err(error) = run_statements(&tx, migration).await {
        if let Err(rollback) = tx.rollback().await {
            tracing::warn!(%rollback, "Rollback of failed migration failed");
        }
        return Err(error);
    }
    tx.commit().await?;

    tracing::info!(
        version = migration.version,
        description = migration.description,
        "Applied schema migration"
    );
    Ok(())
}

async fn run_statements(conn: &Connection, migration: &Migration) -> Result<()> {
    for statement in migration.statements {
        conn.execute(statement, ()).await?;
    }
    conn.execute(
        "INSERT INTO schema_version (version, description, applied_at) VALUES (?1, ?2, ?3)",
        params![
            migration.version,
            migration.description,
            chrono::Utc::now().timestamp_millis()
        ],
    )
    .await?;
    Ok(())
}
