//! libSQL implementation of `StorageBackend`

use std::path::Path;

use libsql::{params, Connection, Row};
use tokio::sync::Mutex;

use super::connection::{connect, Connected, Location};
use super::{DocumentRecord, StorageBackend};
use crate::error::{Error, Result};
use crate::models::{Checksum, DocumentId, Snapshot, SnapshotId};

const SNAPSHOT_COLUMNS: &str = "id, document_id, content, mode, updated_at, checksum";

/// Document and snapshot tables in a local libSQL database
pub struct LibSqlBackend {
    _database: libsql::Database,
    conn: Mutex<Connection>,
}

impl LibSqlBackend {
    /// Open (and migrate) a database file, creating it if needed
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::at(&Location::File(path.as_ref().to_path_buf())).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Self::at(&Location::Memory).await
    }

    pub async fn at(location: &Location) -> Result<Self> {
        let Connected { database, conn } = connect(location).await?;
        Ok(Self {
            _database: database,
            conn: Mutex::new(conn),
        })
    }

    /// Parse a document from a database row
    fn parse_document(row: &Row) -> Result<DocumentRecord> {
        let id: String = row.get(0)?;
        Ok(DocumentRecord {
            checksum: parse_checksum(&id, &row.get::<String>(4)?)?,
            mode: row.get::<String>(2)?.parse()?,
            content: row.get(1)?,
            updated_at: row.get(3)?,
            id: DocumentId::new(id),
        })
    }

    /// Parse a snapshot from a database row
    fn parse_snapshot(row: &Row) -> Result<Snapshot> {
        let id: String = row.get(0)?;
        Ok(Snapshot {
            checksum: parse_checksum(&id, &row.get::<String>(5)?)?,
            document_id: DocumentId::new(row.get::<String>(1)?),
            content: row.get(2)?,
            mode: row.get::<String>(3)?.parse()?,
            updated_at: row.get(4)?,
            id: SnapshotId::new(id),
        })
    }
}

/// An unreadable checksum column is treated the same as a mismatching one
fn parse_checksum(id: &str, raw: &str) -> Result<Checksum> {
    raw.parse()
        .map_err(|_| Error::ChecksumMismatch(id.to_string()))
}

impl StorageBackend for LibSqlBackend {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
                "INSERT OR REPLACE INTO documents (id, content, mode, updated_at, checksum)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    record.id.as_str(),
                    record.content.as_str(),
                    record.mode.as_str(),
                    record.updated_at,
                    record.checksum.to_hex()
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT id, content, mode, updated_at, checksum FROM documents WHERE id = ?",
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_document(&row)?)),
            None => Ok(None),
        }
    }

    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
                "INSERT INTO snapshots (id, document_id, content, mode, updated_at, checksum)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    snapshot.id.as_str(),
                    snapshot.document_id.as_str(),
                    snapshot.content.as_str(),
                    snapshot.mode.as_str(),
                    snapshot.updated_at,
                    snapshot.checksum.to_hex()
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_snapshot(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_snapshots(&self, document_id: &DocumentId) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM snapshots
                     WHERE document_id = ?
                     ORDER BY updated_at DESC, rowid DESC"
                ),
                [document_id.as_str()],
            )
            .await?;

        let mut snapshots = Vec::new();
        while let Some(row) = rows.next().await? {
            snapshots.push(Self::parse_snapshot(&row)?);
        }
        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: &SnapshotId) -> Result<bool> {
        let conn = self.conn.lock().await;
        let rows = conn
            .execute("DELETE FROM snapshots WHERE id = ?", [id.as_str()])
            .await?;
        Ok(rows > 0)
    }

    async fn delete_snapshots(&self, document_id: &DocumentId) -> Result<usize> {
        let conn = self.conn.lock().await;
        let rows = conn
            .execute(
                "DELETE FROM snapshots WHERE document_id = ?",
                [document_id.as_str()],
            )
            .await?;
        usize::try_from(rows).map_err(|e| Error::Storage(e.to_string()))
    }
}
