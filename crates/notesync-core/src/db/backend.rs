//! Backend contract shared by every storage implementation

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Checksum, Document, DocumentId, Mode, Snapshot, SnapshotId};

/// On-disk form of a [`Document`], carrying the checksum computed at write time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub content: String,
    pub mode: Mode,
    pub updated_at: i64,
    pub checksum: Checksum,
}

impl DocumentRecord {
    /// Build a record, hashing the document's current content
    pub fn seal(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            content: document.content.clone(),
            mode: document.mode,
            updated_at: document.updated_at,
            checksum: document.checksum(),
        }
    }

    /// Whether the stored checksum still matches the stored content
    pub fn is_intact(&self) -> bool {
        self.checksum.matches(&self.content)
    }

    pub fn into_document(self) -> Document {
        Document {
            id: self.id,
            content: self.content,
            mode: self.mode,
            updated_at: self.updated_at,
        }
    }
}

/// Key-value persistence for documents and their snapshots.
///
/// Backends store what they are given; checksum verification and retries
/// belong to [`crate::store::DurableStore`].
pub trait StorageBackend: Send + Sync + 'static {
    /// Insert or replace the current document record
    fn put_document(&self, record: &DocumentRecord) -> impl Future<Output = Result<()>> + Send;

    /// Read the current document record, unverified
    fn get_document(
        &self,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Option<DocumentRecord>>> + Send;

    /// Store a new snapshot
    fn put_snapshot(&self, snapshot: &Snapshot) -> impl Future<Output = Result<()>> + Send;

    /// Read one snapshot, unverified
    fn get_snapshot(&self, id: &SnapshotId)
        -> impl Future<Output = Result<Option<Snapshot>>> + Send;

    /// All snapshots of a document, newest first by `updated_at`
    fn list_snapshots(
        &self,
        document_id: &DocumentId,
    ) -> impl Future<Output = Result<Vec<Snapshot>>> + Send;

    /// Remove one snapshot; returns whether it existed
    fn delete_snapshot(&self, id: &SnapshotId) -> impl Future<Output = Result<bool>> + Send;

    /// Remove every snapshot of a document; returns how many were removed
    fn delete_snapshots(
        &self,
        document_id: &DocumentId,
    ) -> impl Future<Output = Result<usize>> + Send;
}
