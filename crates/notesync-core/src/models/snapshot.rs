//! Snapshot (history entry) model

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Checksum, Document, DocumentId, Mode};

/// Unique identifier of a snapshot: `{document}-{updated_at}-{suffix}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Derive a fresh id from the owning document and capture time
    #[must_use]
    pub fn generate(document_id: &DocumentId, updated_at: i64) -> Self {
        // The tail of a v7 UUID is random.
        let uuid = Uuid::now_v7().simple().to_string();
        let suffix = &uuid[uuid.len() - 8..];
        Self(format!("{document_id}-{updated_at}-{suffix}"))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable copy of a document at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: SnapshotId,
    pub document_id: DocumentId,
    pub content: String,
    pub mode: Mode,
    pub updated_at: i64,
    pub checksum: Checksum,
}

impl Snapshot {
    /// Capture the current state of a document
    #[must_use]
    pub fn capture(document: &Document) -> Self {
        Self {
            id: SnapshotId::generate(&document.id, document.updated_at),
            document_id: document.id.clone(),
            content: document.content.clone(),
            mode: document.mode,
            updated_at: document.updated_at,
            checksum: document.checksum(),
        }
    }

    /// Whether the stored checksum still matches the stored content
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.checksum.matches(&self.content)
    }
}
