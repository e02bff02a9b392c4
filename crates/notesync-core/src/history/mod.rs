//! Browsable, deduplicated version history of one document

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::db::StorageBackend;
use crate::error::{Error, Result};
use crate::models::{Document, DocumentId, Snapshot, SnapshotId};
use crate::store::DurableStore;

/// Characters kept in a history preview label
pub const PREVIEW_BUDGET: usize = 60;
/// Label for snapshots with no visible text
pub const BLANK_LABEL: &str = "(blank)";
const ELLIPSIS: char = '…';

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|br|hr|li|ul|ol|h[1-6]|blockquote|pre|table|tr|td|th|section|article)\b[^>]*>",
    )
    .expect("Invalid regex")
});
// Inline tags join their neighbours
static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// A snapshot together with its human-readable preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub snapshot: Snapshot,
    pub preview: String,
}

/// History operations bound to one document
pub struct VersionHistory<B> {
    store: Arc<DurableStore<B>>,
    document_id: DocumentId,
}

impl<B: StorageBackend> VersionHistory<B> {
    pub const fn new(store: Arc<DurableStore<B>>, document_id: DocumentId) -> Self {
        Self { store, document_id }
    }

    pub const fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Snapshot the document unless nothing changed since the last snapshot
    pub async fn record_if_changed(
        &self,
        document: &Document,
        force: bool,
    ) -> Result<Option<Snapshot>> {
        self.ensure_owned(&document.id)?;
        self.store.put_snapshot(document, force).await
    }

    /// Snapshots newest first, each with a preview label
    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        let snapshots = self.store.list_snapshots(&self.document_id).await?;
        Ok(snapshots
            .into_iter()
            .map(|snapshot| HistoryEntry {
                preview: preview_label(&snapshot.content),
                snapshot,
            })
            .collect())
    }

    /// Write a snapshot's content back as the current document.
    ///
    /// The restored document is stamped `updated_at` so it wins against any
    /// remote state older than the restore. The snapshot itself is kept.
    pub async fn restore(&self, snapshot_id: &SnapshotId, updated_at: i64) -> Result<Document> {
        let snapshot = self
            .store
            .get_snapshot(snapshot_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("snapshot {snapshot_id}")))?;
        self.ensure_owned(&snapshot.document_id)?;

        let document = Document {
            id: self.document_id.clone(),
            content: snapshot.content,
            mode: snapshot.mode,
            updated_at,
        };
        let status = self.store.put(&document).await;
        tracing::info!(
            document = %self.document_id,
            snapshot = %snapshot_id,
            ?status,
            "Restored snapshot"
        );
        Ok(document)
    }

    /// Delete one snapshot
    pub async fn discard(&self, snapshot_id: &SnapshotId) -> Result<bool> {
        self.store.delete_snapshot(snapshot_id).await
    }

    /// Delete the whole history of this document
    pub async fn discard_all(&self) -> Result<usize> {
        self.store.delete_snapshots(&self.document_id).await
    }

    fn ensure_owned(&self, owner: &DocumentId) -> Result<()> {
        if owner == &self.document_id {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "snapshot belongs to {owner}, not {}",
                self.document_id
            )))
        }
    }
}

/// Short plain-text label for a snapshot's content.
///
/// Strips markup, collapses whitespace, and truncates to [`PREVIEW_BUDGET`]
/// characters with a trailing ellipsis.
///
/// # Examples
///
/// ```
/// use notesync_core::history::preview_label;
///
/// assert_eq!(preview_label("<p>Buy <b>milk</b></p>"), "Buy milk");
/// assert_eq!(preview_label("<p> </p>"), "(blank)");
/// ```
pub fn preview_label(content: &str) -> String {
    let separated = BLOCK_TAG.replace_all(content, " ");
    let stripped = MARKUP_TAG.replace_all(&separated, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let text = decoded.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.is_empty() {
        return BLANK_LABEL.to_string();
    }
    if text.chars().count() <= PREVIEW_BUDGET {
        return text;
    }
    let mut label: String = text.chars().take(PREVIEW_BUDGET).collect();
    label.truncate(label.trim_end().len());
    label.push(ELLIPSIS);
    label
}
