//! Checksum-validated, retrying persistence over a [`StorageBackend`].
//!
//! Document writes never fail loudly: `put` retries with linear backoff and
//! reports the final outcome through the [`SaveStatus`] signal. Reads verify
//! the stored checksum and treat any mismatch as absence.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};

use crate::config::RetryPolicy;
use crate::db::{DocumentRecord, StorageBackend, StoreHandle};
use crate::diagnostics::{DiagnosticReport, FailureKind, SharedSink};
use crate::error::{Error, Result};
use crate::models::{Checksum, Document, DocumentId, Snapshot, SnapshotId};

const STATUS_EVENT_CAPACITY: usize = 64;

/// Outcome of the most recent durable write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing written yet
    #[default]
    Idle,
    /// A write attempt is in progress
    Saving,
    Success,
    /// Every retry failed
    Error,
}

/// Durable local store for documents and their snapshots
pub struct DurableStore<B> {
    handle: Arc<StoreHandle<B>>,
    retry: RetryPolicy,
    sink: SharedSink,
    status: watch::Sender<SaveStatus>,
    transitions: broadcast::Sender<SaveStatus>,
    /// Checksum of the newest snapshot per document, for dedup
    snapshot_heads: Mutex<HashMap<DocumentId, Checksum>>,
}

impl<B: StorageBackend> DurableStore<B> {
    pub fn new(handle: Arc<StoreHandle<B>>, retry: RetryPolicy, sink: SharedSink) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        let (transitions, _) = broadcast::channel(STATUS_EVENT_CAPACITY);
        Self {
            handle,
            retry,
            sink,
            status,
            transitions,
            snapshot_heads: Mutex::new(HashMap::new()),
        }
    }

    /// Current save status
    pub fn status(&self) -> SaveStatus {
        *self.status.borrow()
    }

    /// Watch the latest save status
    pub fn watch_status(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    /// Receive every status transition, including repeated `Saving`
    pub fn subscribe_status(&self) -> broadcast::Receiver<SaveStatus> {
        self.transitions.subscribe()
    }

    fn set_status(&self, status: SaveStatus) {
        self.status.send_replace(status);
        // No subscribers is fine
        let _ = self.transitions.send(status);
    }

    /// Write a document, verify it by reading it back, and retry on failure.
    ///
    /// Resolves to the final status once the write succeeded or every retry
    /// was spent. Exhaustion is reported to the diagnostics sink.
    pub async fn put(&self, document: &Document) -> SaveStatus {
        let record = DocumentRecord::seal(document);
        let max_attempts = self.retry.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.set_status(SaveStatus::Saving);
            match self.write_verified(&record).await {
                Ok(()) => {
                    tracing::debug!(document = %record.id, attempt, "Document persisted");
                    self.set_status(SaveStatus::Success);
                    return SaveStatus::Success;
                }
                Err(error) => {
                    tracing::warn!(document = %record.id, attempt, %error, "Document write failed");
                    last_error = error.to_string();
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        tracing::error!(
            document = %record.id,
            attempts = max_attempts,
            "Giving up on document write"
        );
        self.sink.report(
            &DiagnosticReport::new(FailureKind::TransientWriteFailure, &record.id, max_attempts)
                .with_detail(last_error),
        );
        self.set_status(SaveStatus::Error);
        SaveStatus::Error
    }

    async fn write_verified(&self, record: &DocumentRecord) -> Result<()> {
        let backend = self.handle.get().await?;
        backend.put_document(record).await?;
        let readback = backend
            .get_document(&record.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("readback of {}", record.id)))?;
        if readback.checksum != record.checksum || !readback.is_intact() {
            return Err(Error::ChecksumMismatch(record.id.to_string()));
        }
        Ok(())
    }

    /// Read and verify a document.
    ///
    /// Returns `None` when the document is missing, unreadable, or corrupt;
    /// corruption is reported and never retried.
    pub async fn get(&self, id: &DocumentId) -> Option<Document> {
        let backend = match self.handle.get().await {
            Ok(backend) => backend,
            Err(error) => {
                tracing::warn!(document = %id, %error, "Storage unavailable for read");
                return None;
            }
        };

        match backend.get_document(id).await {
            Ok(Some(record)) if record.is_intact() => Some(record.into_document()),
            Ok(Some(_)) | Err(Error::ChecksumMismatch(_)) => {
                self.report_corruption(id, "document checksum mismatch");
                None
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(document = %id, %error, "Document read failed");
                None
            }
        }
    }

    fn report_corruption(&self, id: &DocumentId, detail: &str) {
        tracing::warn!(document = %id, detail, "Corrupted record ignored");
        self.sink.report(
            &DiagnosticReport::new(FailureKind::CorruptionDetected, id, 1).with_detail(detail),
        );
    }

    /// Record a snapshot unless it would duplicate the newest one.
    ///
    /// Returns the new snapshot, or `None` when the content checksum equals
    /// the last recorded one and `force` is false.
    pub async fn put_snapshot(&self, document: &Document, force: bool) -> Result<Option<Snapshot>> {
        let checksum = document.checksum();
        let backend = self.handle.get().await?;
        let mut heads = self.snapshot_heads.lock().await;

        let last = match heads.get(&document.id) {
            Some(last) => Some(*last),
            None => backend
                .list_snapshots(&document.id)
                .await?
                .first()
                .map(|newest| newest.checksum),
        };
        if !force && last == Some(checksum) {
            tracing::debug!(document = %document.id, "Snapshot unchanged, skipping");
            return Ok(None);
        }

        let snapshot = Snapshot::capture(document);
        backend.put_snapshot(&snapshot).await?;
        heads.insert(document.id.clone(), checksum);
        tracing::debug!(document = %document.id, snapshot = %snapshot.id, force, "Snapshot recorded");
        Ok(Some(snapshot))
    }

    /// Verified snapshots of a document, newest first
    pub async fn list_snapshots(&self, document_id: &DocumentId) -> Result<Vec<Snapshot>> {
        let backend = self.handle.get().await?;
        let mut snapshots = backend.list_snapshots(document_id).await?;
        snapshots.retain(|snapshot| {
            let intact = snapshot.is_intact();
            if !intact {
                self.report_corruption(document_id, snapshot.id.as_str());
            }
            intact
        });
        // Stable sort keeps the backend's tie order
        snapshots.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(snapshots)
    }

    /// Read and verify one snapshot
    pub async fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<Snapshot>> {
        let backend = self.handle.get().await?;
        match backend.get_snapshot(id).await? {
            Some(snapshot) if !snapshot.is_intact() => {
                self.report_corruption(&snapshot.document_id, id.as_str());
                Ok(None)
            }
            found => Ok(found),
        }
    }

    /// Delete one snapshot; returns whether it existed.
    ///
    /// The dedup head of the owning document is dropped so the next
    /// snapshot compares against what is actually stored.
    pub async fn delete_snapshot(&self, id: &SnapshotId) -> Result<bool> {
        let backend = self.handle.get().await?;
        let mut heads = self.snapshot_heads.lock().await;
        let owner = backend.get_snapshot(id).await?.map(|snapshot| snapshot.document_id);
        let removed = backend.delete_snapshot(id).await?;
        if let Some(document_id) = owner {
            heads.remove(&document_id);
        }
        Ok(removed)
    }

    /// Delete every snapshot of a document
    pub async fn delete_snapshots(&self, document_id: &DocumentId) -> Result<usize> {
        let backend = self.handle.get().await?;
        let mut heads = self.snapshot_heads.lock().await;
        let removed = backend.delete_snapshots(document_id).await?;
        heads.remove(document_id);
        tracing::info!(document = %document_id, removed, "Snapshot history cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;
    use crate::diagnostics::NoopSink;
    use crate::models::Mode;
    use crate::testing::{FlakyBackend, RecordingSink};
    use pretty_assertions::assert_eq;

    fn document(content: &str, updated_at: i64) -> Document {
        Document {
            id: DocumentId::new("notes-1"),
            content: content.into(),
            mode: Mode::Rich,
            updated_at,
        }
    }

    fn store_over<B: StorageBackend>(backend: B) -> (DurableStore<B>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let store = DurableStore::new(
            Arc::new(StoreHandle::from_backend(backend)),
            RetryPolicy::default(),
            sink.clone(),
        );
        (store, sink)
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let (store, _) = store_over(MemoryBackend::new());
        let doc = document("<b>hello</b>", 12);

        assert_eq!(store.put(&doc).await, SaveStatus::Success);
        let fetched = store.get(&doc.id).await.unwrap();
        assert_eq!(fetched, doc);
        assert_eq!(fetched.checksum(), doc.checksum());
        assert_eq!(store.status(), SaveStatus::Success);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let (store, sink) = store_over(MemoryBackend::new());
        assert!(store.get(&DocumentId::new("missing")).await.is_none());
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn corrupted_record_reads_as_absent_and_is_reported() {
        let backend = MemoryBackend::new();
        let mut record = DocumentRecord::seal(&document("original", 1));
        record.content = "flipped".into();
        backend.put_document(&record).await.unwrap();
        let (store, sink) = store_over(backend);

        assert!(store.get(&DocumentId::new("notes-1")).await.is_none());
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, FailureKind::CorruptionDetected);
        assert_eq!(reports[0].document_id, DocumentId::new("notes-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_failed_writes() {
        let (store, _) = store_over(FlakyBackend::failing(2));
        let mut transitions = store.subscribe_status();

        let status = store.put(&document("offline", 3)).await;

        assert_eq!(status, SaveStatus::Success);
        let backend = store.handle.get().await.unwrap();
        assert_eq!(backend.writes(), 3);
        let mut seen = Vec::new();
        while let Ok(status) = transitions.try_recv() {
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                SaveStatus::Saving,
                SaveStatus::Saving,
                SaveStatus::Saving,
                SaveStatus::Success
            ]
        );
        assert_eq!(
            store.get(&DocumentId::new("notes-1")).await.unwrap().content,
            "offline"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_retries_sets_error_and_reports() {
        let (store, sink) = store_over(FlakyBackend::failing(10));
        let started = tokio::time::Instant::now();

        let status = store.put(&document("lost", 3)).await;

        assert_eq!(status, SaveStatus::Error);
        assert_eq!(store.status(), SaveStatus::Error);
        let backend = store.handle.get().await.unwrap();
        assert_eq!(backend.writes(), 4);
        // 500 + 1000 + 1500 ms of backoff
        assert_eq!(started.elapsed(), std::time::Duration::from_millis(3000));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, FailureKind::TransientWriteFailure);
        assert_eq!(reports[0].attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn readback_mismatch_counts_as_failed_write() {
        let backend = FlakyBackend::default();
        backend.tamper_reads();
        let (store, sink) = store_over(backend);

        assert_eq!(store.put(&document("x", 1)).await, SaveStatus::Error);
        assert_eq!(store.handle.get().await.unwrap().writes(), 4);
        assert_eq!(sink.reports()[0].kind, FailureKind::TransientWriteFailure);
    }

    #[tokio::test]
    async fn unchanged_snapshot_is_deduplicated() {
        let (store, _) = store_over(MemoryBackend::new());
        let doc = document("same", 1);

        assert!(store.put_snapshot(&doc, false).await.unwrap().is_some());
        assert!(store.put_snapshot(&doc, false).await.unwrap().is_none());
        assert_eq!(store.list_snapshots(&doc.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forced_snapshot_always_records() {
        let (store, _) = store_over(MemoryBackend::new());
        let doc = document("same", 1);

        store.put_snapshot(&doc, false).await.unwrap();
        assert!(store.put_snapshot(&doc, true).await.unwrap().is_some());
        assert_eq!(store.list_snapshots(&doc.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dedup_survives_a_fresh_store_over_the_same_backend() {
        let handle = Arc::new(StoreHandle::from_backend(MemoryBackend::new()));
        let doc = document("persisted", 1);
        {
            let store = DurableStore::new(handle.clone(), RetryPolicy::default(), Arc::new(NoopSink));
            store.put_snapshot(&doc, false).await.unwrap();
        }

        let store = DurableStore::new(handle, RetryPolicy::default(), Arc::new(NoopSink));
        assert!(store.put_snapshot(&doc, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn discarding_the_newest_snapshot_reseeds_dedup() {
        let (store, _) = store_over(MemoryBackend::new());
        let doc = document("keep me", 1);
        let saved = store.put_snapshot(&doc, false).await.unwrap().unwrap();

        assert!(store.delete_snapshot(&saved.id).await.unwrap());
        assert!(store.put_snapshot(&doc, false).await.unwrap().is_some());
        assert_eq!(store.list_snapshots(&doc.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn discarding_an_older_snapshot_keeps_dedup_against_the_newest() {
        let (store, _) = store_over(MemoryBackend::new());
        let older = store
            .put_snapshot(&document("old", 1), false)
            .await
            .unwrap()
            .unwrap();
        store.put_snapshot(&document("new", 2), false).await.unwrap();

        store.delete_snapshot(&older.id).await.unwrap();
        assert!(store
            .put_snapshot(&document("new", 3), false)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn snapshots_list_newest_first() {
        let (store, _) = store_over(MemoryBackend::new());
        store.put_snapshot(&document("one", 10), false).await.unwrap();
        store.put_snapshot(&document("three", 30), false).await.unwrap();
        store.put_snapshot(&document("two", 20), false).await.unwrap();

        let listed = store
            .list_snapshots(&DocumentId::new("notes-1"))
            .await
            .unwrap();
        let stamps: Vec<_> = listed.iter().map(|s| s.updated_at).collect();
        assert_eq!(stamps, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn corrupted_snapshots_are_hidden() {
        let backend = MemoryBackend::new();
        let mut bad = Snapshot::capture(&document("good", 1));
        bad.content = "bad".into();
        backend.put_snapshot(&bad).await.unwrap();
        let (store, sink) = store_over(backend);

        assert!(store
            .list_snapshots(&DocumentId::new("notes-1"))
            .await
            .unwrap()
            .is_empty());
        assert!(store.get_snapshot(&bad.id).await.unwrap().is_none());
        assert_eq!(sink.reports().len(), 2);
    }

    #[tokio::test]
    async fn delete_snapshot_and_bulk_delete() {
        let (store, _) = store_over(MemoryBackend::new());
        let first = store
            .put_snapshot(&document("a", 1), false)
            .await
            .unwrap()
            .unwrap();
        store.put_snapshot(&document("b", 2), false).await.unwrap();

        assert!(store.delete_snapshot(&first.id).await.unwrap());
        assert_eq!(
            store
                .delete_snapshots(&DocumentId::new("notes-1"))
                .await
                .unwrap(),
            1
        );
        // Dedup head is cleared, so the same content records again
        assert!(store
            .put_snapshot(&document("b", 3), false)
            .await
            .unwrap()
            .is_some());
    }
}
