//! Fakes shared by unit tests across modules.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::db::{DocumentRecord, MemoryBackend, StorageBackend};
use crate::diagnostics::{DiagnosticReport, DiagnosticsSink};
use crate::error::{Error, Result};
use crate::models::{DocumentId, Snapshot, SnapshotId};

/// Clock whose value only changes when a test says so
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn at(millis: i64) -> Self {
        Self(Arc::new(AtomicI64::new(millis)))
    }

    pub fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sink that keeps every report for later assertions
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<DiagnosticReport>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<DiagnosticReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn report(&self, report: &DiagnosticReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// Memory backend with injectable write failures
#[derive(Default)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    failing_writes: AtomicU32,
    writes: AtomicU32,
    tamper_readback: AtomicBool,
}

impl FlakyBackend {
    /// Fail the next `count` document writes
    pub fn failing(count: u32) -> Self {
        let backend = Self::default();
        backend.failing_writes.store(count, Ordering::SeqCst);
        backend
    }

    /// Serve reads whose content no longer matches the stored checksum
    pub fn tamper_reads(&self) {
        self.tamper_readback.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StorageBackend for FlakyBackend {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Error::Storage("injected write failure".into()));
        }
        self.inner.put_document(record).await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        let record = self.inner.get_document(id).await?;
        if self.tamper_readback.load(Ordering::SeqCst) {
            return Ok(record.map(|mut record| {
                record.content.push_str(" (bit rot)");
                record
            }));
        }
        Ok(record)
    }

    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.inner.put_snapshot(snapshot).await
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<Snapshot>> {
        self.inner.get_snapshot(id).await
    }

    async fn list_snapshots(&self, document_id: &DocumentId) -> Result<Vec<Snapshot>> {
        self.inner.list_snapshots(document_id).await
    }

    async fn delete_snapshot(&self, id: &SnapshotId) -> Result<bool> {
        self.inner.delete_snapshot(id).await
    }

    async fn delete_snapshots(&self, document_id: &DocumentId) -> Result<usize> {
        self.inner.delete_snapshots(document_id).await
    }
}
