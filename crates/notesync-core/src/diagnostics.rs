//! Fire-and-forget error reporting for storage failures.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::models::DocumentId;

/// Failure taxonomy of the persistence and sync layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A durable write kept failing after every retry
    TransientWriteFailure,
    /// Stored content no longer matches its checksum
    CorruptionDetected,
    /// A push or poll could not reach the remote store
    SyncUnreachable,
    /// A remote payload was not newer than local state
    ConflictStale,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TransientWriteFailure => "transient_write_failure",
            Self::CorruptionDetected => "corruption_detected",
            Self::SyncUnreachable => "sync_unreachable",
            Self::ConflictStale => "conflict_stale",
        };
        f.write_str(name)
    }
}

/// Structured context attached to every report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    pub kind: FailureKind,
    pub document_id: DocumentId,
    /// Attempts made before giving up (1 for read-side failures)
    pub attempts: u32,
    pub detail: String,
}

impl DiagnosticReport {
    pub fn new(kind: FailureKind, document_id: &DocumentId, attempts: u32) -> Self {
        Self {
            kind,
            document_id: document_id.clone(),
            attempts,
            detail: String::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Receiver of diagnostic reports.
///
/// Implementations must return quickly; callers do not wait on delivery and
/// correctness never depends on a sink being present.
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, report: &DiagnosticReport);
}

/// Shared sink handle
pub type SharedSink = Arc<dyn DiagnosticsSink>;

/// Sink that drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn report(&self, _report: &DiagnosticReport) {}
}

/// Sink that forwards reports to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, report: &DiagnosticReport) {
        match report.kind {
            FailureKind::TransientWriteFailure | FailureKind::CorruptionDetected => {
                tracing::error!(
                    kind = %report.kind,
                    document = %report.document_id,
                    attempts = report.attempts,
                    detail = %report.detail,
                    "Storage diagnostic"
                );
            }
            FailureKind::SyncUnreachable => {
                tracing::warn!(
                    kind = %report.kind,
                    document = %report.document_id,
                    detail = %report.detail,
                    "Sync diagnostic"
                );
            }
            FailureKind::ConflictStale => {
                tracing::debug!(kind = %report.kind, document = %report.document_id, "Sync diagnostic");
            }
        }
    }
}

/// Default sink used when the host supplies none
pub fn noop() -> SharedSink {
    Arc::new(NoopSink)
}
