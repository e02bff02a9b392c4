use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] notesync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No document content provided")]
    EmptyContent,
    #[error("Document ID cannot be empty")]
    EmptyDocumentId,
    #[error("Snapshot ID cannot be empty")]
    EmptySnapshotId,
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),
    #[error("Save failed after retries; see logs for details")]
    SaveFailed,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Remote store is not configured. Set NOTESYNC_REMOTE_URL (and NOTESYNC_REMOTE_TOKEN if required).")]
    RemoteNotConfigured,
}
