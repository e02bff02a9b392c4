//! Error types for notesync-core

use thiserror::Error;

/// Result type alias using notesync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by notesync-core.
///
/// Ordinary write and sync failures never reach callers as an `Error`; they
/// show up in the save status signal instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage backend failed for a reason of its own
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("libSQL: {0}")]
    LibSql(#[from] libsql::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller passed something unusable (blank id, bad URL, zero interval)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored checksum does not match stored content
    #[error("Checksum mismatch for {0}")]
    ChecksumMismatch(String),

    /// Transport failure talking to the remote store
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote store answered with an error status
    #[error("Remote store error: {0}")]
    Remote(String),

    /// The sync coordinator task has shut down
    #[error("Sync coordinator is no longer running")]
    CoordinatorClosed,
}
