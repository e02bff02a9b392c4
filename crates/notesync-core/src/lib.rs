//! notesync-core - Local-first persistence and sync for note widgets
//!
//! This crate keeps a checksum-verified local copy of each note document,
//! records a deduplicated snapshot history, and reconciles the local copy
//! with a remote store using last-writer-wins on a logical timestamp.

pub mod clock;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use models::{Checksum, Document, DocumentId, Mode, Snapshot, SnapshotId};
