//! Data models for notesync

mod checksum;
mod document;
mod snapshot;

pub use checksum::Checksum;
pub use document::{Document, DocumentId, Mode};
pub use snapshot::{Snapshot, SnapshotId};
