//! Storage layer for notesync
//!
//! Two record collections live behind [`StorageBackend`]: current documents
//! keyed by document id, and snapshots keyed by snapshot id with a lookup by
//! owning document.

mod backend;
mod connection;
mod handle;
mod libsql_backend;
mod memory;
mod migrations;

pub use backend::{DocumentRecord, StorageBackend};
pub use connection::Location;
pub use handle::StoreHandle;
pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryBackend;
