//! In-process `StorageBackend`

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{DocumentRecord, StorageBackend};
use crate::error::Result;
use crate::models::{DocumentId, Snapshot, SnapshotId};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<DocumentId, DocumentRecord>,
    snapshots: HashMap<SnapshotId, Snapshot>,
    /// Insertion counter used to break `updated_at` ties
    sequence: u64,
    order: HashMap<SnapshotId, u64>,
}

/// Non-durable backend holding both collections in memory
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.documents.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        Ok(self.state.read().await.documents.get(id).cloned())
    }

    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut state = self.state.write().await;
        state.sequence += 1;
        let sequence = state.sequence;
        state.order.insert(snapshot.id.clone(), sequence);
        state.snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<Snapshot>> {
        Ok(self.state.read().await.snapshots.get(id).cloned())
    }

    async fn list_snapshots(&self, document_id: &DocumentId) -> Result<Vec<Snapshot>> {
        let state = self.state.read().await;
        let mut snapshots: Vec<_> = state
            .snapshots
            .values()
            .filter(|snapshot| &snapshot.document_id == document_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|snapshot| {
            let sequence = state.order.get(&snapshot.id).copied().unwrap_or_default();
            std::cmp::Reverse((snapshot.updated_at, sequence))
        });
        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: &SnapshotId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.order.remove(id);
        Ok(state.snapshots.remove(id).is_some())
    }

    async fn delete_snapshots(&self, document_id: &DocumentId) -> Result<usize> {
        let mut state = self.state.write().await;
        let doomed: Vec<_> = state
            .snapshots
            .values()
            .filter(|snapshot| &snapshot.document_id == document_id)
            .map(|snapshot| snapshot.id.clone())
            .collect();
        for id in &doomed {
            state.snapshots.remove(id);
            state.order.remove(id);
        }
        Ok(doomed.len())
    }
}
