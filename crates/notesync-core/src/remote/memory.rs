//! In-process remote store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{PushMessage, RemoteDocument, RemoteStore};
use crate::error::{Error, Result};
use crate::models::DocumentId;

/// Remote store kept in memory, applying last-writer-wins on push.
///
/// Can be switched offline to simulate an unreachable network.
#[derive(Default)]
pub struct MemoryRemote {
    documents: Mutex<HashMap<DocumentId, RemoteDocument>>,
    offline: AtomicBool,
    fetches: AtomicUsize,
    pushes: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the remote copy, as another device would
    pub fn insert(&self, id: DocumentId, document: RemoteDocument) {
        self.lock().insert(id, document);
    }

    pub fn document(&self, id: &DocumentId) -> Option<RemoteDocument> {
        self.lock().get(id).cloned()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetch calls seen, failed ones included
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of push calls seen, failed ones included
    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DocumentId, RemoteDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::Remote("remote store unreachable".into()))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for MemoryRemote {
    async fn fetch(&self, id: &DocumentId) -> Result<Option<RemoteDocument>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        Ok(self.document(id))
    }

    async fn push(&self, message: &PushMessage) -> Result<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        let mut documents = self.lock();
        let newer = documents
            .get(&message.document_id)
            .is_none_or(|current| message.updated_at > current.updated_at);
        if newer {
            documents.insert(
                message.document_id.clone(),
                RemoteDocument {
                    content: message.content.clone(),
                    mode: message.mode,
                    updated_at: message.updated_at,
                },
            );
        }
        Ok(())
    }
}
