//! Remote store service contract and clients

mod http;
mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Document, DocumentId, Mode};

pub use http::HttpRemoteStore;
pub use memory::MemoryRemote;

/// Payload returned by `GET /documents/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub content: String,
    #[serde(default)]
    pub mode: Mode,
    pub updated_at: i64,
}

/// Fire-and-forget notification sent while the user is editing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub document_id: DocumentId,
    pub content: String,
    pub mode: Mode,
    pub updated_at: i64,
}

impl PushMessage {
    pub fn from_document(document: &Document) -> Self {
        Self {
            document_id: document.id.clone(),
            content: document.content.clone(),
            mode: document.mode,
            updated_at: document.updated_at,
        }
    }
}

impl From<&Document> for RemoteDocument {
    fn from(document: &Document) -> Self {
        Self {
            content: document.content.clone(),
            mode: document.mode,
            updated_at: document.updated_at,
        }
    }
}

/// Remote copy of every document.
///
/// Delivery is best effort: callers skip a failed cycle instead of retrying.
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetch the remote copy; `None` when the remote has never seen it
    fn fetch(
        &self,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Option<RemoteDocument>>> + Send;

    /// Push local state; no acknowledgement beyond transport success
    fn push(&self, message: &PushMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Remote that never has data and accepts every push
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl RemoteStore for Offline {
    async fn fetch(&self, _id: &DocumentId) -> Result<Option<RemoteDocument>> {
        Ok(None)
    }

    async fn push(&self, _message: &PushMessage) -> Result<()> {
        Ok(())
    }
}
