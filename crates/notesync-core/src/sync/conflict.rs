//! Last-writer-wins reconciliation of remote payloads

use crate::models::Document;
use crate::remote::RemoteDocument;

/// Result of comparing an incoming remote payload with local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Discarded because the user is typing
    EditInProgress,
    /// Discarded because it is not newer than local state
    Stale,
    /// Newer, but carries what we already have
    Identical,
    /// Newer and different; local state takes it
    Adopt,
}

impl Resolution {
    pub const fn is_adopted(self) -> bool {
        matches!(self, Self::Adopt)
    }
}

/// Decide whether `remote` replaces `local`.
///
/// Local edits always win while `editing`; otherwise the strictly greater
/// `updated_at` wins. Equal timestamps keep local state.
pub fn resolve(editing: bool, local: &Document, remote: &RemoteDocument) -> Resolution {
    if editing {
        Resolution::EditInProgress
    } else if remote.updated_at <= local.updated_at {
        Resolution::Stale
    } else if remote.content == local.content && remote.mode == local.mode {
        Resolution::Identical
    } else {
        Resolution::Adopt
    }
}

/// Apply an adopted remote payload to the local document
pub fn adopt(local: &mut Document, remote: &RemoteDocument) {
    local.content.clone_from(&remote.content);
    local.mode = remote.mode;
    local.updated_at = remote.updated_at;
}
