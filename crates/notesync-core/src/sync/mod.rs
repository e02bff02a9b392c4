//! Keeps a widget's in-memory document consistent with the remote copy.
//!
//! One task per document owns the state and every timer: it broadcasts local
//! changes while the user is editing and polls the remote while idle, never
//! letting a remote payload overwrite an edit in progress.

mod conflict;
mod coordinator;
mod phase;

pub use conflict::{adopt, resolve, Resolution};
pub use coordinator::{SaveOutcome, SyncCoordinator, SyncHandle};
pub use phase::{poll_change, PollChange, SyncPhase, TimerPlan};
