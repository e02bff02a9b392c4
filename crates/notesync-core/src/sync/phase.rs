//! Activity/visibility state and the timers each state requires

use std::time::Duration;

use crate::config::SyncSettings;

/// Combined activity and visibility state of one widget instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// A keystroke or focus event happened inside the editing window
    Editing,
    Idle { visible: bool },
}

impl SyncPhase {
    pub const fn from_signals(editing: bool, visible: bool) -> Self {
        if editing {
            Self::Editing
        } else {
            Self::Idle { visible }
        }
    }

    pub const fn is_editing(self) -> bool {
        matches!(self, Self::Editing)
    }

    /// Timer configuration this phase calls for
    pub const fn plan(self, settings: &SyncSettings) -> TimerPlan {
        match self {
            Self::Editing => TimerPlan::Broadcast,
            Self::Idle { visible: true } => TimerPlan::Poll(settings.visible_poll_interval),
            Self::Idle { visible: false } => TimerPlan::Poll(settings.hidden_poll_interval),
        }
    }
}

/// Which sync direction is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPlan {
    /// Push local changes after the broadcast debounce; no polling
    Broadcast,
    /// Pull remote state every `interval`; no broadcasting
    Poll(Duration),
}

impl TimerPlan {
    pub const fn poll_interval(self) -> Option<Duration> {
        match self {
            Self::Broadcast => None,
            Self::Poll(interval) => Some(interval),
        }
    }
}

/// What to do with the idle-poll timer after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollChange {
    /// Leave the running timer (or its absence) alone
    Keep,
    /// Tear down any running timer and start one with this period
    Start(Duration),
    Stop,
}

/// Decide how the poll timer changes given its current period and the new plan.
///
/// A running timer is only recreated when the period actually differs.
pub fn poll_change(current: Option<Duration>, plan: TimerPlan) -> PollChange {
    match (current, plan.poll_interval()) {
        (Some(running), Some(wanted)) if running == wanted => PollChange::Keep,
        (_, Some(wanted)) => PollChange::Start(wanted),
        (Some(_), None) => PollChange::Stop,
        (None, None) => PollChange::Keep,
    }
}
