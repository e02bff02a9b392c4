//! Runtime configuration for the store, coordinator, and remote client.
//!
//! Durations are serialized as integer milliseconds so settings files stay
//! readable next to the browser-side values they mirror.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Bounded retry for durable writes.
///
/// Retry `n` (1-based) waits `n * base_delay` before running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Additional attempts after the first write
    pub max_retries: u32,
    #[serde(with = "duration_ms")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Total number of write attempts, first try included
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Timer configuration of the sync coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// How long after the last keystroke the widget still counts as editing
    #[serde(with = "duration_ms")]
    pub editing_window: Duration,
    /// Debounce before pushing local state to the remote while editing
    #[serde(with = "duration_ms")]
    pub broadcast_debounce: Duration,
    /// Debounce before mirroring the in-memory document to the local store
    #[serde(with = "duration_ms")]
    pub persist_debounce: Duration,
    /// Idle poll period while the page is in the foreground
    #[serde(with = "duration_ms")]
    pub visible_poll_interval: Duration,
    /// Idle poll period while the page is hidden
    #[serde(with = "duration_ms")]
    pub hidden_poll_interval: Duration,
    /// Period of the activity re-evaluation tick
    #[serde(with = "duration_ms")]
    pub activity_tick: Duration,
    /// Write retries of the durable store. The coordinator does not read
    /// this; hosts pass it to `DurableStore::new` when they build the store.
    pub retry: RetryPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            editing_window: Duration::from_millis(800),
            broadcast_debounce: Duration::from_millis(300),
            persist_debounce: Duration::from_millis(800),
            visible_poll_interval: Duration::from_millis(800),
            hidden_poll_interval: Duration::from_millis(5000),
            activity_tick: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncSettings {
    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject zero-length periods that would spin the coordinator
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("visible_poll_interval", self.visible_poll_interval),
            ("hidden_poll_interval", self.hidden_poll_interval),
            ("activity_tick", self.activity_tick),
        ];
        for (name, period) in periods {
            if period.is_zero() {
                return Err(Error::InvalidInput(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}

/// Where the remote store service lives and how to authenticate to it
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Bearer credential supplied by the session layer
    pub token: Option<String>,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Create a remote configuration, normalizing the base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = non_blank(base_url.into())
            .ok_or_else(|| Error::InvalidInput("remote base URL must not be empty".into()))?;
        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|error| Error::InvalidInput(format!("remote base URL: {error}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidInput(
                "remote base URL must use http or https".into(),
            ));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        })
    }

    /// Attach a bearer token; blank tokens are ignored
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.and_then(non_blank);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
