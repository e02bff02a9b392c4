//! Wall-clock source for logical timestamps.

/// Source of millisecond timestamps used to stamp local writes.
///
/// The coordinator never trusts this value to be monotonic on its own; it
/// clamps every new timestamp above the previous one.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
