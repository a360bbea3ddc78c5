//! Stats refresh retry policy
//!
//! The stats tick retries silently; only a run of consecutive failures is
//! surfaced to the user, and surfacing resets the window so the next
//! failure starts a fresh count.

/// Consecutive failures tolerated before one is surfaced
pub const MAX_SILENT_FAILURES: u32 = 3;

/// What the caller should do with a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Swallow the error and wait for the next tick
    RetrySilently,
    /// Surface one user-visible error; the counter has been reset
    Surface,
}

/// Tracks consecutive stats-refresh failures
#[derive(Debug, Default)]
pub struct StatsRefreshPolicy {
    consecutive_failures: u32,
}

impl StatsRefreshPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A refresh succeeded; the failure window closes.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// A refresh failed; decide whether this one is user-visible.
    pub fn record_failure(&mut self) -> FailureAction {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_SILENT_FAILURES {
            self.consecutive_failures = 0;
            FailureAction::Surface
        } else {
            FailureAction::RetrySilently
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
