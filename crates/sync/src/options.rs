//! Timing knobs for the sync controller.

use std::time::Duration;

/// Timing configuration for an [`AuthorizationSession`](crate::AuthorizationSession).
///
/// Defaults suit an interactive client: changes settle within a couple of
/// hundred milliseconds, failures back off quickly at first, and a dead
/// change feed degrades to half-minute polling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// How long to sit on a change notice before refetching, so a burst of
    /// notices collapses into one fetch round.
    pub debounce_window: Duration,
    /// Delay before the first retry after a failed fetch.
    pub initial_backoff: Duration,
    /// Ceiling for the doubling retry delay.
    pub max_backoff: Duration,
    /// Refresh cadence while the change feed is down.
    pub poll_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(100),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl SyncOptions {
    pub fn with_debounce_window(mut self, debounce_window: Duration) -> Self {
        self.debounce_window = debounce_window;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
