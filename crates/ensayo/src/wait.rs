//! Wait primitives.
//!
//! Everything that waits in Ensayo waits on a condition with a deadline:
//! load states are polled, element lookups are polled, and actions are
//! retried until the element becomes actionable. Nothing sleeps for a fixed
//! amount of time except the explicit `wait` step and the configured
//! inter-action delay.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// LOAD STATE
// =============================================================================

/// Document load states, ordered by progress
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Navigation committed; the new document exists
    Commit,
    /// `DOMContentLoaded` fired (readyState "interactive")
    #[serde(alias = "domcontentloaded", alias = "dom_content_loaded")]
    DomContentLoaded,
    /// `load` fired (readyState "complete")
    #[default]
    Load,
}

impl LoadState {
    /// Get the JavaScript event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::Load => "load",
        }
    }

    /// Map a `document.readyState` value
    #[must_use]
    pub fn from_ready_state(ready_state: &str) -> Self {
        match ready_state {
            "complete" => Self::Load,
            "interactive" => Self::DomContentLoaded,
            _ => Self::Commit,
        }
    }

    /// Whether a document in `self` has reached at least `wanted`
    #[must_use]
    pub fn satisfies(self, wanted: Self) -> bool {
        self >= wanted
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

// =============================================================================
// POLLER
// =============================================================================

/// Deadline-bounded polling loop.
///
/// ```ignore
/// let mut poller = Poller::new(timeout, interval);
/// loop {
///     if ready().await { break; }
///     if !poller.tick().await { return Err(timeout_error); }
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    deadline: Instant,
    interval: Duration,
    attempts: u32,
}

impl Poller {
    /// Start polling now, giving up after `timeout`
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            interval: interval.max(Duration::from_millis(1)),
            attempts: 0,
        }
    }

    /// Sleep until the next attempt. Returns `false` once the deadline has
    /// passed; the caller should then make no further attempts.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let wake = (now + self.interval).min(self.deadline);
        tokio::time::sleep_until(wake).await;
        self.attempts += 1;
        true
    }

    /// Time left before the deadline
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Number of completed ticks
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod load_state {
        use super::*;

        #[test]
        fn test_ordering() {
            assert!(LoadState::Load.satisfies(LoadState::DomContentLoaded));
            assert!(LoadState::DomContentLoaded.satisfies(LoadState::Commit));
            assert!(!LoadState::Commit.satisfies(LoadState::DomContentLoaded));
            assert!(LoadState::Load.satisfies(LoadState::Load));
        }

        #[test]
        fn test_ready_state_mapping() {
            assert_eq!(LoadState::from_ready_state("complete"), LoadState::Load);
            assert_eq!(
                LoadState::from_ready_state("interactive"),
                LoadState::DomContentLoaded
            );
            assert_eq!(LoadState::from_ready_state("loading"), LoadState::Commit);
        }

        #[test]
        fn test_serde_names() {
            let state: LoadState = serde_yaml_ng::from_str("domcontentloaded").unwrap_or_default();
            assert_eq!(state, LoadState::DomContentLoaded);
            let state: LoadState = serde_yaml_ng::from_str("commit").unwrap_or_default();
            assert_eq!(state, LoadState::Commit);
            assert_eq!(LoadState::default(), LoadState::Load);
        }
    }

    mod poller {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_ticks_until_deadline() {
            let mut poller = Poller::new(Duration::from_millis(100), Duration::from_millis(30));
            let mut ticks = 0;
            while poller.tick().await {
                ticks += 1;
            }
            // 30, 60, 90, 100 then expired
            assert_eq!(ticks, 4);
            assert!(poller.expired());
            assert_eq!(poller.remaining(), Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_zero_timeout_never_ticks() {
            let mut poller = Poller::new(Duration::ZERO, Duration::from_millis(10));
            assert!(!poller.tick().await);
            assert_eq!(poller.attempts(), 0);
        }
    }
}
