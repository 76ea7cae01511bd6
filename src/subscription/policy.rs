//! Reconnect decision logic
//!
//! Pure policy: given the attempt count and completion flag, decide whether
//! to reconnect and how long to wait. The caller owns the attempt counter.

use std::time::Duration;

/// Default reconnect attempt ceiling
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay between reconnect attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Bounded fixed-delay reconnect policy
///
/// Ingestion tasks are short-lived, so the delay is fixed rather than
/// exponential: a subscriber either reattaches within a few seconds or the
/// task is already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts per subscription
    pub max_attempts: u32,

    /// Fixed delay before each attempt
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with an explicit ceiling and delay
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Whether another reconnect attempt is permitted.
    ///
    /// Never reconnects once a terminal snapshot has been seen, and never
    /// past the configured ceiling.
    pub fn should_reconnect(&self, attempt: u32, is_complete: bool) -> bool {
        if is_complete {
            return false;
        }
        attempt < self.max_attempts
    }

    /// Delay before the given attempt. Fixed, independent of attempt count.
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(3000));
    }

    #[test]
    fn test_no_reconnect_after_completion() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.should_reconnect(0, true));
        assert!(!policy.should_reconnect(3, true));
    }

    #[test]
    fn test_ceiling() {
        let policy = ReconnectPolicy::default();
        assert!(policy.should_reconnect(0, false));
        assert!(policy.should_reconnect(4, false));
        assert!(!policy.should_reconnect(5, false));
        assert!(!policy.should_reconnect(6, false));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::new(5, Duration::from_millis(3000));
        for attempt in 0..10 {
            assert_eq!(policy.delay_for(attempt), Duration::from_millis(3000));
        }
    }

    #[test]
    fn test_attempts_bounded_by_ceiling() {
        // N consecutive closures yield min(N, ceiling) permitted attempts
        let policy = ReconnectPolicy::new(5, Duration::from_millis(1));
        for closures in [1u32, 2, 5, 6, 20] {
            let mut attempts = 0;
            for _ in 0..closures {
                if policy.should_reconnect(attempts, false) {
                    attempts += 1;
                }
            }
            assert_eq!(attempts, closures.min(5));
        }
    }

    #[test]
    fn test_zero_ceiling_never_reconnects() {
        let policy = ReconnectPolicy::new(0, Duration::from_millis(3000));
        assert!(!policy.should_reconnect(0, false));
    }
}
