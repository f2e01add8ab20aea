//! Fixed-count, fixed-delay retry.

use super::strategy::BackoffStrategy;
use std::time::Duration;

/// Retry policy with a fixed attempt budget and a constant pause between
/// failed attempts.
///
/// There is no exponential growth and no jitter: callers and tests rely on
/// the cadence being exactly `delay` between attempts.
///
/// # Examples
///
/// ```rust
/// use toolpipe_core::retry::{BackoffStrategy, FixedDelay};
/// use std::time::Duration;
///
/// let policy = FixedDelay::new(5, Duration::from_secs(2));
/// assert_eq!(policy.max_attempts(), 5);
/// assert_eq!(policy.next_delay(1), Some(Duration::from_secs(2)));
/// assert_eq!(policy.next_delay(4), Some(Duration::from_secs(2)));
/// // No pause after the last attempt.
/// assert_eq!(policy.next_delay(5), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
}

impl FixedDelay {
    /// Create a policy making at most `max_attempts` attempts, pausing
    /// `delay` after each failed one except the last.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// The pause between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    /// Five attempts, two seconds apart.
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

impl BackoffStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
