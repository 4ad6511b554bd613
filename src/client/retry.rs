//! Retry policy for GET requests.

use std::time::Duration;

/// How often a timed-out GET is sent again, and how long to wait between
/// attempts.
///
/// Only timeouts are retried. A request that fails outright (unreachable
/// peer, rejected by the agent) is reported on the first attempt.
///
/// # Examples
///
/// ```rust
/// use snmp_alarm::Retry;
/// use std::time::Duration;
///
/// // Send once, never again
/// let retry = Retry::none();
/// assert_eq!(retry.max_attempts, 0);
///
/// // Two retries, 200ms apart
/// let retry = Retry::fixed(2, Duration::from_millis(200));
/// assert_eq!(retry.compute_delay(1), Duration::from_millis(200));
///
/// // 100ms, 200ms, 400ms, capped at 1s
/// let retry = Retry::doubling(4, Duration::from_millis(100), Duration::from_secs(1));
/// assert_eq!(retry.compute_delay(2), Duration::from_millis(400));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retry {
    /// Maximum number of retries (0 = request sent once).
    pub max_attempts: u32,
    /// Delay strategy between attempts.
    pub backoff: Backoff,
}

/// Delay between retry attempts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,

    /// Wait the same delay before each retry.
    Fixed {
        /// Delay before each retry
        delay: Duration,
    },

    /// Double the delay after each attempt, up to `max`.
    Doubling {
        /// Delay before the first retry
        initial: Duration,
        /// Upper bound on any single delay
        max: Duration,
    },
}

impl Default for Retry {
    /// Two retries with no delay, so at most three attempts.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Backoff::None,
        }
    }
}

impl Retry {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: Backoff::None,
        }
    }

    /// `attempts` retries sent immediately after each timeout.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::None,
        }
    }

    /// `attempts` retries with a fixed `delay` before each.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// `attempts` retries whose delay starts at `initial` and doubles up to
    /// `max`.
    pub fn doubling(attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Doubling { initial, max },
        }
    }

    /// Total number of times a request may be sent.
    pub fn total_attempts(&self) -> u32 {
        self.max_attempts.saturating_add(1)
    }

    /// Delay before retry number `attempt` (0-based: the wait after the
    /// first timeout is `compute_delay(0)`).
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Doubling { initial, max } => {
                let shift = attempt.min(31);
                let multiplier = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
                initial.saturating_mul(multiplier).min(*max)
            }
        }
    }
}
