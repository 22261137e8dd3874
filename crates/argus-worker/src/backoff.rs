//! Exponential backoff for restarting capture workers.

use std::time::Duration;

/// Delay doubling per attempt, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay of the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Calculate delay for a given attempt number (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Restart bookkeeping for one source.
///
/// The first restart after a healthy run is immediate; each further restart
/// of a worker that died young waits one backoff step longer. A worker that
/// stayed up longer than the maximum delay resets the sequence.
#[derive(Debug, Default)]
pub struct RestartTracker {
    consecutive_restarts: u32,
}

impl RestartTracker {
    /// Record a worker death after `uptime`; returns the delay before the
    /// replacement may start.
    pub fn record_exit(&mut self, uptime: Duration, backoff: &Backoff) -> Duration {
        if uptime > backoff.max_delay {
            self.consecutive_restarts = 0;
        }
        let delay = match self.consecutive_restarts {
            0 => Duration::ZERO,
            n => backoff.delay_for_attempt(n - 1),
        };
        self.consecutive_restarts = self.consecutive_restarts.saturating_add(1);
        delay
    }

    pub fn consecutive_restarts(&self) -> u32 {
        self.consecutive_restarts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(16));
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(backoff.delay_for_attempt(40), Duration::from_secs(30));
    }

    #[test]
    fn test_first_restart_is_immediate_then_backs_off() {
        let backoff = Backoff::default();
        let mut tracker = RestartTracker::default();
        let short = Duration::from_millis(10);

        assert_eq!(tracker.record_exit(short, &backoff), Duration::ZERO);
        assert_eq!(tracker.record_exit(short, &backoff), Duration::from_secs(1));
        assert_eq!(tracker.record_exit(short, &backoff), Duration::from_secs(2));
        assert_eq!(tracker.consecutive_restarts(), 3);
    }

    #[test]
    fn test_long_uptime_resets() {
        let backoff = Backoff::default();
        let mut tracker = RestartTracker::default();
        let short = Duration::from_millis(10);

        tracker.record_exit(short, &backoff);
        tracker.record_exit(short, &backoff);
        assert_eq!(
            tracker.record_exit(Duration::from_secs(31), &backoff),
            Duration::ZERO
        );
    }
}
