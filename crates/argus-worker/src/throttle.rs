//! Per-source rate gates.
//!
//! Every gate is evaluated against a caller-supplied timestamp so that all
//! gates of one detection cycle agree on "now".

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Longest interval a gate accepts; larger config values are clamped.
const MAX_INTERVAL_SECS: u64 = 100 * 365 * 24 * 3600;

/// Convert configured seconds into a chrono duration.
pub fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_INTERVAL_SECS) as i64)
}

/// Convert configured milliseconds into a chrono duration.
pub fn millis(ms: u64) -> Duration {
    Duration::milliseconds(ms.min(MAX_INTERVAL_SECS * 1000) as i64)
}

/// Grants at most one save per interval.
#[derive(Debug, Default, Clone)]
pub struct SaveThrottle {
    last_allowed: Option<DateTime<Utc>>,
}

impl SaveThrottle {
    pub fn is_allowed(&mut self, now: DateTime<Utc>, interval: Duration) -> bool {
        let allowed = match self.last_allowed {
            None => true,
            Some(last) => now - last >= interval,
        };
        if allowed {
            self.last_allowed = Some(now);
        }
        allowed
    }

    pub fn last_allowed(&self) -> Option<DateTime<Utc>> {
        self.last_allowed
    }
}

/// Silence window after a notification.
#[derive(Debug, Default, Clone)]
pub struct NotifyThrottle {
    silence_until: Option<DateTime<Utc>>,
}

impl NotifyThrottle {
    /// Notifications are suppressed at or before `silence_until`.
    pub fn is_allowed(&mut self, now: DateTime<Utc>, silence: Duration) -> bool {
        let allowed = match self.silence_until {
            None => true,
            Some(until) => now > until,
        };
        if allowed {
            self.silence_until = Some(now + silence);
        }
        allowed
    }

    pub fn clear(&mut self) {
        self.silence_until = None;
    }

    pub fn silence_until(&self) -> Option<DateTime<Utc>> {
        self.silence_until
    }
}

/// Requires several detections inside a sliding window.
#[derive(Debug, Clone)]
pub struct MultiHitConfirmation {
    hits: VecDeque<DateTime<Utc>>,
    window: Duration,
    threshold: usize,
}

impl MultiHitConfirmation {
    pub fn new(window: Duration, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            hits: VecDeque::with_capacity(threshold),
            window,
            threshold,
        }
    }

    /// Record a detection; true once enough hits fall inside the window.
    /// A confirmation empties the window.
    pub fn on_detect(&mut self, now: DateTime<Utc>) -> bool {
        self.hits.push_back(now);
        while let Some(&oldest) = self.hits.front() {
            if now - oldest > self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
        if self.hits.len() >= self.threshold {
            self.hits.clear();
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        at(0) + Duration::milliseconds(ms)
    }

    #[test]
    fn test_save_throttle_interval() {
        let mut throttle = SaveThrottle::default();
        let interval = Duration::seconds(30);

        assert!(throttle.is_allowed(at(0), interval));
        assert!(!throttle.is_allowed(at(29), interval));
        assert!(throttle.is_allowed(at(30), interval));
        assert_eq!(throttle.last_allowed(), Some(at(30)));
    }

    #[test]
    fn test_save_throttle_denial_keeps_state() {
        let mut throttle = SaveThrottle::default();
        let interval = Duration::seconds(10);

        assert!(throttle.is_allowed(at(0), interval));
        assert!(!throttle.is_allowed(at(5), interval));
        // The denied call at 5 must not push the next grant out
        assert!(throttle.is_allowed(at(10), interval));
    }

    #[test]
    fn test_notify_throttle_silence() {
        let mut throttle = NotifyThrottle::default();
        let silence = Duration::seconds(1800);

        assert!(throttle.is_allowed(at(0), silence));
        assert!(!throttle.is_allowed(at(10), silence));
        assert!(!throttle.is_allowed(at(1800), silence));
        assert!(throttle.is_allowed(at(1801), silence));
        assert_eq!(throttle.silence_until(), Some(at(3601)));
    }

    #[test]
    fn test_notify_throttle_clear() {
        let mut throttle = NotifyThrottle::default();
        let silence = Duration::seconds(1800);

        assert!(throttle.is_allowed(at(0), silence));
        throttle.clear();
        assert!(throttle.is_allowed(at(1), silence));
    }

    #[test]
    fn test_confirmation_within_window() {
        let mut confirm = MultiHitConfirmation::new(Duration::seconds(3), 5);

        for i in 0..4 {
            assert!(!confirm.on_detect(at_ms(i * 500)));
        }
        assert!(confirm.on_detect(at_ms(2_000)));
        assert!(confirm.is_empty());
    }

    #[test]
    fn test_confirmation_spread_never_fires() {
        let mut confirm = MultiHitConfirmation::new(Duration::seconds(3), 5);

        for i in 0..20 {
            assert!(!confirm.on_detect(at_ms(i * 1_000)));
        }
        assert!(confirm.len() <= 4);
    }

    #[test]
    fn test_confirmation_window_edge_is_inclusive() {
        let mut confirm = MultiHitConfirmation::new(Duration::seconds(3), 2);

        assert!(!confirm.on_detect(at(0)));
        // Exactly one window apart still counts
        assert!(confirm.on_detect(at(3)));
    }

    #[test]
    fn test_threshold_one_confirms_every_hit() {
        let mut confirm = MultiHitConfirmation::new(Duration::seconds(3), 1);
        assert!(confirm.on_detect(at(0)));
        assert!(confirm.on_detect(at(0)));
    }

    #[test]
    fn test_interval_clamping() {
        assert_eq!(seconds(30), Duration::seconds(30));
        assert_eq!(millis(1_500), Duration::milliseconds(1_500));
        assert!(seconds(u64::MAX) > Duration::days(365));
    }
}
