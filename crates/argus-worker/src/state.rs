//! Shared per-source runtime state.
//!
//! One mutex per map. Each grant reads and updates its gate inside the same
//! lock, so two concurrent callers can never both be granted from a stale
//! read. Entries are created lazily on first use and live for the process.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::config::EngineConfig;
use crate::throttle::{millis, seconds, MultiHitConfirmation, NotifyThrottle, SaveThrottle};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Gate parameters shared by every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSettings {
    pub silence: Duration,
    pub confirmation_window: Duration,
    pub confirmation_threshold: usize,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ThrottleSettings {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            silence: seconds(engine.silence_secs),
            confirmation_window: millis(engine.confirmation_window_ms),
            confirmation_threshold: engine.confirmation_threshold.max(1),
        }
    }
}

/// Throttle and request state for every source, safe to share between the
/// result processor and the control listener.
#[derive(Debug, Default)]
pub struct SourceStateStore {
    settings: ThrottleSettings,
    saves: Mutex<HashMap<String, SaveThrottle>>,
    detected_saves: Mutex<HashMap<String, SaveThrottle>>,
    silences: Mutex<HashMap<String, NotifyThrottle>>,
    confirmations: Mutex<HashMap<String, MultiHitConfirmation>>,
    last_important: Mutex<HashMap<String, DateTime<Utc>>>,
    photo_requests: Mutex<HashSet<String>>,
}

impl SourceStateStore {
    pub fn new(settings: ThrottleSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Regular save cadence.
    pub fn allow_save(&self, source: &str, now: DateTime<Utc>, interval: Duration) -> bool {
        lock(&self.saves)
            .entry(source.to_string())
            .or_default()
            .is_allowed(now, interval)
    }

    /// Tightened save cadence after an important detection.
    pub fn allow_detected_save(&self, source: &str, now: DateTime<Utc>, interval: Duration) -> bool {
        lock(&self.detected_saves)
            .entry(source.to_string())
            .or_default()
            .is_allowed(now, interval)
    }

    /// Silence-window gate; a grant starts a new silence window.
    ///
    /// Evaluate it last: a grant is consumed even if the caller then decides
    /// not to notify.
    pub fn allow_notify(&self, source: &str, now: DateTime<Utc>) -> bool {
        lock(&self.silences)
            .entry(source.to_string())
            .or_default()
            .is_allowed(now, self.settings.silence)
    }

    /// Record an important detection in the source's multi-hit window.
    ///
    /// Returns `true` once the configured number of hits fall inside the
    /// window; the window is then emptied, so the next confirmation needs a
    /// full new set of hits.
    pub fn confirm_detection(&self, source: &str, now: DateTime<Utc>) -> bool {
        let settings = self.settings;
        lock(&self.confirmations)
            .entry(source.to_string())
            .or_insert_with(|| {
                MultiHitConfirmation::new(
                    settings.confirmation_window,
                    settings.confirmation_threshold,
                )
            })
            .on_detect(now)
    }

    pub fn record_important_detection(&self, source: &str, now: DateTime<Utc>) {
        lock(&self.last_important).insert(source.to_string(), now);
    }

    pub fn last_important_detection(&self, source: &str) -> Option<DateTime<Utc>> {
        lock(&self.last_important).get(source).copied()
    }

    pub fn silence_until(&self, source: &str) -> Option<DateTime<Utc>> {
        lock(&self.silences)
            .get(source)
            .and_then(NotifyThrottle::silence_until)
    }

    /// Clear every source's silence window.
    pub fn clear_silence_all(&self) {
        for throttle in lock(&self.silences).values_mut() {
            throttle.clear();
        }
    }

    /// Queue a one-shot photo send for each named source.
    pub fn request_photos<'a, I>(&self, sources: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut requests = lock(&self.photo_requests);
        for source in sources {
            requests.insert(source.to_string());
        }
    }

    /// Consume the pending photo request for a source.
    pub fn take_photo_request(&self, source: &str) -> bool {
        lock(&self.photo_requests).remove(source)
    }
}
