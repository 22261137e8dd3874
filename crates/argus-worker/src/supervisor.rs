//! Source registry and capture worker supervision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use argus_media::BadFrameChecker;
use argus_models::SourceConfig;
use tracing::{error, info, warn};

use crate::backoff::{Backoff, RestartTracker};
use crate::capture::{CaptureFactory, CaptureSettings, CaptureWorker};
use crate::config::EngineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::frame_buffer::FrameBuffer;
use crate::metrics;

/// A configured source and its frame buffer, as seen by the main loop.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    pub config: Arc<SourceConfig>,
    pub buffer: Arc<FrameBuffer>,
}

struct SourceSlot {
    handle: SourceHandle,
    checker: Option<Arc<BadFrameChecker>>,
    worker: Option<JoinHandle<()>>,
    started_at: Option<Instant>,
    next_start: Option<Instant>,
    tracker: RestartTracker,
    restarts: u64,
}

impl SourceSlot {
    fn is_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

/// Tracks one capture worker per configured source and restarts dead ones.
pub struct SourceRegistry {
    slots: Vec<SourceSlot>,
    factory: Arc<dyn CaptureFactory>,
    settings: CaptureSettings,
    backoff: Backoff,
    stop: Arc<AtomicBool>,
}

impl SourceRegistry {
    /// Build the registry; bad-frame templates are loaded here so a broken
    /// template fails startup.
    pub fn new(
        sources: &[SourceConfig],
        engine: &EngineConfig,
        factory: Arc<dyn CaptureFactory>,
    ) -> WorkerResult<Self> {
        let mut slots = Vec::with_capacity(sources.len());
        for config in sources {
            let checker = match &config.bad_frame_checker {
                Some(checker_config) => Some(Arc::new(
                    BadFrameChecker::from_config(checker_config).map_err(|e| {
                        WorkerError::config_error(format!(
                            "source {}: bad frame checker: {}",
                            config.name, e
                        ))
                    })?,
                )),
                None => None,
            };
            slots.push(SourceSlot {
                handle: SourceHandle {
                    config: Arc::new(config.clone()),
                    buffer: Arc::new(FrameBuffer::new(engine.buffer_capacity)),
                },
                checker,
                worker: None,
                started_at: None,
                next_start: None,
                tracker: RestartTracker::default(),
                restarts: 0,
            });
        }

        Ok(Self {
            slots,
            factory,
            settings: CaptureSettings::from(engine),
            backoff: Backoff::new(
                Duration::from_millis(engine.restart_backoff_base_ms),
                Duration::from_millis(engine.restart_backoff_max_ms),
            ),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start a worker for every source whose worker is not alive.
    ///
    /// Returns how many workers were started.
    pub fn supervise(&mut self, now: Instant) -> usize {
        if self.stop.load(Ordering::SeqCst) {
            return 0;
        }

        let mut started = 0;
        for slot in &mut self.slots {
            if slot.is_alive() {
                continue;
            }

            if let Some(worker) = slot.worker.take() {
                let name = &slot.handle.config.name;
                if worker.join().is_err() {
                    error!(source = %name, "Capture worker panicked");
                }
                let uptime = slot
                    .started_at
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or_default();
                let delay = slot.tracker.record_exit(uptime, &self.backoff);
                slot.next_start = Some(now + delay);
                if !delay.is_zero() {
                    warn!(
                        source = %name,
                        delay_ms = delay.as_millis() as u64,
                        "Capture worker died quickly, delaying restart"
                    );
                }
            }

            if slot.next_start.is_some_and(|t| now < t) {
                continue;
            }

            let restarting = slot.started_at.is_some();
            if Self::spawn_worker(slot, &self.factory, self.settings, &self.stop, now) {
                started += 1;
                if restarting {
                    slot.restarts += 1;
                    info!(
                        source = %slot.handle.config.name,
                        restarts = slot.restarts,
                        "Capture worker restarted"
                    );
                    metrics::record_capture_restart(&slot.handle.config.name);
                }
            } else {
                slot.next_start = Some(now + self.settings.reconnect_delay);
            }
        }
        started
    }

    fn spawn_worker(
        slot: &mut SourceSlot,
        factory: &Arc<dyn CaptureFactory>,
        settings: CaptureSettings,
        stop: &Arc<AtomicBool>,
        now: Instant,
    ) -> bool {
        let worker = CaptureWorker {
            config: Arc::clone(&slot.handle.config),
            buffer: Arc::clone(&slot.handle.buffer),
            checker: slot.checker.clone(),
            factory: Arc::clone(factory),
            settings,
            stop: Arc::clone(stop),
        };
        let name = slot.handle.config.name.clone();

        match std::thread::Builder::new()
            .name(format!("capture-{}", name))
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                slot.worker = Some(handle);
                slot.started_at = Some(now);
                slot.next_start = None;
                true
            }
            Err(e) => {
                error!(source = %name, error = %e, "Failed to spawn capture thread");
                false
            }
        }
    }

    /// Sources in configuration order.
    pub fn handles(&self) -> Vec<SourceHandle> {
        self.slots.iter().map(|s| s.handle.clone()).collect()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|s| s.handle.config.name.clone())
            .collect()
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.slot(name).is_some_and(SourceSlot::is_alive)
    }

    /// Restarts performed for a source since startup.
    pub fn restarts(&self, name: &str) -> u64 {
        self.slot(name).map_or(0, |s| s.restarts)
    }

    fn slot(&self, name: &str) -> Option<&SourceSlot> {
        self.slots.iter().find(|s| s.handle.config.name == name)
    }

    /// Ask every worker to stop. Workers blocked in a read exit with the
    /// process.
    pub fn stop_all(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        info!(sources = self.slots.len(), "Capture workers stopping");
    }
}
