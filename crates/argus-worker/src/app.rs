//! Application wiring and the main loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use argus_media::Detector;
use argus_notify::{DispatchWorker, NotificationDispatcher, Notifier};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::alarm::AlarmSystem;
use crate::capture::CaptureFactory;
use crate::config::AppConfig;
use crate::control::{ControlHandler, ControlListener};
use crate::error::WorkerResult;
use crate::fatal::{fatal_channel, FatalSender, ShutdownReason};
use crate::frame_item::FrameItem;
use crate::gateway::{DetectorGateway, InferenceOutcome};
use crate::processor::ResultProcessor;
use crate::state::{SourceStateStore, ThrottleSettings};
use crate::supervisor::{SourceHandle, SourceRegistry};
use crate::watchdog::run_watchdog;

/// How long shutdown waits for queued results and notifications.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Application {
    config: AppConfig,
    registry: SourceRegistry,
    sources: Vec<SourceHandle>,
    gateway: DetectorGateway,
    detector: Arc<dyn Detector>,
    processor: ResultProcessor,
    results_rx: mpsc::Receiver<InferenceOutcome>,
    dispatcher: NotificationDispatcher,
    dispatch_worker: DispatchWorker,
    control: Option<ControlListener>,
    state: Arc<SourceStateStore>,
    alarm: Arc<AlarmSystem>,
    fatal: FatalSender,
    fatal_rx: mpsc::Receiver<ShutdownReason>,
}

impl Application {
    /// Wire every component. Binds the control listener; nothing runs until
    /// [`Application::run`].
    pub async fn build(
        config: AppConfig,
        detector: Arc<dyn Detector>,
        notifiers: Vec<Arc<dyn Notifier>>,
        factory: Arc<dyn CaptureFactory>,
    ) -> WorkerResult<Self> {
        config.validate()?;

        let (fatal, fatal_rx) = fatal_channel();
        let registry = SourceRegistry::new(&config.sources, &config.engine, factory)?;
        let sources = registry.handles();

        let state = Arc::new(SourceStateStore::new(ThrottleSettings::from(&config.engine)));
        let alarm = Arc::new(AlarmSystem::new(&config.alarm.state_file));
        let (dispatcher, dispatch_worker) =
            NotificationDispatcher::new(notifiers, config.notify.queue_capacity);
        let dispatch_worker = dispatch_worker.with_delivery_timeout(config.notify.delivery_timeout());

        let (results_tx, results_rx) = mpsc::channel(config.engine.max_in_flight * 2);
        let gateway = DetectorGateway::new(
            Arc::clone(&detector),
            config.engine.max_in_flight,
            results_tx,
            fatal.clone(),
        );
        let processor =
            ResultProcessor::new(Arc::clone(&state), Arc::clone(&alarm), dispatcher.clone());

        let control = if config.control.enabled {
            let handler = Arc::new(ControlHandler::new(
                Arc::clone(&alarm),
                Arc::clone(&state),
                dispatcher.clone(),
                registry.source_names(),
            ));
            Some(ControlListener::bind(config.control.listen, handler, fatal.clone()).await?)
        } else {
            None
        };

        info!(
            sources = sources.len(),
            detector = detector.name(),
            armed = alarm.is_armed(),
            "Argus engine built"
        );

        Ok(Self {
            config,
            registry,
            sources,
            gateway,
            detector,
            processor,
            results_rx,
            dispatcher,
            dispatch_worker,
            control,
            state,
            alarm,
            fatal,
            fatal_rx,
        })
    }

    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.control.as_ref().and_then(|c| c.local_addr().ok())
    }

    pub fn state(&self) -> Arc<SourceStateStore> {
        Arc::clone(&self.state)
    }

    pub fn alarm(&self) -> Arc<AlarmSystem> {
        Arc::clone(&self.alarm)
    }

    /// Run until a component reports a shutdown reason or `shutdown`
    /// resolves. Returns the reason, `None` for a graceful stop.
    pub async fn run<F>(self, shutdown: F) -> WorkerResult<Option<ShutdownReason>>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            mut registry,
            sources,
            gateway,
            detector,
            processor,
            results_rx,
            dispatcher,
            dispatch_worker,
            control,
            fatal,
            mut fatal_rx,
            ..
        } = self;

        let dispatch_task = tokio::spawn(dispatch_worker.run());
        let processor_task = tokio::spawn(processor.run(results_rx));
        let mut background: Vec<JoinHandle<()>> = Vec::new();
        if let Some(control) = control {
            background.push(tokio::spawn(control.run()));
        }
        let watchdog_interval = config.engine.watchdog_interval();
        if watchdog_interval.is_zero() {
            info!("Watchdog disabled");
        } else {
            background.push(tokio::spawn(run_watchdog(
                Arc::clone(&detector),
                watchdog_interval,
                fatal.clone(),
            )));
        }

        let mut ticker = tokio::time::interval(config.engine.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rotation = 0usize;
        tokio::pin!(shutdown);

        info!(
            tick_ms = config.engine.tick_ms,
            max_in_flight = gateway.max_in_flight(),
            "Main loop started"
        );
        let reason = loop {
            tokio::select! {
                reason = fatal_rx.recv() => break reason,
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break None;
                }
                _ = ticker.tick() => {
                    registry.supervise(Instant::now());
                    submit_ready(
                        &gateway,
                        &sources,
                        config.engine.detected_save_every_sec,
                        &mut rotation,
                    );
                }
            }
        };

        registry.stop_all();
        for task in &background {
            task.abort();
        }
        drop(gateway);
        drop(dispatcher);

        match &reason {
            Some(failure) if failure.exit_code() != 0 => {
                // Results still arriving come from a failed run: nothing more
                // is saved or sent.
                info!(%failure, "Stopping without draining");
                processor_task.abort();
                dispatch_task.abort();
            }
            _ => {
                drain("result processor", processor_task).await;
                drain("notification dispatcher", dispatch_task).await;
            }
        }

        Ok(reason)
    }
}

/// Wait for a task to finish its queued work, abandoning it after
/// [`DRAIN_TIMEOUT`].
async fn drain(name: &'static str, mut task: JoinHandle<()>) {
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await.is_err() {
        warn!(task = name, "Did not drain in time");
        task.abort();
    }
}

/// Submit the newest frame of every idle source.
///
/// The starting source rotates each tick so a saturated detector does not
/// always serve the same sources first. Capacity is checked before a frame
/// is taken from its buffer, so no frame is popped only to be rejected.
fn submit_ready(
    gateway: &DetectorGateway,
    sources: &[SourceHandle],
    detected_save_every_sec: u64,
    rotation: &mut usize,
) {
    let count = sources.len();
    if count == 0 {
        return;
    }

    for offset in 0..count {
        if !gateway.has_capacity() {
            break;
        }
        let source = &sources[(*rotation + offset) % count];
        if gateway.is_busy(&source.config.name) {
            continue;
        }
        let Some(frame) = source.buffer.pop_latest() else {
            continue;
        };

        let item = FrameItem::new(Arc::clone(&source.config), frame, detected_save_every_sec);
        if let Err(e) = gateway.submit(item) {
            debug!(source = %source.config.name, error = %e, "Frame not submitted");
        }
    }
    *rotation = (*rotation + 1) % count;
}
