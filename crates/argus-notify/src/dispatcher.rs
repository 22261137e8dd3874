//! Asynchronous notification hand-off.
//!
//! The result path enqueues commands with `try_send` and never waits on the
//! network. The dispatcher task encodes frames once and fans every command
//! out to one delivery lane per channel. Each lane has its own bounded
//! backlog and task, and every delivery is bounded by a timeout, so a dead
//! broker or a hung HTTP call only loses that channel's notifications.
//! Full queues drop with a warning; delivery failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use argus_media::{encode_jpeg, Frame};
use argus_models::DetectionEvent;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::NotifyResult;
use crate::notifier::Notifier;

/// Default queue capacity, shared by the dispatcher queue and each lane.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Longest a single channel may spend on one delivery.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A queued notification.
#[derive(Debug)]
pub enum DispatchCommand {
    Message(String),
    Frame { frame: Frame, caption: String },
    Event(DetectionEvent),
    RunScene,
    SaveAuthCode(String),
}

impl DispatchCommand {
    fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Frame { .. } => "frame",
            Self::Event(_) => "event",
            Self::RunScene => "run_scene",
            Self::SaveAuthCode(_) => "save_auth_code",
        }
    }
}

/// A command ready for delivery, shared by every lane.
#[derive(Debug, Clone)]
enum Delivery {
    Message(Arc<str>),
    Photo { jpeg: Arc<[u8]>, caption: Arc<str> },
    Event(Arc<DetectionEvent>),
    RunScene,
    SaveAuthCode(Arc<str>),
}

impl Delivery {
    fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Photo { .. } => "frame",
            Self::Event(_) => "event",
            Self::RunScene => "run_scene",
            Self::SaveAuthCode(_) => "save_auth_code",
        }
    }

    async fn deliver(&self, notifier: &dyn Notifier) -> NotifyResult<()> {
        match self {
            Self::Message(text) => notifier.send_message(text).await,
            Self::Photo { jpeg, caption } => notifier.send_photo(jpeg, caption).await,
            Self::Event(event) => notifier.publish_event(event).await,
            Self::RunScene => notifier.run_scene().await,
            Self::SaveAuthCode(code) => notifier.save_auth_code(code).await,
        }
    }
}

/// Non-blocking handle for queuing notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<DispatchCommand>,
}

/// Consumer side; run on its own task.
pub struct DispatchWorker {
    rx: mpsc::Receiver<DispatchCommand>,
    notifiers: Vec<Arc<dyn Notifier>>,
    lane_capacity: usize,
    delivery_timeout: Duration,
}

impl NotificationDispatcher {
    /// Create a dispatcher handle and its unstarted worker.
    ///
    /// # Arguments
    /// * `notifiers` - Channels every command fans out to
    /// * `capacity` - Bound of the shared queue and of each channel's backlog
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>, capacity: usize) -> (Self, DispatchWorker) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let worker = DispatchWorker {
            rx,
            notifiers,
            lane_capacity: capacity,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        };
        (Self { tx }, worker)
    }

    fn enqueue(&self, command: DispatchCommand) -> bool {
        let kind = command.kind();
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind, "Notification queue full, dropping notification");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind, "Notification dispatcher stopped, dropping notification");
                false
            }
        }
    }

    /// Queue a text message. Returns whether it was queued.
    pub fn send_message(&self, text: impl Into<String>) -> bool {
        self.enqueue(DispatchCommand::Message(text.into()))
    }

    /// Queue a frame; it is JPEG-encoded on the dispatcher task.
    pub fn send_frame(&self, frame: Frame, caption: impl Into<String>) -> bool {
        self.enqueue(DispatchCommand::Frame {
            frame,
            caption: caption.into(),
        })
    }

    pub fn publish_event(&self, event: DetectionEvent) -> bool {
        self.enqueue(DispatchCommand::Event(event))
    }

    pub fn run_scene(&self) -> bool {
        self.enqueue(DispatchCommand::RunScene)
    }

    pub fn save_auth_code(&self, code: impl Into<String>) -> bool {
        self.enqueue(DispatchCommand::SaveAuthCode(code.into()))
    }
}

fn log_outcome(channel: &str, kind: &str, result: NotifyResult<()>) {
    match result {
        Ok(()) => debug!(channel, kind, "Notification delivered"),
        Err(e) => warn!(channel, kind, error = %e, "Notification delivery failed"),
    }
}

/// Sending side of one channel's backlog.
struct Lane {
    channel: &'static str,
    accepts_photos: bool,
    tx: mpsc::Sender<Delivery>,
}

impl Lane {
    fn offer(&self, delivery: &Delivery) {
        if matches!(delivery, Delivery::Photo { .. }) && !self.accepts_photos {
            return;
        }
        match self.tx.try_send(delivery.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => warn!(
                channel = self.channel,
                kind = delivery.kind(),
                "Channel backlog full, dropping notification"
            ),
            Err(mpsc::error::TrySendError::Closed(_)) => warn!(
                channel = self.channel,
                kind = delivery.kind(),
                "Channel lane stopped, dropping notification"
            ),
        }
    }
}

async fn run_lane(notifier: Arc<dyn Notifier>, mut rx: mpsc::Receiver<Delivery>, limit: Duration) {
    let channel = notifier.name();
    while let Some(delivery) = rx.recv().await {
        let kind = delivery.kind();
        match tokio::time::timeout(limit, delivery.deliver(notifier.as_ref())).await {
            Ok(result) => log_outcome(channel, kind, result),
            Err(_) => warn!(
                channel,
                kind,
                timeout_ms = limit.as_millis() as u64,
                "Notification delivery timed out"
            ),
        }
    }
}

impl DispatchWorker {
    /// Override the per-delivery timeout.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Drain the queue until every dispatcher handle is dropped, then wait
    /// for the channel lanes to finish their backlog.
    ///
    /// Lane tasks live in a `JoinSet`, so aborting this future stops them too.
    pub async fn run(self) {
        let Self {
            mut rx,
            notifiers,
            lane_capacity,
            delivery_timeout,
        } = self;
        info!(channels = notifiers.len(), "Notification dispatcher started");

        let mut lane_tasks = JoinSet::new();
        let lanes: Vec<Lane> = notifiers
            .into_iter()
            .map(|notifier| {
                let (tx, lane_rx) = mpsc::channel(lane_capacity);
                let lane = Lane {
                    channel: notifier.name(),
                    accepts_photos: notifier.accepts_photos(),
                    tx,
                };
                lane_tasks.spawn(run_lane(notifier, lane_rx, delivery_timeout));
                lane
            })
            .collect();

        while let Some(command) = rx.recv().await {
            if let Some(delivery) = prepare(command, &lanes).await {
                for lane in &lanes {
                    lane.offer(&delivery);
                }
            }
        }

        drop(lanes);
        while lane_tasks.join_next().await.is_some() {}
        info!("Notification dispatcher stopped");
    }
}

/// Turn a command into a shareable delivery. Frames are encoded here, once,
/// and only when some channel takes photos.
async fn prepare(command: DispatchCommand, lanes: &[Lane]) -> Option<Delivery> {
    let delivery = match command {
        DispatchCommand::Message(text) => Delivery::Message(text.into()),
        DispatchCommand::Frame { frame, caption } => {
            if !lanes.iter().any(|lane| lane.accepts_photos) {
                return None;
            }
            let image = frame.shared_image();
            let jpeg = match tokio::task::spawn_blocking(move || encode_jpeg(&image)).await {
                Ok(Ok(jpeg)) => jpeg,
                Ok(Err(e)) => {
                    warn!(error = %e, "Failed to encode frame for notification");
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "Frame encoding task failed");
                    return None;
                }
            };
            Delivery::Photo {
                jpeg: jpeg.into(),
                caption: caption.into(),
            }
        }
        DispatchCommand::Event(event) => Delivery::Event(Arc::new(event)),
        DispatchCommand::RunScene => Delivery::RunScene,
        DispatchCommand::SaveAuthCode(code) => Delivery::SaveAuthCode(code.into()),
    };
    Some(delivery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn send_message(&self, text: &str) -> NotifyResult<()> {
            self.calls.lock().unwrap().push(format!("message:{text}"));
            Ok(())
        }

        async fn send_photo(&self, jpeg: &[u8], caption: &str) -> NotifyResult<()> {
            assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
            self.calls.lock().unwrap().push(format!("photo:{caption}"));
            Ok(())
        }

        async fn publish_event(&self, event: &DetectionEvent) -> NotifyResult<()> {
            self.calls.lock().unwrap().push(format!("event:{}", event.source));
            Ok(())
        }

        fn accepts_photos(&self) -> bool {
            true
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send_message(&self, _text: &str) -> NotifyResult<()> {
            Err(NotifyError::telegram("boom"))
        }
    }

    /// Never answers, like a request to a host that stopped responding.
    struct Hung;

    #[async_trait]
    impl Notifier for Hung {
        fn name(&self) -> &'static str {
            "hung"
        }

        async fn send_message(&self, _text: &str) -> NotifyResult<()> {
            std::future::pending().await
        }

        async fn publish_event(&self, _event: &DetectionEvent) -> NotifyResult<()> {
            std::future::pending().await
        }
    }

    async fn wait_for_calls(recorder: &Recorder, count: usize) -> Vec<String> {
        for _ in 0..200 {
            if recorder.calls().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        recorder.calls()
    }

    #[tokio::test]
    async fn test_fans_out_in_order() {
        let recorder = Arc::new(Recorder::default());
        let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(Failing), recorder.clone()];
        let (dispatcher, worker) = NotificationDispatcher::new(notifiers, 8);

        assert!(dispatcher.send_message("hello"));
        assert!(dispatcher.send_frame(Frame::new(RgbImage::new(8, 8)), "Photo from cam"));
        assert!(dispatcher.publish_event(DetectionEvent::new("cam", true, None)));
        drop(dispatcher);

        worker.run().await;

        assert_eq!(
            recorder.calls(),
            vec!["message:hello", "photo:Photo from cam", "event:cam"]
        );
    }

    #[tokio::test]
    async fn test_hung_channel_does_not_block_others() {
        let recorder = Arc::new(Recorder::default());
        let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(Hung), recorder.clone()];
        let (dispatcher, worker) = NotificationDispatcher::new(notifiers, 4);
        let task = tokio::spawn(worker.run());

        // More than the hung lane can hold: its backlog overflows and drops.
        for i in 0..10 {
            assert!(dispatcher.publish_event(DetectionEvent::new(format!("cam{i}"), true, None)));
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(dispatcher.send_message("Objects detected: alarm"));

        let calls = wait_for_calls(&recorder, 11).await;
        assert_eq!(calls.len(), 11);
        assert_eq!(calls.last().unwrap(), "message:Objects detected: alarm");
        task.abort();
    }

    #[tokio::test]
    async fn test_slow_delivery_times_out() {
        let recorder = Arc::new(Recorder::default());
        let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(Hung), recorder.clone()];
        let (dispatcher, worker) = NotificationDispatcher::new(notifiers, 8);
        let worker = worker.with_delivery_timeout(Duration::from_millis(20));

        assert!(dispatcher.send_message("one"));
        assert!(dispatcher.send_message("two"));
        drop(dispatcher);

        // Each hung delivery gives up, so the worker drains and returns.
        let drained = tokio::time::timeout(Duration::from_secs(2), worker.run()).await;
        assert!(drained.is_ok(), "worker stuck behind a hung channel");
        assert_eq!(recorder.calls(), vec!["message:one", "message:two"]);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (dispatcher, _worker) = NotificationDispatcher::new(Vec::new(), 2);
        assert!(dispatcher.send_message("1"));
        assert!(dispatcher.run_scene());
        assert!(!dispatcher.send_message("3"));
    }

    #[tokio::test]
    async fn test_stopped_worker_drops() {
        let (dispatcher, worker) = NotificationDispatcher::new(Vec::new(), 2);
        drop(worker);
        assert!(!dispatcher.save_auth_code("1234"));
    }
}
