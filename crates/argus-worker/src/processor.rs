//! Result processing: annotate, throttle, save, notify.

use std::path::PathBuf;
use std::sync::Arc;

use argus_media::{save_frame, SavedFrame};
use argus_models::DetectionEvent;
use argus_notify::NotificationDispatcher;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::alarm::AlarmSystem;
use crate::error::{WorkerError, WorkerResult};
use crate::frame_item::FrameItem;
use crate::gateway::InferenceOutcome;
use crate::metrics;
use crate::state::SourceStateStore;
use crate::throttle::seconds;

/// What one processed outcome led to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub saved: Option<PathBuf>,
    pub notified: bool,
    pub photo_sent: bool,
}

/// Turns detector outcomes into saved stills and notifications.
///
/// Owns no state of its own: throttles live in [`SourceStateStore`] and the
/// armed flag in [`AlarmSystem`], both shared with the control listener.
#[derive(Clone)]
pub struct ResultProcessor {
    state: Arc<SourceStateStore>,
    alarm: Arc<AlarmSystem>,
    dispatcher: NotificationDispatcher,
}

impl ResultProcessor {
    pub fn new(
        state: Arc<SourceStateStore>,
        alarm: Arc<AlarmSystem>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            state,
            alarm,
            dispatcher,
        }
    }

    /// Consume outcomes until the gateway side of the channel closes.
    pub async fn run(self, mut results: mpsc::Receiver<InferenceOutcome>) {
        info!("Result processor started");
        while let Some(outcome) = results.recv().await {
            self.process(outcome, Utc::now()).await;
        }
        info!("Result processor stopped");
    }

    /// Process one outcome; every gate sees the same `now`.
    ///
    /// Order of decisions:
    /// 1. Apply detections to the frame (annotation, important flag).
    /// 2. Important frames feed the multi-hit window and use the tightened
    ///    save cadence; others use the source's regular cadence.
    /// 3. A saved frame with detections publishes a detection event.
    /// 4. A confirmed important detection outside the silence window queues
    ///    a notification: the frame URL if the still was saved and the
    ///    source has a URL base, the annotated frame otherwise.
    /// 5. A pending photo request is served with the annotated frame.
    ///
    /// Saving and queueing failures are logged; nothing here returns an error.
    pub async fn process(&self, outcome: InferenceOutcome, now: DateTime<Utc>) -> ProcessReport {
        let InferenceOutcome {
            mut item,
            detections,
        } = outcome;
        item.map_detections_to_frame(detections, self.alarm.is_armed());

        let source = Arc::clone(item.source());
        let name = source.name.as_str();
        let important = item.important_objects_detected();

        let (save_allowed, confirmed) = if important {
            if let Some(previous) = self.state.last_important_detection(name) {
                debug!(
                    source = %name,
                    since_ms = (now - previous).num_milliseconds(),
                    "Important detection repeated"
                );
            }
            self.state.record_important_detection(name, now);
            let confirmed = self.state.confirm_detection(name, now);
            let save = self
                .state
                .allow_detected_save(name, now, seconds(item.save_every_sec()));
            (save, confirmed)
        } else {
            let save = self
                .state
                .allow_save(name, now, seconds(source.save_every_sec));
            (save, false)
        };

        let mut report = ProcessReport::default();
        let mut frame_url = None;

        if save_allowed {
            match save(&item).await {
                Ok(saved) => {
                    metrics::record_frame_saved(name, item.objects_detected());
                    frame_url = source.frame_url(&saved.file_name);
                    if item.objects_detected() {
                        self.dispatcher.publish_event(DetectionEvent::new(
                            name,
                            important,
                            frame_url.clone(),
                        ));
                    }
                    report.saved = Some(saved.path);
                }
                Err(e) => warn!(source = %name, error = %e, "Frame not saved"),
            }
        }

        if important && confirmed && self.state.allow_notify(name, now) {
            let queued = match &frame_url {
                Some(url) => self
                    .dispatcher
                    .send_message(format!("Objects detected: {}", url)),
                None => self
                    .dispatcher
                    .send_frame(item.frame().clone(), "Objects detected"),
            };
            info!(source = %name, queued, "Detection notification");
            metrics::record_notification(name, "detection");
            report.notified = true;
        } else if important {
            debug!(
                source = %name,
                confirmed,
                silence_until = ?self.state.silence_until(name),
                "Notification suppressed"
            );
        }

        if self.state.take_photo_request(name) {
            self.dispatcher
                .send_frame(item.frame().clone(), format!("Photo from {}", name));
            metrics::record_notification(name, "photo");
            report.photo_sent = true;
        }

        report
    }
}

async fn save(item: &FrameItem) -> WorkerResult<SavedFrame> {
    let image = item.frame().shared_image();
    let dir = item.source().stills_dir.clone();
    let captured_at = item.frame().captured_at();
    let detected = item.objects_detected();

    tokio::task::spawn_blocking(move || save_frame(&dir, &image, captured_at, detected))
        .await
        .map_err(|e| WorkerError::save_failed(e.to_string()))?
        .map_err(WorkerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ThrottleSettings;
    use crate::test_support::{RecordingNotifier, Sent};
    use argus_media::Frame;
    use argus_models::{Detection, SourceConfig};
    use argus_notify::Notifier;
    use chrono::{Duration, TimeZone};
    use image::RgbImage;
    use tempfile::TempDir;

    struct Harness {
        processor: ResultProcessor,
        recorder: Arc<RecordingNotifier>,
        state: Arc<SourceStateStore>,
        source: Arc<SourceConfig>,
        tmp: TempDir,
        worker: Option<argus_notify::DispatchWorker>,
    }

    impl Harness {
        fn new(host_uri: Option<&str>, threshold: usize) -> Self {
            let tmp = TempDir::new().unwrap();
            let mut config = SourceConfig::new("front", "dir:/unused", tmp.path().join("stills"));
            config.host_stills_uri = host_uri.map(String::from);
            let state = Arc::new(SourceStateStore::new(ThrottleSettings {
                silence: Duration::seconds(1800),
                confirmation_window: Duration::seconds(3),
                confirmation_threshold: threshold,
            }));
            let alarm = Arc::new(AlarmSystem::new(tmp.path().join("armed")));
            let recorder = Arc::new(RecordingNotifier::default());
            let notifiers: Vec<Arc<dyn Notifier>> = vec![recorder.clone()];
            let (dispatcher, worker) = NotificationDispatcher::new(notifiers, 64);
            Self {
                processor: ResultProcessor::new(Arc::clone(&state), alarm, dispatcher),
                recorder,
                state,
                source: Arc::new(config),
                tmp,
                worker: Some(worker),
            }
        }

        async fn process(&self, labels: &[&str], secs: i64) -> ProcessReport {
            let item = FrameItem::new(
                Arc::clone(&self.source),
                Frame::new(RgbImage::new(64, 64)),
                1,
            );
            let detections = labels
                .iter()
                .map(|l| Detection::new(0, *l, 0.9, (5, 5, 30, 30)))
                .collect();
            self.processor
                .process(InferenceOutcome { item, detections }, at(secs))
                .await
        }

        /// Drop the processor's dispatcher handle and drain the queue.
        async fn sent(mut self) -> Vec<Sent> {
            let worker = self.worker.take().unwrap();
            drop(self.processor);
            worker.run().await;
            self.recorder.sent()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    #[tokio::test]
    async fn test_regular_save_cadence_without_detections() {
        let h = Harness::new(None, 1);

        let first = h.process(&[], 0).await;
        let saved = first.saved.unwrap();
        assert!(saved.exists());
        assert!(!saved.to_string_lossy().ends_with("-detected.jpg"));
        assert!(!first.notified);

        assert!(h.process(&[], 10).await.saved.is_none());
        assert!(h.process(&[], 30).await.saved.is_some());
        assert!(h.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_notification_with_url_sends_text() {
        let h = Harness::new(Some("http://nas/front/"), 1);

        let report = h.process(&["person"], 0).await;
        let saved = report.saved.unwrap();
        assert!(saved.to_string_lossy().ends_with("-detected.jpg"));
        assert!(report.notified);
        assert!(h.state.last_important_detection("front").is_some());

        let file_name = saved.file_name().unwrap().to_string_lossy().to_string();
        let url = format!("http://nas/front/{}", file_name);
        let sent = h.sent().await;
        assert_eq!(
            sent,
            vec![
                Sent::Event(DetectionEvent::new("front", true, Some(url.clone()))),
                Sent::Message(format!("Objects detected: {}", url)),
            ]
        );
    }

    #[tokio::test]
    async fn test_notification_without_url_sends_photo() {
        let h = Harness::new(None, 1);
        assert!(h.process(&["person"], 0).await.notified);

        let sent = h.sent().await;
        assert!(sent.contains(&Sent::Photo("Objects detected".into())));
        assert!(sent.contains(&Sent::Event(DetectionEvent::new("front", true, None))));
    }

    #[tokio::test]
    async fn test_unimportant_detection_publishes_event_only() {
        let mut h = Harness::new(None, 1);
        h.source = Arc::new(SourceConfig {
            other_objects: vec!["car".into()],
            ..(*h.source).clone()
        });

        let report = h.process(&["car"], 0).await;
        assert!(report.saved.is_some());
        assert!(!report.notified);
        assert_eq!(
            h.sent().await,
            vec![Sent::Event(DetectionEvent::new("front", false, None))]
        );
    }

    #[tokio::test]
    async fn test_confirmation_required_before_notifying() {
        let h = Harness::new(None, 3);

        assert!(!h.process(&["person"], 0).await.notified);
        assert!(!h.process(&["person"], 1).await.notified);
        assert!(h.process(&["person"], 2).await.notified);
    }

    #[tokio::test]
    async fn test_photo_request_is_one_shot() {
        let h = Harness::new(None, 1);
        h.state.request_photos(["front"]);

        assert!(h.process(&[], 0).await.photo_sent);
        assert!(!h.process(&[], 1).await.photo_sent);
        assert_eq!(h.sent().await, vec![Sent::Photo("Photo from front".into())]);
    }

    #[tokio::test]
    async fn test_save_failure_is_not_fatal() {
        let mut h = Harness::new(None, 1);
        // A regular file where the stills directory should be
        let blocker = h.tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        h.source = Arc::new(SourceConfig::new("front", "dir:/unused", blocker.join("stills")));

        let report = h.process(&["person"], 0).await;
        assert!(report.saved.is_none());
        assert!(report.notified);
        assert!(h.sent().await.contains(&Sent::Photo("Objects detected".into())));
    }
}
