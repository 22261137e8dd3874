//! Fakes shared by unit tests.

use std::sync::{Arc, Mutex};

use argus_media::{Detector, Frame, MediaError, MediaResult};
use argus_models::{Detection, DetectionEvent, SourceConfig};
use argus_notify::{Notifier, NotifyResult};
use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::Semaphore;

use crate::frame_item::FrameItem;

pub fn item(source: &str) -> FrameItem {
    let config = SourceConfig::new(source, "dir:/unused", "/tmp/argus-test");
    FrameItem::new(Arc::new(config), Frame::new(RgbImage::new(64, 64)), 1)
}

pub struct FixedDetector {
    detections: Vec<Detection>,
}

impl FixedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

#[async_trait]
impl Detector for FixedDetector {
    async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<Detection>> {
        Ok(self.detections.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Holds every request until `release` is called.
pub struct BlockingDetector {
    gate: Semaphore,
}

impl Default for BlockingDetector {
    fn default() -> Self {
        Self {
            gate: Semaphore::new(0),
        }
    }
}

impl BlockingDetector {
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Detector for BlockingDetector {
    async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<Detection>> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| MediaError::internal(e.to_string()))?;
        permit.forget();
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "blocking"
    }
}

pub struct FailingDetector;

#[async_trait]
impl Detector for FailingDetector {
    async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<Detection>> {
        Err(MediaError::detection_failed("device lost"))
    }

    async fn device_temperature(&self) -> MediaResult<Option<f32>> {
        Err(MediaError::detection_failed("device lost"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message(String),
    Photo(String),
    Event(DetectionEvent),
    RunScene,
    AuthCode(String),
}

/// Records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_message(&self, text: &str) -> NotifyResult<()> {
        self.push(Sent::Message(text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, _jpeg: &[u8], caption: &str) -> NotifyResult<()> {
        self.push(Sent::Photo(caption.to_string()));
        Ok(())
    }

    async fn publish_event(&self, event: &DetectionEvent) -> NotifyResult<()> {
        self.push(Sent::Event(event.clone()));
        Ok(())
    }

    async fn run_scene(&self) -> NotifyResult<()> {
        self.push(Sent::RunScene);
        Ok(())
    }

    async fn save_auth_code(&self, code: &str) -> NotifyResult<()> {
        self.push(Sent::AuthCode(code.to_string()));
        Ok(())
    }

    fn accepts_photos(&self) -> bool {
        true
    }
}
