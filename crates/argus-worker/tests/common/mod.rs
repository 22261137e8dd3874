//! Helpers shared by the engine integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use argus_media::{Detector, Frame, MediaError, MediaResult};
use argus_models::{Detection, DetectionEvent};
use argus_notify::{Notifier, NotifyResult};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message(String),
    Photo(String),
    Event(DetectionEvent),
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn messages(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Message(_) | Sent::Photo(_)))
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_message(&self, text: &str) -> NotifyResult<()> {
        self.sent.lock().unwrap().push(Sent::Message(text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, _jpeg: &[u8], caption: &str) -> NotifyResult<()> {
        self.sent.lock().unwrap().push(Sent::Photo(caption.to_string()));
        Ok(())
    }

    async fn publish_event(&self, event: &DetectionEvent) -> NotifyResult<()> {
        self.sent.lock().unwrap().push(Sent::Event(event.clone()));
        Ok(())
    }

    fn accepts_photos(&self) -> bool {
        true
    }
}

/// Always fails, like a detector whose device disappeared.
pub struct BrokenDetector;

#[async_trait]
impl Detector for BrokenDetector {
    async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<Detection>> {
        Err(MediaError::detection_failed("accelerator not responding"))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

/// The first request answers late with a person; every later request fails
/// at once. Models a device that dies while another source's frame is still
/// being processed.
#[derive(Default)]
pub struct DyingDetector {
    calls: AtomicUsize,
}

#[async_trait]
impl Detector for DyingDetector {
    async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<Detection>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(vec![person()])
        } else {
            Err(MediaError::detection_failed("device lost"))
        }
    }

    fn name(&self) -> &'static str {
        "dying"
    }
}

/// Reports nothing.
pub struct EmptyDetector;

#[async_trait]
impl Detector for EmptyDetector {
    async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "empty"
    }
}

pub fn person() -> Detection {
    Detection::new(0, "person", 0.88, (10, 10, 40, 60))
}

pub fn write_images(dir: &Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        image::RgbImage::from_pixel(64, 48, image::Rgb([40, 80, 120]))
            .save(dir.join(format!("{:03}.png", i)))
            .unwrap();
    }
}

pub fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn shared(notifier: &Arc<RecordingNotifier>) -> Vec<Arc<dyn Notifier>> {
    vec![Arc::clone(notifier) as Arc<dyn Notifier>]
}
