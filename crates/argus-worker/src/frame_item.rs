//! The per-frame unit of work.

use std::sync::Arc;

use argus_media::{draw_detection, Frame};
use argus_models::{Detection, SourceConfig};
use tracing::info;

/// A captured frame on its way from capture to disposal.
///
/// Moved through capture, gateway task and result processor; never shared,
/// so it is never mutated concurrently.
#[derive(Debug)]
pub struct FrameItem {
    source: Arc<SourceConfig>,
    frame: Frame,
    detections: Vec<Detection>,
    objects_detected: bool,
    important_objects_detected: bool,
    save_every_sec: u64,
    detected_save_every_sec: u64,
}

impl FrameItem {
    pub fn new(source: Arc<SourceConfig>, frame: Frame, detected_save_every_sec: u64) -> Self {
        let save_every_sec = source.save_every_sec;
        Self {
            source,
            frame,
            detections: Vec::new(),
            objects_detected: false,
            important_objects_detected: false,
            save_every_sec,
            detected_save_every_sec,
        }
    }

    /// Attach detections to the frame.
    ///
    /// Keeps the detectable ones under the area limit, draws their boxes and
    /// sets the flags. An important label tightens the save cadence.
    pub fn map_detections_to_frame(&mut self, detections: Vec<Detection>, armed: bool) {
        for detection in detections {
            if !self.source.is_detectable(&detection.label) {
                continue;
            }
            if !self.source.area_allowed(detection.area()) {
                continue;
            }

            self.objects_detected = true;
            draw_detection(self.frame.image_mut(), &detection);
            info!(
                source = %self.source.name,
                label = %detection.label,
                confidence = detection.confidence,
                xmin = detection.xmin,
                ymin = detection.ymin,
                xmax = detection.xmax,
                ymax = detection.ymax,
                "Object detected"
            );

            if self.source.is_important(&detection.label, armed) {
                self.important_objects_detected = true;
                self.save_every_sec = self.detected_save_every_sec;
            }
            self.detections.push(detection);
        }
    }

    pub fn source(&self) -> &Arc<SourceConfig> {
        &self.source
    }

    pub fn source_name(&self) -> &str {
        &self.source.name
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn objects_detected(&self) -> bool {
        self.objects_detected
    }

    pub fn important_objects_detected(&self) -> bool {
        self.important_objects_detected
    }

    pub fn save_every_sec(&self) -> u64 {
        self.save_every_sec
    }
}
