//! Detection events published to MQTT.

use serde::{Deserialize, Serialize};

/// Payload published when a frame with detections is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub important_objects_detected: bool,
    pub frame_url: Option<String>,
    pub source: String,
}

impl DetectionEvent {
    pub fn new(source: impl Into<String>, important_objects_detected: bool, frame_url: Option<String>) -> Self {
        Self {
            important_objects_detected,
            frame_url,
            source: source.into(),
        }
    }

    /// MQTT topic for this event.
    pub fn topic(&self) -> String {
        format!("argus/source/{}/detected", self.source)
    }
}
