//! Object detection interface.
//!
//! The engine depends only on the [`Detector`] contract: a frame goes in, a
//! list of labeled, confidence-scored boxes in the frame's own pixel space
//! comes out. Implementations:
//!
//! | Detector | Crate | Notes |
//! |----------|-------|-------|
//! | `ObjectDetector` | `argus-media` (`onnx` feature) | YOLOv8 via ONNX Runtime |
//! | `MlClient` | `argus-ml-client` | remote inference service over HTTP |

pub mod nms;
#[cfg(feature = "onnx")]
pub mod object_detector;
pub mod yolo;

pub use nms::non_max_suppression;

use argus_models::Detection;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MediaResult;
use crate::frame::Frame;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Label for a COCO class id, `"unknown"` when out of range.
pub fn coco_label(class_id: usize) -> &'static str {
    COCO_CLASSES.get(class_id).copied().unwrap_or("unknown")
}

fn default_model_path() -> String {
    "models/yolov8n.onnx".to_string()
}

fn default_confidence_threshold() -> f32 {
    0.35
}

fn default_iou_threshold() -> f32 {
    0.45
}

fn default_input_size() -> u32 {
    640
}

/// Configuration for in-process detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Path to ONNX model file
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// Detections below this confidence are discarded
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Overlap above which the lower-confidence box is dropped
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// Square model input size
    #[serde(default = "default_input_size")]
    pub input_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            confidence_threshold: default_confidence_threshold(),
            iou_threshold: default_iou_threshold(),
            input_size: default_input_size(),
        }
    }
}

/// Inference backend.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect objects in a frame.
    ///
    /// Boxes are in the frame's pixel space. An error means the backend is
    /// unusable; callers treat it as fatal.
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>>;

    /// Device temperature in degrees Celsius, `None` if there is no sensor.
    async fn device_temperature(&self) -> MediaResult<Option<f32>> {
        Ok(None)
    }

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}
