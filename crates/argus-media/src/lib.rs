#![deny(unreachable_patterns)]
//! Frame capture, imaging and detector interface.
//!
//! This crate provides:
//! - The `Frame` type shared by capture, detection and persistence
//! - Capture sources (FFmpeg rawvideo pipe, still-image directory)
//! - Frame annotation and JPEG persistence
//! - Template-matching bad-frame checks
//! - The `Detector` trait, COCO labels and overlap suppression
//! - An in-process YOLOv8 ONNX detector (`onnx` feature)

pub mod annotate;
pub mod bad_frame;
pub mod capture;
pub mod detection;
pub mod error;
pub mod frame;
pub mod stream_info;
pub mod store;

pub use annotate::{draw_detection, BOX_COLOR};
pub use bad_frame::BadFrameChecker;
pub use capture::{open_source, CaptureSource, FfmpegCapture, ImageDirCapture};
pub use detection::{non_max_suppression, Detector, DetectorConfig, COCO_CLASSES};
#[cfg(feature = "onnx")]
pub use detection::object_detector::ObjectDetector;
pub use error::{MediaError, MediaResult};
pub use frame::Frame;
pub use stream_info::{inspect_stream, StreamInfo};
pub use store::{encode_jpeg, save_frame, SavedFrame};
