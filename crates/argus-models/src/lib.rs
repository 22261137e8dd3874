//! Shared data models for the Argus pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Per-source capture and detection policy
//! - Detector output (labeled, scored boxes)
//! - External control commands
//! - Detection events published to MQTT
//! - Persisted frame naming

pub mod command;
pub mod detection;
pub mod error;
pub mod event;
pub mod frame_name;
pub mod source;

// Re-export common types
pub use command::{ControlCommand, DEFAULT_RESPONSE};
pub use detection::Detection;
pub use error::{ModelError, ModelResult};
pub use event::DetectionEvent;
pub use frame_name::{frame_file_name, DETECTED_SUFFIX, FRAME_TIMESTAMP_FORMAT};
pub use source::{validate_sources, BadFrameCheckerConfig, FrameSize, SourceConfig};
