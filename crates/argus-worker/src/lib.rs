//! Argus engine.
//!
//! This crate provides:
//! - Per-source capture threads feeding latest-wins frame buffers
//! - Capture worker supervision with restart backoff
//! - A bounded detector gateway delivering results on a channel
//! - Save and notification throttling per source
//! - The local control channel and the detector watchdog
//! - A single shutdown path reporting why the process stops

pub mod alarm;
pub mod app;
pub mod backoff;
pub mod capture;
pub mod config;
pub mod control;
pub mod detector;
pub mod error;
pub mod fatal;
pub mod frame_buffer;
pub mod frame_item;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod state;
pub mod supervisor;
pub mod throttle;
pub mod watchdog;

#[cfg(test)]
mod test_support;

pub use alarm::AlarmSystem;
pub use app::Application;
pub use capture::{CaptureFactory, MediaCaptureFactory};
pub use config::AppConfig;
pub use detector::build_detector;
pub use error::{WorkerError, WorkerResult};
pub use fatal::ShutdownReason;
pub use frame_buffer::{FrameBuffer, LatestBuffer};
pub use frame_item::FrameItem;
pub use gateway::{DetectorGateway, GatewayError, InferenceOutcome};
pub use logging::SourceLogger;
pub use processor::{ProcessReport, ResultProcessor};
pub use state::{SourceStateStore, ThrottleSettings};
pub use supervisor::SourceRegistry;
