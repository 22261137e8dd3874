//! Client for a remote object-detection service.
//!
//! The service accepts a JPEG frame and answers with labeled boxes in the
//! frame's pixel space. `MlClient` implements `argus_media::Detector`, so the
//! engine can run against a remote accelerator host the same way it runs
//! against the in-process ONNX detector.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{DetectResponse, HealthResponse};
