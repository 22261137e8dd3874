//! Detector backend selection.

use std::sync::Arc;

use argus_media::Detector;
use argus_ml_client::MlClient;
use tracing::info;

use crate::config::{DetectorKind, DetectorSettings};
use crate::error::WorkerResult;

/// Build the configured inference backend.
pub fn build_detector(settings: &DetectorSettings) -> WorkerResult<Arc<dyn Detector>> {
    match settings.kind {
        DetectorKind::Remote => {
            info!(base_url = %settings.remote.base_url, "Using remote detection service");
            Ok(Arc::new(MlClient::new(settings.remote.clone())?))
        }
        DetectorKind::Onnx => build_onnx(settings),
    }
}

#[cfg(feature = "onnx")]
fn build_onnx(settings: &DetectorSettings) -> WorkerResult<Arc<dyn Detector>> {
    let detector = argus_media::ObjectDetector::new(settings.onnx.clone())?;
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx(_settings: &DetectorSettings) -> WorkerResult<Arc<dyn Detector>> {
    Err(crate::error::WorkerError::config_error(
        "detector.kind = onnx requires building with the `onnx` feature",
    ))
}
