//! Detection service request/response types.

use argus_models::Detection;
use serde::{Deserialize, Serialize};

/// Response of `POST /detect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Health check response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    /// Accelerator temperature in degrees Celsius
    #[serde(default)]
    pub temperature: Option<f32>,
}
