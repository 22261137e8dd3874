//! Detection service HTTP client.

use std::time::Duration;

use argus_media::{encode_jpeg, Detector, Frame, MediaError, MediaResult};
use argus_models::Detection;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::types::{DetectResponse, HealthResponse};

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

/// Configuration for ML client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlClientConfig {
    /// Base URL of the detection service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for transport errors before the call fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Client for the detection service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send an encoded JPEG for detection.
    pub async fn detect_jpeg(&self, jpeg: Vec<u8>) -> MlResult<Vec<Detection>> {
        let url = self.url("detect");
        debug!(url = %url, bytes = jpeg.len(), "Sending detection request");

        let (http, url_ref, body) = (&self.http, &url, &jpeg);
        let response = self
            .with_retry(move || async move {
                let response = http
                    .post(url_ref)
                    .header(CONTENT_TYPE, "image/jpeg")
                    .body(body.clone())
                    .send()
                    .await
                    .map_err(MlError::Network)?;

                if response.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Err(MlError::ServiceUnavailable(url_ref.clone()));
                }
                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "detection service returned {}: {}",
                status, body
            )));
        }

        let body = response.bytes().await?;
        let parsed: DetectResponse = serde_json::from_slice(&body)?;
        if let Some(bad) = parsed
            .detections
            .iter()
            .find(|d| !(0.0..=1.0).contains(&d.confidence))
        {
            return Err(MlError::InvalidResponse(format!(
                "confidence {} out of range for '{}'",
                bad.confidence, bad.label
            )));
        }
        Ok(parsed.detections)
    }

    /// Query service health.
    ///
    /// Fails when the service is unreachable or unhealthy.
    pub async fn health(&self) -> MlResult<HealthResponse> {
        let url = self.url("health");
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "ML service health check failed");
            return Err(MlError::ServiceUnavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(HealthResponse::default());
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Detection request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Detector for MlClient {
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        let image = frame.shared_image();
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&image))
            .await
            .map_err(|e| MediaError::internal(format!("JPEG encode task panicked: {}", e)))??;

        Ok(self.detect_jpeg(jpeg).await?)
    }

    async fn device_temperature(&self) -> MediaResult<Option<f32>> {
        Ok(self.health().await?.temperature)
    }

    fn name(&self) -> &'static str {
        "ml-service"
    }
}
