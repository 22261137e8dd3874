//! ML client error types.

use argus_media::MediaError;
use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] MediaError),
}

impl MlError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MlError::ServiceUnavailable(_) | MlError::Network(_))
    }
}

impl From<MlError> for MediaError {
    fn from(err: MlError) -> Self {
        match err {
            MlError::Encode(inner) => inner,
            other => MediaError::detection_failed(other.to_string()),
        }
    }
}
