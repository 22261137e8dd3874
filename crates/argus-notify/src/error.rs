//! Notification error types.

use argus_media::MediaError;
use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Aqara API error {code}: {message}")]
    Aqara { code: i64, message: String },

    #[error("Aqara is not authorized; send an auth code first")]
    AqaraUnauthorized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] MediaError),
}

impl NotifyError {
    pub fn telegram(message: impl Into<String>) -> Self {
        Self::Telegram(message.into())
    }

    pub fn aqara(code: i64, message: impl Into<String>) -> Self {
        Self::Aqara {
            code,
            message: message.into(),
        }
    }
}
