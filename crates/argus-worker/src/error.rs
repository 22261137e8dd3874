//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Config load failed: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Invalid source: {0}")]
    Model(#[from] argus_models::ModelError),

    #[error("Frame save failed: {0}")]
    SaveFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] argus_media::MediaError),

    #[error("ML client error: {0}")]
    MlClient(#[from] argus_ml_client::MlError),

    #[error("Notification error: {0}")]
    Notify(#[from] argus_notify::NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn save_failed(msg: impl Into<String>) -> Self {
        Self::SaveFailed(msg.into())
    }

    /// Check if this is a startup configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            WorkerError::ConfigError(_) | WorkerError::ConfigLoad(_) | WorkerError::Model(_)
        )
    }
}
