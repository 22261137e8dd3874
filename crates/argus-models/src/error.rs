//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid source config '{source_name}': {message}")]
    InvalidSource { source_name: String, message: String },

    #[error("Duplicate source name: {0}")]
    DuplicateSource(String),

    #[error("Unknown control command: {0}")]
    UnknownCommand(String),
}

impl ModelError {
    pub fn invalid_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
