//! Extractor error types

use thiserror::Error;
use shared::ApiFailure;

/// Result type for extractor operations
pub type ExtractorResult<T> = Result<T, ExtractorError>;

/// Extractor error types
///
/// Per-batch failures never surface here; they are retried and finally
/// represented as sentinel results. Only caller-level problems do.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Model invocation failed fatally: {reason}")]
    InvocationError { reason: ApiFailure },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl ExtractorError {
    pub fn config(message: impl Into<String>) -> Self {
        ExtractorError::ConfigError { message: message.into() }
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(err: serde_json::Error) -> Self {
        ExtractorError::SerializationError { message: err.to_string() }
    }
}
