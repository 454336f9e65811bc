//! Worker error types

use thiserror::Error;

use extractor::ExtractorError;

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Worker error types
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Task coordinator error: {message}")]
    CoordinatorError { message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Extraction failed: {0}")]
    ExtractionError(#[from] ExtractorError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(message: impl Into<String>) -> Self {
        WorkerError::ConfigError { message: message.into() }
    }

    pub fn coordinator(message: impl Into<String>) -> Self {
        WorkerError::CoordinatorError { message: message.into() }
    }
}

impl From<shared::SharedError> for WorkerError {
    fn from(err: shared::SharedError) -> Self {
        WorkerError::config(err.to_string())
    }
}
