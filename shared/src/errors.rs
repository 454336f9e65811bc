//! Shared error types for the place-extraction workspace

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unknown platform: {input}")]
    UnknownPlatform { input: String },
}
