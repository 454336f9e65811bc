//! Concurrent batch place-name extraction engine
//!
//! Partitions records into size-bounded batches, dispatches them to a model
//! invocation collaborator under a bounded worker pool and a shared request-rate
//! ceiling, parses the responses and retries only the unresolved records until
//! every input record carries exactly one result.

pub mod error;
pub mod types;
pub mod traits;
pub mod core;
pub mod services;
pub mod engine;

// Re-export main types
pub use error::{ExtractorError, ExtractorResult};
pub use types::*;
pub use traits::*;
pub use engine::ExtractionEngine;
pub use services::{ProgressReporter, RateLimiter};
pub use crate::core::{parse_response, partition, PromptTemplate};
