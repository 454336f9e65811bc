//! Place-extraction worker
//!
//! Claims tasks from the central coordinator, extracts place names for the
//! task's records with the `extractor` engine, writes the results back to the
//! central MySQL store and reports each task complete.

pub mod config;
pub mod error;
pub mod types;
pub mod traits;
pub mod services;
pub mod worker_impl;

// Re-export main types
pub use config::{DatabaseConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use types::*;
pub use traits::*;
pub use worker_impl::{register_interrupt, InterruptAction, Worker};
pub use services::*;
