//! Shared types for the place-extraction workspace
//!
//! Contains only the types and helpers used by more than one crate.
//! Engine-internal types live in `extractor`, collaborator plumbing in `worker`.

pub mod types;
pub mod errors;
pub mod logging;

pub use types::*;
pub use errors::*;
