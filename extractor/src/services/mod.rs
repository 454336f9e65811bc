//! Extractor runtime services shared across worker tasks

pub mod progress_reporter;
pub mod rate_limiter;

#[cfg(test)]
pub mod tests;

pub use progress_reporter::*;
pub use rate_limiter::*;
