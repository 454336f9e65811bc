//! Extractor trait definitions for dependency injection

use async_trait::async_trait;

use shared::ApiFailure;
use crate::types::ModelResponse;

/// Model invocation adapter: one round-trip call for one batch prompt
///
/// Implementations own provider selection and transport-level retry/backoff.
/// They must not truncate or reorder the response text.
#[mockall::automock]
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str, model: &str) -> Result<ModelResponse, ApiFailure>;
}
