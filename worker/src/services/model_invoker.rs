//! Real model invoker calling OpenAI-compatible chat-completions endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use extractor::{ModelInvoker, ModelResponse};
use shared::{ApiFailure, Platform, TokenUsage};

use crate::error::WorkerResult;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const TRANSPORT_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const ERROR_BODY_PREVIEW: usize = 200;

/// First non-empty API key among the platform's environment variables
pub fn resolve_api_key<F>(platform: Platform, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    platform
        .api_key_vars()
        .iter()
        .filter_map(|var| lookup(var))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

/// Chat-completions request body for one prompt
pub fn request_body(platform: Platform, model: &str, prompt: &str) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ]
    });
    if platform.supports_thinking_flag() {
        body["enable_thinking"] = Value::Bool(false);
    }
    body
}

/// Extract content and usage from a chat-completions response
pub fn parse_completion(json: &Value) -> Result<ModelResponse, ApiFailure> {
    let content = json
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| ApiFailure::InvalidResponse("No content in response".to_string()))?;

    let usage = json.get("usage");
    let count = |field: &str| {
        usage
            .and_then(|u| u.get(field))
            .and_then(|t| t.as_u64())
            .unwrap_or(0)
    };

    Ok(ModelResponse::new(content).with_usage(TokenUsage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        total_tokens: count("total_tokens"),
    }))
}

/// Map a non-success HTTP status to a failure
pub fn classify_status(status: StatusCode, body: &str) -> ApiFailure {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    match status.as_u16() {
        401 | 403 => ApiFailure::AuthenticationFailed,
        429 => ApiFailure::RateLimitExceeded,
        503 => ApiFailure::ServiceUnavailable,
        500 | 502 | 504 => ApiFailure::ServerError(status.to_string()),
        400 | 404 | 422 => ApiFailure::InvalidRequest(format!("{status}: {preview}")),
        _ => ApiFailure::InvalidResponse(format!("{status}: {preview}")),
    }
}

/// Exponential backoff delay before retry number `attempt + 1`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn transport_failure(err: reqwest::Error) -> ApiFailure {
    if err.is_timeout() {
        ApiFailure::Timeout
    } else {
        ApiFailure::NetworkError(err.to_string())
    }
}

/// A failed attempt, with the server's requested delay if it sent one
struct AttemptFailure {
    failure: ApiFailure,
    retry_after: Option<Duration>,
}

impl From<ApiFailure> for AttemptFailure {
    fn from(failure: ApiFailure) -> Self {
        Self { failure, retry_after: None }
    }
}

/// Real model invoker implementation
pub struct RealModelInvoker {
    client: reqwest::Client,
    platform: Platform,
    endpoint: String,
    api_key: Option<String>,
    max_retries: u32,
    base_backoff: Duration,
}

impl RealModelInvoker {
    pub fn new(platform: Platform, api_key: Option<String>) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            platform,
            endpoint: platform.chat_completions_url().to_string(),
            api_key,
            max_retries: TRANSPORT_RETRIES,
            base_backoff: BASE_BACKOFF,
        })
    }

    /// Create an invoker with the API key taken from the environment
    pub fn from_env(platform: Platform) -> WorkerResult<Self> {
        Self::new(platform, resolve_api_key(platform, |var| std::env::var(var).ok()))
    }

    /// Override the chat-completions URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the transport retry policy
    pub fn with_retry_policy(mut self, max_retries: u32, base_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_backoff = base_backoff;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<ModelResponse, AttemptFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(AttemptFailure {
                failure: classify_status(status, &text),
                retry_after,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ApiFailure::InvalidResponse(format!("Failed to parse response: {e}")))?;
        Ok(parse_completion(&json)?)
    }
}

#[async_trait]
impl ModelInvoker for RealModelInvoker {
    async fn invoke(&self, prompt: &str, model: &str) -> Result<ModelResponse, ApiFailure> {
        let api_key = self.api_key.as_deref().ok_or(ApiFailure::AuthenticationFailed)?;
        let body = request_body(self.platform, model, prompt);

        let mut attempt = 0u32;
        loop {
            match self.send_once(api_key, &body).await {
                Ok(response) => {
                    debug!(
                        platform = %self.platform,
                        total_tokens = response.usage.total_tokens,
                        "Model call succeeded"
                    );
                    return Ok(response);
                }
                Err(AttemptFailure { failure, retry_after })
                    if failure.is_transient() && attempt < self.max_retries =>
                {
                    let delay = retry_after.unwrap_or_else(|| backoff_delay(self.base_backoff, attempt));
                    warn!(
                        platform = %self.platform,
                        error = %failure,
                        "⏳ Model call failed (attempt {}), retrying in {}ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AttemptFailure { failure, .. }) => return Err(failure),
            }
        }
    }
}
