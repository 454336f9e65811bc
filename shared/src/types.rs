//! Core types used throughout the extraction workspace

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::errors::SharedError;

/// Global worker identity - set once at startup
static WORKER_ID: OnceLock<WorkerId> = OnceLock::new();

/// Externally assigned record identifier
pub type RecordId = i64;

/// Identity of this worker process, attached to every worker log event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    /// Initialize the global worker ID, generating one when no name is configured
    pub fn init(name: Option<&str>) -> &'static WorkerId {
        WORKER_ID.get_or_init(|| match name.map(str::trim) {
            Some(name) if !name.is_empty() => WorkerId(name.to_string()),
            _ => WorkerId::generate(),
        })
    }

    /// Get the global worker ID (falls back to a generated one if `init` was never called)
    pub fn current() -> &'static WorkerId {
        WORKER_ID.get_or_init(WorkerId::generate)
    }

    fn generate() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        WorkerId(format!("worker_{}", &uuid[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source record as fetched from the record store. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub period: String,
    pub author: String,
    pub body: String,
}

impl Record {
    pub fn new(
        id: RecordId,
        title: impl Into<String>,
        period: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            period: period.into(),
            author: author.into(),
            body: body.into(),
        }
    }
}

/// Token usage reported by a model invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Model invocation failure types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiFailure {
    AuthenticationFailed,
    RateLimitExceeded,
    ServiceUnavailable,
    Timeout,
    NetworkError(String),
    ServerError(String),
    InvalidRequest(String),
    InvalidResponse(String),
}

impl ApiFailure {
    /// Failures that affect every batch alike; these abort a whole run
    ///
    /// A rejected request (`InvalidRequest`) concerns one batch only and is not fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiFailure::AuthenticationFailed)
    }

    /// Failures worth another transport-level attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiFailure::RateLimitExceeded
                | ApiFailure::ServiceUnavailable
                | ApiFailure::Timeout
                | ApiFailure::NetworkError(_)
                | ApiFailure::ServerError(_)
        )
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::AuthenticationFailed => write!(f, "authentication failed"),
            ApiFailure::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ApiFailure::ServiceUnavailable => write!(f, "service unavailable"),
            ApiFailure::Timeout => write!(f, "request timed out"),
            ApiFailure::NetworkError(msg) => write!(f, "network error: {msg}"),
            ApiFailure::ServerError(msg) => write!(f, "server error: {msg}"),
            ApiFailure::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            ApiFailure::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

/// LLM platforms the worker can call. All expose an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    SiliconFlow,
    Aliyun,
    OpenRouter,
}

impl Platform {
    pub fn chat_completions_url(&self) -> &'static str {
        match self {
            Platform::SiliconFlow => "https://api.siliconflow.cn/v1/chat/completions",
            Platform::Aliyun => "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions",
            Platform::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    /// Environment variables holding the API key, in lookup order
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            Platform::SiliconFlow => &["SILICONFLOW_API_KEY"],
            Platform::Aliyun => &["DASHSCOPE_API_KEY"],
            Platform::OpenRouter => &["OPENROUTER_API_KEY", "OPEN_ROUTER_KEY"],
        }
    }

    /// SiliconFlow reasoning models accept an explicit switch for thinking output
    pub fn supports_thinking_flag(&self) -> bool {
        matches!(self, Platform::SiliconFlow)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::SiliconFlow => write!(f, "siliconflow"),
            Platform::Aliyun => write!(f, "aliyun"),
            Platform::OpenRouter => write!(f, "openrouter"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "siliconflow" => Ok(Platform::SiliconFlow),
            "aliyun" | "dashscope" => Ok(Platform::Aliyun),
            "openrouter" => Ok(Platform::OpenRouter),
            _ => Err(SharedError::UnknownPlatform { input: s.to_string() }),
        }
    }
}
