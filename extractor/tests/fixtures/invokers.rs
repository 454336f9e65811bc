//! Stub model invokers with scripted behaviour

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use extractor::{ModelInvoker, ModelResponse};
use shared::{ApiFailure, RecordId, TokenUsage};

use super::records::{prompt_ids, structured_answer};

/// Answers every id in the prompt with a valid structured result
#[derive(Default)]
pub struct EchoInvoker {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ModelInvoker for EchoInvoker {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ids = prompt_ids(prompt);
        Ok(ModelResponse::new(structured_answer(&ids)).with_usage(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }))
    }
}

/// Omits the given ids the first time each one is asked for, answers them afterwards
pub struct FlakyInvoker {
    flaky: HashSet<RecordId>,
    seen: Mutex<HashSet<RecordId>>,
    pub prompts: Mutex<Vec<Vec<RecordId>>>,
}

impl FlakyInvoker {
    pub fn new(flaky: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            flaky: flaky.into_iter().collect(),
            seen: Mutex::new(HashSet::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelInvoker for FlakyInvoker {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        let ids = prompt_ids(prompt);
        self.prompts.lock().unwrap().push(ids.clone());

        let mut seen = self.seen.lock().unwrap();
        let answered: Vec<RecordId> = ids
            .into_iter()
            .filter(|id| !self.flaky.contains(id) || !seen.insert(*id))
            .collect();
        Ok(ModelResponse::new(structured_answer(&answered)))
    }
}

/// Never answers the given ids
pub struct OmittingInvoker {
    omitted: HashSet<RecordId>,
    pub calls: AtomicUsize,
}

impl OmittingInvoker {
    pub fn new(omitted: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            omitted: omitted.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelInvoker for OmittingInvoker {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answered: Vec<RecordId> = prompt_ids(prompt)
            .into_iter()
            .filter(|id| !self.omitted.contains(id))
            .collect();
        Ok(ModelResponse::new(structured_answer(&answered)))
    }
}

/// Always returns the same failure
pub struct FailingInvoker {
    failure: ApiFailure,
    pub calls: AtomicUsize,
}

impl FailingInvoker {
    pub fn new(failure: ApiFailure) -> Self {
        Self {
            failure,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelInvoker for FailingInvoker {
    async fn invoke(&self, _prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure.clone())
    }
}

/// Sleeps on the first call for each batch leader, then answers normally
pub struct StallingInvoker {
    stall: Duration,
    stalled: Mutex<HashSet<RecordId>>,
}

impl StallingInvoker {
    pub fn new(stall: Duration) -> Self {
        Self {
            stall,
            stalled: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl ModelInvoker for StallingInvoker {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        let ids = prompt_ids(prompt);
        let first_time = ids
            .first()
            .map(|id| self.stalled.lock().unwrap().insert(*id))
            .unwrap_or(false);
        if first_time {
            tokio::time::sleep(self.stall).await;
        }
        Ok(ModelResponse::new(structured_answer(&ids)))
    }
}

/// Tracks how many invocations run at the same time
pub struct ConcurrencyProbe {
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub started_at: Mutex<Vec<tokio::time::Instant>>,
}

impl ConcurrencyProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started_at: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelInvoker for ConcurrencyProbe {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        self.started_at.lock().unwrap().push(tokio::time::Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ModelResponse::new(structured_answer(&prompt_ids(prompt))))
    }
}

/// Raises the shutdown flag on its first call and answers nothing
pub struct ShutdownTrigger {
    pub flag: Arc<AtomicBool>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ModelInvoker for ShutdownTrigger {
    async fn invoke(&self, _prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.flag.store(true, Ordering::SeqCst);
        Ok(ModelResponse::new("not json"))
    }
}

/// Answers in delimited encoding: odd ids have a place, even ids do not
pub struct DelimitedInvoker;

#[async_trait]
impl ModelInvoker for DelimitedInvoker {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        let segments: Vec<String> = prompt_ids(prompt)
            .into_iter()
            .map(|id| {
                if id % 2 == 1 {
                    format!("1,place-{id}(province-city)")
                } else {
                    "0".to_string()
                }
            })
            .collect();
        Ok(ModelResponse::new(format!("```\n{}\n```", segments.join(";"))))
    }
}

/// Rejects any batch containing the given id as an invalid request, answers the rest
pub struct RejectingInvoker {
    rejected: RecordId,
    pub calls: AtomicUsize,
}

impl RejectingInvoker {
    pub fn new(rejected: RecordId) -> Self {
        Self {
            rejected,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelInvoker for RejectingInvoker {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ids = prompt_ids(prompt);
        if ids.contains(&self.rejected) {
            return Err(ApiFailure::InvalidRequest(
                "400: input length exceeds context".to_string(),
            ));
        }
        Ok(ModelResponse::new(structured_answer(&ids)))
    }
}
