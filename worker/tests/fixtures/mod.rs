//! Test fixtures for worker loop tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use extractor::{EngineConfig, ExtractionEngine, ModelInvoker, ModelResponse, RateLimiter, ResponseEncoding};
use shared::{ApiFailure, Record, RecordId};

/// Records with ids `1..=count`
pub fn create_test_records(count: usize) -> Vec<Record> {
    (1..=count as RecordId)
        .map(|id| Record::new(id, format!("Poem {id}"), "Song", "Su Shi", "The river flows east past the old fort"))
        .collect()
}

/// Records for the given ids, ordered by id, the way the store returns them
pub fn records_for(ids: &[RecordId]) -> Vec<Record> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.into_iter()
        .map(|id| Record::new(id, format!("Poem {id}"), "Song", "Su Shi", "The river flows east past the old fort"))
        .collect()
}

fn prompt_ids(prompt: &str) -> Vec<RecordId> {
    let start = prompt.rfind("{\"records\":").expect("records payload");
    let payload: serde_json::Value = serde_json::from_str(&prompt[start..]).expect("valid payload");
    payload["records"]
        .as_array()
        .expect("records array")
        .iter()
        .map(|record| record["id"].as_i64().expect("integer id"))
        .collect()
}

/// Answers every id except the omitted ones
pub struct ScriptedInvoker {
    omitted: HashSet<RecordId>,
    failure: Option<ApiFailure>,
}

impl ScriptedInvoker {
    pub fn answering_all() -> Self {
        Self { omitted: HashSet::new(), failure: None }
    }

    pub fn omitting(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Self { omitted: ids.into_iter().collect(), failure: None }
    }

    pub fn failing(failure: ApiFailure) -> Self {
        Self { omitted: HashSet::new(), failure: Some(failure) }
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(&self, prompt: &str, _model: &str) -> Result<ModelResponse, ApiFailure> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let items: Vec<serde_json::Value> = prompt_ids(prompt)
            .into_iter()
            .filter(|id| !self.omitted.contains(id))
            .map(|id| serde_json::json!({"id": id, "has_place": 1, "places": [{"name": "Chibi"}]}))
            .collect();
        Ok(ModelResponse::new(serde_json::Value::Array(items).to_string()))
    }
}

/// Engine with a single round and no rate limiting
pub fn create_test_engine(invoker: ScriptedInvoker) -> ExtractionEngine<ScriptedInvoker> {
    let config = EngineConfig {
        model: "test-model".to_string(),
        encoding: ResponseEncoding::StructuredBatch,
        max_workers: 2,
        task_timeout: Some(Duration::from_secs(30)),
        max_chars_per_batch: 1000,
        max_items_per_batch: 4,
        max_retries: 0,
        progress_interval: Duration::from_secs(10),
    };
    ExtractionEngine::new(Arc::new(invoker), Arc::new(RateLimiter::unlimited()), config).expect("valid config")
}
