//! Record and configuration fixtures

use std::time::Duration;

use extractor::{EngineConfig, ResponseEncoding};
use shared::{Record, RecordId};

/// `count` records with ids starting at 1 and bodies of varying length
pub fn create_test_records(count: usize) -> Vec<Record> {
    (1..=count as RecordId)
        .map(|id| {
            Record::new(
                id,
                format!("Title {id}"),
                "Tang",
                format!("Author {}", id % 7),
                "river mountain ".repeat(1 + (id as usize % 5)),
            )
        })
        .collect()
}

/// Engine config with test-friendly timings
pub fn create_test_config() -> EngineConfig {
    EngineConfig {
        model: "test-model".to_string(),
        encoding: ResponseEncoding::StructuredBatch,
        max_workers: 4,
        task_timeout: Some(Duration::from_secs(30)),
        max_chars_per_batch: 1000,
        max_items_per_batch: 12,
        max_retries: 2,
        progress_interval: Duration::from_secs(10),
    }
}

/// Ids of the records carried in a batch prompt, in payload order
pub fn prompt_ids(prompt: &str) -> Vec<RecordId> {
    let start = prompt
        .rfind("{\"records\":")
        .expect("prompt should carry a records payload");
    let payload: serde_json::Value =
        serde_json::from_str(&prompt[start..]).expect("records payload should be valid JSON");

    payload["records"]
        .as_array()
        .expect("records should be an array")
        .iter()
        .map(|record| record["id"].as_i64().expect("record id should be an integer"))
        .collect()
}

/// Structured-JSON answer resolving every given id
pub fn structured_answer(ids: &[RecordId]) -> String {
    let items: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "has_place": 1,
                "places": [{ "name": format!("place-{id}") }]
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// Expected stored result for an id answered by [`structured_answer`]
pub fn structured_result(id: RecordId) -> String {
    format!(r#"{{"has_place":1,"places":[{{"name":"place-{id}"}}]}}"#)
}
