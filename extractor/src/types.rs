//! Extractor data types

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use serde::Serialize;
use shared::{Record, RecordId, TokenUsage};

use crate::error::{ExtractorError, ExtractorResult};

/// Result stored for records still unresolved after the last retry round
pub const FORMAT_ERROR_SENTINEL: &str = r#"{"error":"format_error"}"#;

/// Delimited-encoding result meaning "no place found"
pub const NO_PLACE_SENTINEL: &str = ",";

/// Record id -> normalized result string
pub type ResultMap = HashMap<RecordId, String>;

/// Minimal view of a record sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub id: RecordId,
    pub content: String,
}

/// Ordered group of records dispatched in one invocation
///
/// Members are indices into the run's record slice, so retry batches never
/// copy record content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    members: Vec<usize>,
}

impl Batch {
    pub fn new(members: Vec<usize>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Records of this batch, in batch order
    pub fn records<'a>(&'a self, records: &'a [Record]) -> impl Iterator<Item = &'a Record> + 'a {
        self.members.iter().map(move |&idx| &records[idx])
    }

    /// Expected identifier set of this batch, in batch order
    pub fn ids(&self, records: &[Record]) -> Vec<RecordId> {
        self.records(records).map(|record| record.id).collect()
    }

    /// New batch holding only the members whose ids are not yet resolved
    pub fn unresolved(&self, records: &[Record], resolved: &HashSet<RecordId>) -> Option<Batch> {
        let members: Vec<usize> = self
            .members
            .iter()
            .copied()
            .filter(|&idx| !resolved.contains(&records[idx].id))
            .collect();

        if members.is_empty() {
            None
        } else {
            Some(Batch::new(members))
        }
    }
}

/// Response encoding requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseEncoding {
    /// JSON array of `{id, has_place, places}` objects
    StructuredBatch,
    /// `flag,places;flag,places;...` positional segments
    DelimitedBatch,
}

impl ResponseEncoding {
    /// Map the operator-facing prompt id to an encoding
    pub fn from_prompt_id(prompt_id: u8) -> ExtractorResult<Self> {
        match prompt_id {
            3 => Ok(ResponseEncoding::StructuredBatch),
            4 => Ok(ResponseEncoding::DelimitedBatch),
            other => Err(ExtractorError::config(format!(
                "Unsupported prompt id {other}: only batch prompts 3 (structured) and 4 (delimited) are supported"
            ))),
        }
    }

    pub fn prompt_id(&self) -> u8 {
        match self {
            ResponseEncoding::StructuredBatch => 3,
            ResponseEncoding::DelimitedBatch => 4,
        }
    }
}

/// Outcome of one batch within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every expected id answered
    Resolved,
    /// Some ids answered, some missing
    Partial,
    /// Invocation failed, timed out or nothing parsed
    Failed,
}

impl BatchStatus {
    pub fn classify(expected: usize, answered: usize) -> Self {
        if answered == 0 && expected > 0 {
            BatchStatus::Failed
        } else if answered < expected {
            BatchStatus::Partial
        } else {
            BatchStatus::Resolved
        }
    }
}

/// Decoded model response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub content: String,
    pub usage: TokenUsage,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub encoding: ResponseEncoding,
    pub max_workers: usize,
    /// Upper bound for one batch invocation; `None` waits indefinitely
    pub task_timeout: Option<Duration>,
    pub max_chars_per_batch: usize,
    pub max_items_per_batch: usize,
    /// Additional rounds after the first attempt
    pub max_retries: u32,
    pub progress_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-ai/DeepSeek-V3.2".to_string(),
            encoding: ResponseEncoding::StructuredBatch,
            max_workers: 8,
            task_timeout: Some(Duration::from_secs(120)),
            max_chars_per_batch: 1000,
            max_items_per_batch: 12,
            max_retries: 2,
            progress_interval: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ExtractorResult<()> {
        if self.model.trim().is_empty() {
            return Err(ExtractorError::config("model must not be empty"));
        }
        if self.max_workers == 0 {
            return Err(ExtractorError::config("max_workers must be at least 1"));
        }
        if self.max_chars_per_batch == 0 {
            return Err(ExtractorError::config("max_chars_per_batch must be at least 1"));
        }
        if self.max_items_per_batch == 0 {
            return Err(ExtractorError::config("max_items_per_batch must be at least 1"));
        }
        if self.progress_interval.is_zero() {
            return Err(ExtractorError::config("progress_interval must be positive"));
        }
        Ok(())
    }
}

/// Final result of one extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// One `(id, result)` entry per input record, in input order
    pub results: Vec<(RecordId, String)>,
    /// Rounds actually dispatched
    pub rounds: u32,
    /// Entries carrying the format-error sentinel
    pub sentinel_count: usize,
    pub usage: TokenUsage,
}

impl ExtractionOutcome {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&str> {
        self.results
            .iter()
            .find(|(rid, _)| *rid == id)
            .map(|(_, result)| result.as_str())
    }
}

pub fn is_format_error(result: &str) -> bool {
    result == FORMAT_ERROR_SENTINEL
}
