//! Worker trait definitions for dependency injection

use async_trait::async_trait;

use shared::{Record, RecordId};
use crate::error::WorkerResult;
use crate::types::{ClaimedTask, TaskId};

/// Central task coordinator handing out and accepting tasks
#[mockall::automock]
#[async_trait]
pub trait TaskCoordinator: Send + Sync {
    /// Claim the next pending task; `None` when there is nothing to do
    async fn claim(&self) -> WorkerResult<Option<ClaimedTask>>;

    /// Report a task as done
    async fn complete(&self, task_id: TaskId) -> WorkerResult<()>;

    /// Check the coordinator is reachable, returning its status message
    async fn health_check(&self) -> WorkerResult<String>;
}

/// Source of records to extract from
#[mockall::automock]
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch records by id, ordered by id; unknown ids are omitted
    async fn fetch_by_ids(&self, ids: &[RecordId]) -> WorkerResult<Vec<Record>>;
}

/// Destination for extraction results
#[mockall::automock]
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store results for a task, returning the number of rows written
    async fn persist(&self, task_id: TaskId, results: &[(RecordId, String)]) -> WorkerResult<usize>;
}
