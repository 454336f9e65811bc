//! Worker-specific types

use serde::{Deserialize, Serialize};
use shared::RecordId;

/// Coordinator-assigned task identifier
pub type TaskId = i64;

/// A unit of work handed out by the task coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    pub task_id: TaskId,
    pub record_ids: Vec<RecordId>,
}

/// What one pass of the worker loop did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Nothing to claim
    Idle,
    /// Results persisted; `reported` is false when the completion call failed
    Completed {
        task_id: TaskId,
        persisted: usize,
        dropped: usize,
        reported: bool,
    },
    /// Extraction did not finish; nothing persisted and the task was not completed
    Abandoned { task_id: TaskId },
}

/// `GET /api/task/claim` response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub poem_ids: Option<Vec<RecordId>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ClaimResponse {
    /// The claimed task, if the response carries a complete one
    pub fn into_task(self) -> Option<ClaimedTask> {
        if !self.success {
            return None;
        }
        match (self.task_id, self.poem_ids) {
            (Some(task_id), Some(record_ids)) => Some(ClaimedTask { task_id, record_ids }),
            _ => None,
        }
    }
}

/// `POST /api/task/complete` request body
#[derive(Debug, Clone, Serialize)]
pub struct CompleteRequest {
    pub task_id: TaskId,
}

/// Acknowledgement body shared by the complete and health endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_response_with_task() {
        let response: ClaimResponse =
            serde_json::from_str(r#"{"success":true,"task_id":42,"poem_ids":[3,1,2],"message":""}"#).unwrap();
        assert_eq!(
            response.into_task(),
            Some(ClaimedTask { task_id: 42, record_ids: vec![3, 1, 2] })
        );
    }

    #[test]
    fn test_claim_response_without_task() {
        let response: ClaimResponse =
            serde_json::from_str(r#"{"success":false,"message":"no pending tasks"}"#).unwrap();
        assert_eq!(response.message.as_deref(), Some("no pending tasks"));
        assert_eq!(response.into_task(), None);
    }

    #[test]
    fn test_claim_response_missing_fields_is_no_task() {
        let response: ClaimResponse = serde_json::from_str(r#"{"success":true,"task_id":7}"#).unwrap();
        assert_eq!(response.into_task(), None);
    }
}
