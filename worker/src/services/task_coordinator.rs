//! HTTP client for the central task coordinator

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::config::endpoint;
use crate::error::{WorkerError, WorkerResult};
use crate::traits::TaskCoordinator;
use crate::types::{ClaimResponse, ClaimedTask, CompleteRequest, StatusResponse, TaskId};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Real task coordinator implementation
pub struct RealTaskCoordinator {
    client: reqwest::Client,
    claim_url: Url,
    complete_url: Url,
    health_url: Url,
}

impl RealTaskCoordinator {
    pub fn new(base_url: &Url) -> WorkerResult<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            claim_url: endpoint(base_url, "api/task/claim")?,
            complete_url: endpoint(base_url, "api/task/complete")?,
            health_url: endpoint(base_url, "api/health")?,
        })
    }
}

#[async_trait]
impl TaskCoordinator for RealTaskCoordinator {
    async fn claim(&self) -> WorkerResult<Option<ClaimedTask>> {
        let response: ClaimResponse = self
            .client
            .get(self.claim_url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.success {
            debug!(
                message = response.message.as_deref().unwrap_or(""),
                "No task claimed"
            );
        }
        Ok(response.into_task())
    }

    async fn complete(&self, task_id: TaskId) -> WorkerResult<()> {
        let response: StatusResponse = self
            .client
            .post(self.complete_url.clone())
            .json(&CompleteRequest { task_id })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.success {
            Ok(())
        } else {
            Err(WorkerError::coordinator(format!(
                "completing task {} rejected: {}",
                task_id,
                response.message.unwrap_or_else(|| "no message".to_string())
            )))
        }
    }

    async fn health_check(&self) -> WorkerResult<String> {
        let response: StatusResponse = self
            .client
            .get(self.health_url.clone())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let message = response.message.unwrap_or_default();
        if response.success {
            Ok(message)
        } else {
            Err(WorkerError::coordinator(format!("health check failed: {message}")))
        }
    }
}
