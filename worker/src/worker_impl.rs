//! Worker loop with dependency injection
//!
//! One pass claims a task, fetches its records, runs extraction, persists the
//! usable results and reports the task complete. `run` repeats passes until
//! shutdown is requested.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use extractor::{is_format_error, ExtractionEngine, ModelInvoker};
use shared::logging::{log_error, log_shutdown, log_startup};
use shared::{process_debug, process_error, process_info, process_warn, RecordId, WorkerId};

use crate::error::WorkerResult;
use crate::traits::{RecordSource, ResultSink, TaskCoordinator};
use crate::types::{ClaimedTask, TaskId, TaskOutcome};

/// Longest uninterrupted sleep while waiting, so shutdown is noticed promptly
const SHUTDOWN_CHECK: Duration = Duration::from_secs(1);

/// What to do about an interrupt signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// First interrupt: stop claiming and let the current task wind down
    Graceful,
    /// Repeated interrupt: exit without waiting
    Force,
}

/// Record an interrupt on the shutdown flag and decide how to react
pub fn register_interrupt(shutdown: &AtomicBool) -> InterruptAction {
    if shutdown.swap(true, Ordering::SeqCst) {
        InterruptAction::Force
    } else {
        InterruptAction::Graceful
    }
}

/// Poll interval plus up to 10% random jitter
pub fn jittered(base: Duration) -> Duration {
    let max_jitter = (base.as_millis() / 10) as u64;
    if max_jitter == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}

/// Worker with dependency injection
pub struct Worker<C, S, K, M>
where
    C: TaskCoordinator,
    S: RecordSource,
    K: ResultSink,
    M: ModelInvoker,
{
    worker_id: &'static WorkerId,
    coordinator: C,
    source: S,
    sink: K,
    engine: ExtractionEngine<M>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<C, S, K, M> Worker<C, S, K, M>
where
    C: TaskCoordinator,
    S: RecordSource,
    K: ResultSink,
    M: ModelInvoker,
{
    /// Create a worker; the engine shares the worker's shutdown flag
    pub fn new(coordinator: C, source: S, sink: K, engine: ExtractionEngine<M>, poll_interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));

        Self {
            worker_id: WorkerId::current(),
            coordinator,
            source,
            sink,
            engine: engine.with_shutdown(shutdown.clone()),
            poll_interval,
            shutdown,
        }
    }

    /// Flag that stops the loop (and any extraction in progress) when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Run worker passes until shutdown; with `once`, stop after the first pass
    pub async fn run(&self, once: bool) -> WorkerResult<()> {
        log_startup(
            self.worker_id,
            &format!("worker with model {}", self.engine.config().model),
        );

        match self.coordinator.health_check().await {
            Ok(message) => {
                process_info!(self.worker_id, "💚 Coordinator health check: {}", message);
            }
            Err(e) => {
                process_warn!(
                    self.worker_id,
                    error = %e,
                    "Coordinator health check failed, will keep trying to claim tasks"
                );
            }
        }

        while !self.is_shutdown() {
            match self.process_one_task().await {
                Ok(TaskOutcome::Idle) => {
                    if once {
                        break;
                    }
                    process_info!(
                        self.worker_id,
                        "💤 No pending task, retrying in {}s",
                        self.poll_interval.as_secs()
                    );
                    self.wait_for_next_poll().await;
                }
                Ok(_) if once => break,
                Ok(_) => {}
                Err(e) => {
                    log_error(self.worker_id, "Task pass", &e);
                    if once {
                        return Err(e);
                    }
                    self.wait_for_next_poll().await;
                }
            }
        }

        log_shutdown(
            self.worker_id,
            if self.is_shutdown() { "shutdown requested" } else { "single pass finished" },
        );
        Ok(())
    }

    /// Claim, extract, persist and complete a single task
    pub async fn process_one_task(&self) -> WorkerResult<TaskOutcome> {
        let ClaimedTask { task_id, record_ids } = match self.coordinator.claim().await? {
            Some(task) => task,
            None => return Ok(TaskOutcome::Idle),
        };
        process_info!(
            self.worker_id,
            task_id,
            records = record_ids.len(),
            "📥 Claimed task {} with {} records",
            task_id,
            record_ids.len()
        );

        let records = self.source.fetch_by_ids(&record_ids).await?;
        if records.len() != record_ids.len() {
            let fetched: HashSet<RecordId> = records.iter().map(|r| r.id).collect();
            let missing: Vec<RecordId> = record_ids
                .iter()
                .copied()
                .filter(|id| !fetched.contains(id))
                .collect();
            process_warn!(
                self.worker_id,
                task_id,
                requested = record_ids.len(),
                fetched = records.len(),
                "Some records are missing from the store: {:?}",
                missing
            );
        }

        if records.is_empty() {
            process_warn!(self.worker_id, task_id, "Task {} has no usable records, completing it", task_id);
            let reported = self.report_complete(task_id).await;
            return Ok(TaskOutcome::Completed { task_id, persisted: 0, dropped: 0, reported });
        }

        let outcome = match self.engine.run(&records).await {
            Ok(outcome) => outcome,
            Err(e) => {
                process_error!(
                    self.worker_id,
                    task_id,
                    error = %e,
                    "❌ Extraction failed for task {}, leaving it incomplete",
                    task_id
                );
                return Ok(TaskOutcome::Abandoned { task_id });
            }
        };

        if self.is_shutdown() && outcome.sentinel_count > 0 {
            process_warn!(
                self.worker_id,
                task_id,
                unresolved = outcome.sentinel_count,
                "🛑 Shutdown interrupted task {}, leaving it incomplete",
                task_id
            );
            return Ok(TaskOutcome::Abandoned { task_id });
        }

        let (kept, dropped): (Vec<_>, Vec<_>) = outcome
            .results
            .into_iter()
            .partition(|(_, result)| !is_format_error(result));
        for (record_id, _) in &dropped {
            process_warn!(
                self.worker_id,
                task_id,
                record_id,
                "Format error result not persisted for record {}",
                record_id
            );
        }

        let persisted = self.sink.persist(task_id, &kept).await?;
        process_info!(
            self.worker_id,
            task_id,
            persisted,
            dropped = dropped.len(),
            "💾 Task {} stored {} results",
            task_id,
            persisted
        );

        let reported = self.report_complete(task_id).await;
        Ok(TaskOutcome::Completed {
            task_id,
            persisted,
            dropped: dropped.len(),
            reported,
        })
    }

    async fn report_complete(&self, task_id: TaskId) -> bool {
        match self.coordinator.complete(task_id).await {
            Ok(()) => {
                process_info!(self.worker_id, task_id, "✅ Task {} completed and reported", task_id);
                true
            }
            Err(e) => {
                process_error!(self.worker_id, task_id, error = %e, "Reporting task {} complete failed", task_id);
                false
            }
        }
    }

    async fn wait_for_next_poll(&self) {
        let deadline = Instant::now() + jittered(self.poll_interval);
        while !self.is_shutdown() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep((deadline - now).min(SHUTDOWN_CHECK)).await;
        }
        process_debug!(self.worker_id, "Poll wait over");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let base = Duration::from_secs(30);
        for _ in 0..100 {
            let delay = jittered(base);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_secs(3));
        }
    }

    #[test]
    fn test_second_interrupt_forces_exit() {
        let shutdown = AtomicBool::new(false);

        assert_eq!(register_interrupt(&shutdown), InterruptAction::Graceful);
        assert!(shutdown.load(Ordering::SeqCst));
        assert_eq!(register_interrupt(&shutdown), InterruptAction::Force);
        assert_eq!(register_interrupt(&shutdown), InterruptAction::Force);
    }

    #[test]
    fn test_interrupt_after_programmatic_shutdown_forces_exit() {
        let shutdown = AtomicBool::new(true);
        assert_eq!(register_interrupt(&shutdown), InterruptAction::Force);
    }

    #[test]
    fn test_jitter_on_tiny_interval_is_exact() {
        assert_eq!(jittered(Duration::from_millis(5)), Duration::from_millis(5));
    }
}
