//! Batch dispatch and retry engine
//!
//! Drives extraction in rounds. Each round dispatches every pending batch to a
//! bounded pool of concurrent invocations; batches that come back partial or
//! failed contribute their unresolved records to the next round. When the retry
//! ceiling is reached every still-unresolved record gets the format-error
//! sentinel, so the output always has exactly one entry per input record.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use shared::{ApiFailure, Record, RecordId, TokenUsage};

use crate::core::{encode_batch, parse_response, partition, PromptTemplate};
use crate::error::{ExtractorError, ExtractorResult};
use crate::services::{progress_percent, ProgressReporter, RateLimiter};
use crate::traits::ModelInvoker;
use crate::types::{
    Batch, BatchStatus, EngineConfig, ExtractionOutcome, ModelResponse, ResultMap, FORMAT_ERROR_SENTINEL,
};

const RESPONSE_PREVIEW_CHARS: usize = 200;

/// Parsed answer of one batch invocation
struct ParsedBatch {
    results: ResultMap,
    usage: TokenUsage,
}

/// A batch together with what happened to it this round
struct BatchDispatch {
    batch: Batch,
    expected: Vec<RecordId>,
    outcome: Result<ParsedBatch, ApiFailure>,
}

/// Counters for one round, used for logging only
#[derive(Default)]
struct RoundTally {
    resolved: usize,
    partial: usize,
    failed: usize,
}

impl RoundTally {
    fn record(&mut self, status: BatchStatus) {
        match status {
            BatchStatus::Resolved => self.resolved += 1,
            BatchStatus::Partial => self.partial += 1,
            BatchStatus::Failed => self.failed += 1,
        }
    }
}

/// Concurrent batch-extraction engine with dependency-injected model invocation
pub struct ExtractionEngine<M>
where
    M: ModelInvoker,
{
    invoker: Arc<M>,
    rate_limiter: Arc<RateLimiter>,
    config: EngineConfig,
    shutdown: Arc<AtomicBool>,
}

impl<M> ExtractionEngine<M>
where
    M: ModelInvoker,
{
    /// Create an engine; invalid configuration is rejected here, before any invocation
    pub fn new(invoker: Arc<M>, rate_limiter: Arc<RateLimiter>, config: EngineConfig) -> ExtractorResult<Self> {
        config.validate()?;

        Ok(Self {
            invoker,
            rate_limiter,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share a shutdown flag; once set, no new round is started
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract results for every record
    ///
    /// Returns one entry per record in input order. Only a fatal invocation
    /// failure (e.g. rejected credentials) produces an error.
    pub async fn run(&self, records: &[Record]) -> ExtractorResult<ExtractionOutcome> {
        let total = records.len();
        let results = Arc::new(RwLock::new(ResultMap::with_capacity(total)));

        let reporter = ProgressReporter::start(total, results.clone(), self.config.progress_interval);
        let rounds = self.run_rounds(records, &results).await;
        // the reporter is always joined, also when the run aborts
        let reports = reporter.stop().await?;
        let (rounds, usage) = rounds?;

        let mut results = results.write().await;
        let resolved = results.len();
        let mut unresolved = 0usize;
        for record in records {
            results.entry(record.id).or_insert_with(|| {
                unresolved += 1;
                FORMAT_ERROR_SENTINEL.to_string()
            });
        }

        let ordered: Vec<(RecordId, String)> = records
            .iter()
            .map(|record| (record.id, results.get(&record.id).cloned().unwrap_or_default()))
            .collect();
        let sentinel_count = ordered
            .iter()
            .filter(|(_, result)| result == FORMAT_ERROR_SENTINEL)
            .count();

        info!(
            resolved,
            total,
            rounds,
            unresolved,
            progress_reports = reports,
            total_tokens = usage.total_tokens,
            "✅ Extraction finished: {} / {} records resolved ({}%) after {} round(s), {} marked as format errors",
            resolved.min(total),
            total,
            progress_percent(resolved.min(total), total),
            rounds,
            unresolved
        );

        Ok(ExtractionOutcome {
            results: ordered,
            rounds,
            sentinel_count,
            usage,
        })
    }

    /// Dispatch rounds until nothing is pending, the ceiling is hit or shutdown is requested
    async fn run_rounds(
        &self,
        records: &[Record],
        results: &Arc<RwLock<ResultMap>>,
    ) -> ExtractorResult<(u32, TokenUsage)> {
        let mut pending = partition(records, self.config.max_chars_per_batch, self.config.max_items_per_batch);
        let mut usage = TokenUsage::default();
        let mut rounds = 0u32;

        info!(
            records = records.len(),
            batches = pending.len(),
            model = %self.config.model,
            "Partitioned {} records into {} batches",
            records.len(),
            pending.len()
        );

        for round in 0..=self.config.max_retries {
            if pending.is_empty() {
                break;
            }
            if self.shutdown.load(Ordering::Relaxed) {
                warn!(round, pending = pending.len(), "🛑 Shutdown requested, not starting round {}", round);
                break;
            }
            if round > 0 {
                info!(round, batches = pending.len(), "🔄 Starting retry round {} with {} batches", round, pending.len());
            }
            rounds += 1;

            let mut next_round = Vec::new();
            let mut tally = RoundTally::default();
            let mut in_flight = stream::iter(pending.into_iter().map(|batch| self.dispatch(batch, records)))
                .buffer_unordered(self.config.max_workers);

            while let Some(dispatch) = in_flight.next().await {
                let BatchDispatch { batch, expected, outcome } = dispatch;

                let answered = match outcome {
                    Ok(parsed) => {
                        usage.accumulate(&parsed.usage);
                        parsed.results
                    }
                    Err(failure) if failure.is_fatal() => {
                        warn!(round, error = %failure, "❌ Fatal invocation failure, aborting run");
                        return Err(ExtractorError::InvocationError { reason: failure });
                    }
                    Err(failure) => {
                        warn!(
                            round,
                            first_id = expected.first().copied(),
                            last_id = expected.last().copied(),
                            error = %failure,
                            "Batch invocation failed"
                        );
                        ResultMap::new()
                    }
                };

                let resolved_ids: HashSet<RecordId> = answered.keys().copied().collect();
                tally.record(BatchStatus::classify(expected.len(), resolved_ids.len()));

                if !answered.is_empty() {
                    results.write().await.extend(answered);
                }
                if let Some(retry) = batch.unresolved(records, &resolved_ids) {
                    next_round.push(retry);
                }
            }

            info!(
                round,
                resolved = tally.resolved,
                partial = tally.partial,
                failed = tally.failed,
                "Round {} finished: {} resolved, {} partial, {} failed batches",
                round,
                tally.resolved,
                tally.partial,
                tally.failed
            );

            pending = next_round;
        }

        if !pending.is_empty() {
            let remaining: usize = pending.iter().map(Batch::len).sum();
            warn!(remaining, "{} records still unresolved after {} round(s)", remaining, rounds);
        }

        Ok((rounds, usage))
    }

    /// Rate-limit, invoke and parse one batch
    async fn dispatch(&self, batch: Batch, records: &[Record]) -> BatchDispatch {
        let expected = batch.ids(records);
        let outcome = self.invoke_batch(&batch, records, &expected).await;
        BatchDispatch { batch, expected, outcome }
    }

    async fn invoke_batch(
        &self,
        batch: &Batch,
        records: &[Record],
        expected: &[RecordId],
    ) -> Result<ParsedBatch, ApiFailure> {
        let payloads = encode_batch(batch, records);
        let prompt = PromptTemplate::build(self.config.encoding, &payloads)
            .map_err(|e| ApiFailure::InvalidRequest(e.to_string()))?;

        self.rate_limiter.wait().await;

        let call = self.invoker.invoke(&prompt, &self.config.model);
        let response: ModelResponse = match self.config.task_timeout {
            // dropping the timed-out call abandons it; its result can never reach the result map
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result?,
                Err(_) => return Err(ApiFailure::Timeout),
            },
            None => call.await?,
        };

        let results = parse_response(&response.content, expected, self.config.encoding);
        if results.is_empty() && !response.content.trim().is_empty() {
            let preview: String = response.content.chars().take(RESPONSE_PREVIEW_CHARS).collect();
            warn!(records = expected.len(), "Batch response could not be parsed, preview: {}...", preview);
        } else {
            debug!(records = expected.len(), answered = results.len(), "Batch parsed");
        }

        Ok(ParsedBatch {
            results,
            usage: response.usage,
        })
    }
}
