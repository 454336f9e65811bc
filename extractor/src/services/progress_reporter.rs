//! Periodic progress reporting for an extraction run

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::ExtractorResult;
use crate::types::ResultMap;

/// Integer percentage of `done` over `total`; an empty run reports 0
pub fn progress_percent(done: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        100 * done / total
    }
}

/// Background observer of a run's shared result map
///
/// Purely observational. Must be stopped with [`ProgressReporter::stop`],
/// which waits for the task to finish.
pub struct ProgressReporter {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<u64>,
}

impl ProgressReporter {
    /// Spawn the reporter; it logs every `interval` until stopped
    pub fn start(total: usize, results: Arc<RwLock<ResultMap>>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut reports = 0u64;
            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => break,

                    _ = tokio::time::sleep(interval) => {
                        let done = results.read().await.len();
                        info!(
                            done,
                            total,
                            "📋 Extraction progress: {} / {} records ({}%)",
                            done,
                            total,
                            progress_percent(done, total)
                        );
                        reports += 1;
                    }
                }
            }
            reports
        });

        Self { stop_tx, handle }
    }

    /// Signal the reporter to stop and wait for it; returns the number of reports emitted
    pub async fn stop(self) -> ExtractorResult<u64> {
        // the receiver only disappears if the task already ended
        let _ = self.stop_tx.send(());
        Ok(self.handle.await?)
    }
}
