//! Process-wide request spacing

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum spacing between outbound model calls across all callers
///
/// A token bucket of size one: it spaces requests, it does not allow bursts.
/// One instance is created per process and handed to every invocation path.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for `max_qps` requests per second; non-positive disables limiting
    pub fn new(max_qps: f64) -> Self {
        let min_interval = if max_qps > 0.0 && max_qps.is_finite() {
            Some(Duration::from_secs_f64(1.0 / max_qps))
        } else {
            None
        };

        Self {
            min_interval,
            last_permit: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0.0)
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    pub fn is_enabled(&self) -> bool {
        self.min_interval.is_some()
    }

    /// Wait until a permit is available
    ///
    /// The lock is held across the sleep so permits are handed out strictly
    /// one interval apart, in arrival order.
    pub async fn wait(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let mut last_permit = self.last_permit.lock().await;
        if let Some(previous) = *last_permit {
            let next = previous + interval;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        *last_permit = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
