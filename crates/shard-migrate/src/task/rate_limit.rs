//! Read-side rate limiting.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};

/// Throttles dumper reads.
#[async_trait]
pub trait RateLimitAlgorithm: fmt::Debug + Send + Sync {
    /// Wait until the next read is allowed.
    async fn intercept(&self);

    fn kind(&self) -> &'static str;
}

/// Allows at most `qps` reads per second across every task sharing it.
pub struct QpsRateLimitAlgorithm {
    qps: u32,
    // Created on first use so construction does not need a runtime
    interval: Mutex<Option<Interval>>,
}

impl QpsRateLimitAlgorithm {
    pub fn new(qps: u32) -> Self {
        Self {
            qps: qps.max(1),
            interval: Mutex::new(None),
        }
    }

    pub fn qps(&self) -> u32 {
        self.qps
    }

    fn period(&self) -> Duration {
        Duration::from_secs(1) / self.qps
    }
}

impl fmt::Debug for QpsRateLimitAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QpsRateLimitAlgorithm")
            .field("qps", &self.qps)
            .finish()
    }
}

#[async_trait]
impl RateLimitAlgorithm for QpsRateLimitAlgorithm {
    async fn intercept(&self) {
        let mut guard = self.interval.lock().await;
        let interval = guard.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(self.period());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
    }

    fn kind(&self) -> &'static str {
        "QPS"
    }
}
