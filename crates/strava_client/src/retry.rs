use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Capped exponential backoff, 1-indexed: 1s, 2s, 4s, ... up to 30s.
pub fn backoff(attempt: u32) -> Duration {
    RetryPolicy::default().delay_for(attempt)
}

/// Attempt budget and backoff cap for a single page request.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` failed. No jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.max(1) - 1;
        // 2^31 seconds is far past any cap; clamp the shift instead of overflowing.
        let factor = 1u32.checked_shl(exp.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Suspension point used for every retry and rate-limit wait, so tests can
/// run the full control flow without real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub fn tokio_sleeper() -> Arc<dyn Sleeper> {
    Arc::new(TokioSleeper)
}
