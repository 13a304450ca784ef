//! Bounded retry with capped exponential backoff.
//!
//! Used for outbound social posts, where a transient failure should be
//! retried a few times and then reported instead of looping forever.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `f` until it succeeds or the attempts are exhausted.
    pub async fn retry<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => {
                    warn!(operation, attempts, error = %err, "Giving up after final attempt");
                    return Err(PipelineError::TransientPost {
                        operation: operation.to_string(),
                        attempts,
                        message: format!("{err:#}"),
                    });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
