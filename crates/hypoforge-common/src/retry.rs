//! Bounded retry with linear backoff for outbound HTTP calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::HypoforgeError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means a single attempt.
    pub max_retries: u32,
    /// Delay before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_millis(2000) }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with a non-transient error,
    /// or the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, HypoforgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HypoforgeError>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    let delay = self.base_delay * retries;
                    warn!(what, retries, max = self.max_retries, error = %e, "Request failed, retrying in {:?}", delay);
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
