//! Retry logic for idempotent requests.
//!
//! Implements exponential backoff with jitter. Only errors for which
//! [`Error::is_retryable`] holds are retried; everything else surfaces on the
//! first failure.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self::default()
    }

    /// Calculate the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..1.5);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Execute an operation, retrying transient failures according to `policy`.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempts >= policy.max_retries {
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempts);
                attempts += 1;
                tracing::info!(
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
