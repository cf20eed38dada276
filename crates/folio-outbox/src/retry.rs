//! Linear backoff retry for event publication.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How often, and how patiently, a failed publication is retried.
///
/// Attempt `n` (1-based) that fails is followed by a pause of
/// `backoff_step * n` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,

    /// Delay unit multiplied by the failed attempt number.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_step: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    /// Returns `true` if another attempt follows failed attempt `attempt`.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }

    /// Runs `operation` until it succeeds or attempts run out.
    ///
    /// The operation receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the error from the final attempt.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if self.should_retry(attempt) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
