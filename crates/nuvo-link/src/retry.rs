//! Bounded retry for fragile exchanges
//!
//! The link occasionally answers a status query with a busy marker, an
//! unrelated line or nothing at all. [`RetryPolicy::run`] repeats the
//! exchange a fixed number of times and reports the last failure.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::LinkError;

/// Attempt count and spacing for a retried exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least one is always made)
    pub attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts are used up
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, LinkError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LinkError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", label, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {}ms",
                        label,
                        attempt,
                        attempts,
                        e,
                        self.delay.as_millis()
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!("{} gave up after {} attempts: {}", label, attempts, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
