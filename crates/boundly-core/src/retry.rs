//! Bounded retry with exponential backoff, jitter and a per-attempt timeout.
//!
//! Every outbound call (embedding, index query, bulk write) goes through a
//! [`RetryPolicy`]. Exhausting the policy turns a transient failure into
//! [`Error::RetriesExhausted`] for that unit of work. Nothing waits forever.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter: true,
            attempt_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            min_backoff: Duration::from_millis(s.min_backoff_ms),
            max_backoff: Duration::from_millis(s.max_backoff_ms.max(s.min_backoff_ms)),
            jitter: s.jitter,
            attempt_timeout: (s.timeout_secs > 0).then(|| Duration::from_secs(s.timeout_secs)),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no timeout.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
            attempt_timeout: None,
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    ///
    /// The ceiling doubles per attempt from `min_backoff` and is capped at
    /// `max_backoff`; with jitter the delay is drawn uniformly from
    /// `[min_backoff, ceiling]`.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(31);
        let ceiling = self
            .min_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
            .max(self.min_backoff);
        if !self.jitter || ceiling <= self.min_backoff {
            return ceiling;
        }
        let lo = self.min_backoff.as_millis() as u64;
        let hi = ceiling.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, f())
                    .await
                    .unwrap_or(Err(Error::Timeout(limit))),
                None => f().await,
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(Error::RetriesExhausted {
                        op: op.to_string(),
                        attempts: attempt,
                        source: Box::new(e),
                    })
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(op, attempt, max_attempts, ?delay, error = %e, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
