//! Bounded retry with backoff for transient failures.
//!
//! Only wallet signing and network calls (publish, fetch, registry) go through
//! here. Key derivation and AEAD failures are deterministic and are never
//! retried.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::defaults::{
    MAX_BACKOFF_MS, NETWORK_BACKOFF_MS, NETWORK_MAX_ATTEMPTS, WALLET_BACKOFF_MS,
    WALLET_MAX_ATTEMPTS,
};
use crate::error::{Error, Result};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

/// Retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::network()
    }
}

impl RetryPolicy {
    /// Wallet signature requests: 3 attempts, linear backoff.
    pub fn wallet() -> Self {
        Self {
            max_attempts: WALLET_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(WALLET_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            backoff: Backoff::Linear,
        }
    }

    /// Publish, fetch and registry calls: exponential backoff.
    pub fn network() -> Self {
        Self {
            max_attempts: NETWORK_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(NETWORK_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            backoff: Backoff::Exponential,
        }
    }

    /// Single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: Backoff::Linear,
        }
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts. Retryability follows [`Error::is_retryable`].
pub async fn retry_async<T, F, Fut>(policy: &RetryPolicy, op: &str, f: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async_if(policy, op, Error::is_retryable, f).await
}

/// Like [`retry_async`] with a caller-supplied retryability predicate.
pub async fn retry_async_if<T, F, Fut, P>(
    policy: &RetryPolicy,
    op: &str,
    should_retry: P,
    mut f: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match f(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op, attempt, "retry: succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts && should_retry(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retry: transient failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::wallet();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_exponential_delays_capped() {
        let policy = RetryPolicy::network().with_max_delay(Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_async(&RetryPolicy::wallet(), "sign", |_| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::SignatureTransient("offline".into()))
                } else {
                    Ok("sig")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "sig");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry_async(&RetryPolicy::wallet(), "sign", |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::SignatureTransient("offline".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::SignatureTransient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry_async(&RetryPolicy::wallet(), "sign", |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::SignatureRejected("user declined".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::SignatureRejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let result: Result<u32> = retry_async_if(
            &RetryPolicy::network(),
            "fetch",
            |e| matches!(e, Error::Fetch { not_found: true, .. }),
            |attempt| async move {
                if attempt < 2 {
                    Err(Error::Fetch {
                        content_id: "cid".into(),
                        not_found: true,
                        message: "404".into(),
                    })
                } else {
                    Ok(attempt)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let policy = RetryPolicy::none().with_max_attempts(0);
        let result = retry_async(&policy, "op", |attempt| async move { Ok::<_, Error>(attempt) }).await;
        assert_eq!(result.unwrap(), 1);
    }
}
