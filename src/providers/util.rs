use crate::core::error::RateError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff schedule for feed requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total runs = 1 + max_retries).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    pub retryable: fn(&RateError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
            retryable: RateError::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based): `initial * multiplier^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    pub fn should_retry(&self, err: &RateError) -> bool {
        (self.retryable)(err)
    }
}

/// Retries an async operation while the policy deems the error retryable.
///
/// # Returns
/// Either the successful result or the last error once attempts run out
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, RateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RateError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt >= policy.max_retries || !policy.should_retry(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                attempt += 1;
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt,
                    policy.max_retries + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::new(6, Duration::from_secs(1))
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = with_retry(&policy, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(RateError::transient("http://feed", Some(503), "unavailable"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), _> = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RateError::permanent("http://feed", Some(404), "not found"))
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<(), _> = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RateError::transient("http://feed", None, "timed out"))
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
