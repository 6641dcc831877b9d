//! Timeout and exponential backoff helpers for provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{QuoteEngineError, RetryClass};
use crate::models::RetryPolicy;

/// Run `future`, cancelling it once `timeout` elapses.
pub async fn with_timeout<T, Fut>(
    provider: &str,
    timeout: Duration,
    future: Fut,
) -> Result<T, QuoteEngineError>
where
    Fut: Future<Output = Result<T, QuoteEngineError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(QuoteEngineError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Run `operation` until it succeeds, fails permanently, or the retry budget
/// is spent.
///
/// Only [`RetryClass::WithBackoff`] errors are retried. Retry `i` (0-based)
/// sleeps `initialDelay * backoffMultiplier^i` first. The last error is
/// returned once `max_retries` retries have failed.
pub async fn retry_with_backoff<T, F, Fut>(
    provider: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, QuoteEngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QuoteEngineError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error)
                if error.retry_class() == RetryClass::WithBackoff
                    && attempt < policy.max_retries =>
            {
                let delay = policy.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    "{}: attempt failed ({}), retry {}/{} in {:?}",
                    provider, error, attempt, policy.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1,
        }
    }

    fn network_error() -> QuoteEngineError {
        QuoteEngineError::Network {
            provider: "TEST".to_string(),
            message: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let attempts = AtomicU32::new(0);

        let result = retry_with_backoff("TEST", &policy(3), || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(network_error())
            } else {
                Ok("quotes")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "quotes");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_error_propagates_after_budget() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff("TEST", &policy(2), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(QuoteEngineError::Http {
                provider: "TEST".to_string(),
                status: 503,
                status_text: "Service Unavailable".to_string(),
            })
        })
        .await;

        assert!(matches!(
            result,
            Err(QuoteEngineError::Http { status: 503, .. })
        ));
        // One initial attempt plus two retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff("TEST", &policy(5), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(QuoteEngineError::Http {
                provider: "TEST".to_string(),
                status: 400,
                status_text: "Bad Request".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let attempts = AtomicU32::new(0);

        let _: Result<(), _> = retry_with_backoff("TEST", &policy(0), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(network_error())
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_cancels_slow_call() {
        let result: Result<(), _> = with_timeout("SLOW", Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(QuoteEngineError::Timeout {
                provider,
                timeout_ms,
            }) => {
                assert_eq!(provider, "SLOW");
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_passes_fast_result_through() {
        let result = with_timeout("FAST", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
