use crate::errors::SourceError;
use backoff::future::retry_notify;
use backoff::{Error as BackoffError, ExponentialBackoffBuilder};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or `max_attempts` is
/// reached. Only transient errors are retried; the delay grows
/// exponentially between attempts.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let attempts = AtomicU32::new(0);

    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_delay)
        .with_multiplier(policy.multiplier)
        .with_randomization_factor(0.2)
        .with_max_interval(policy.max_delay)
        .with_max_elapsed_time(None)
        .build();

    let result = retry_notify(
        backoff,
        || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let fut = op();
            async move {
                match fut.await {
                    Ok(v) => Ok(v),
                    Err(e) if e.is_transient() && attempt < max_attempts => {
                        Err(BackoffError::transient(e))
                    }
                    Err(e) if e.is_transient() => Err(BackoffError::permanent(
                        SourceError::Exhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        },
                    )),
                    Err(e) => Err(BackoffError::permanent(e)),
                }
            }
        },
        |err: SourceError, delay: Duration| {
            tracing::warn!(
                event = "benchlens.source.retry",
                op = op_name,
                attempt = attempts.load(Ordering::Relaxed),
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying {} after transient failure",
                op_name
            );
        },
    )
    .await;

    if let Err(e) = &result {
        tracing::error!(
            event = "benchlens.source.failed",
            op = op_name,
            attempts = attempts.load(Ordering::Relaxed),
            error = %e,
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let out = with_retry(&fast(4), "get_benchmark_details", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SourceError::Transport("connection reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast(3), "get_benchmark_details", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(SourceError::Transport("refused".into())) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, SourceError::Exhausted { attempts: 3, .. }));
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast(5), "get_benchmark_details", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(SourceError::NotFound("benchmark 4".into())) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, SourceError::NotFound(_)));
    }
}
