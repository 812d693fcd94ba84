//! Bounded retry with exponential backoff
//!
//! The store itself never retries a failed fetch; retrying is the
//! caller's policy. Wrap a fetcher with [`retrying_fetcher`] to opt in.

use crate::source::Fetcher;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first failure
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Execute a fallible async operation with bounded retries
///
/// Returns the terminal error once `max_retries` is exhausted.
pub async fn with_retry<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    let mut backoff = config.initial_backoff;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    warn!(
                        attempts = attempt,
                        error = %e,
                        "retries exhausted"
                    );
                    return Err(e);
                }

                let delay = apply_jitter(backoff, config.jitter);

                warn!(
                    attempt = attempt,
                    max = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after failure"
                );

                tokio::time::sleep(delay).await;

                backoff = Duration::from_millis(
                    ((backoff.as_millis() as f64 * config.backoff_multiplier)
                        .min(config.max_backoff.as_millis() as f64)) as u64,
                );
            }
        }
    }
}

/// Wrap a fetcher so each scheduled fetch retries per `config`
pub fn retrying_fetcher(config: RetryConfig, inner: Fetcher) -> Fetcher {
    Arc::new(move || {
        let config = config.clone();
        let inner = Arc::clone(&inner);
        Box::pin(async move { with_retry(config, move || inner()).await })
    })
}

fn apply_jitter(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3);
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = with_retry(config, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, SourceError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_failures() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(10),
            jitter: false,
            ..Default::default()
        };

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = with_retry(config, move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(SourceError::Unavailable("temporary".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_surfaces_after_exhaustion() {
        let config = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            jitter: false,
            ..Default::default()
        };

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let result: Result<i32, _> = with_retry(config, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err(SourceError::Fetch("persistent".to_string())) }
        })
        .await;

        assert_eq!(
            result.unwrap_err(),
            SourceError::Fetch("persistent".to_string())
        );
        // initial attempt + 2 retries
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_fetcher_retries_and_succeeds() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let inner: Fetcher = Arc::new(move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if count == 0 {
                    Err(SourceError::Unavailable("flaky".to_string()))
                } else {
                    Ok(serde_json::json!({ "ok": true }))
                }
            })
        });

        let config = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        };
        let fetcher = retrying_fetcher(config, inner);

        let value = fetcher().await.unwrap();
        assert_eq!(value, serde_json::json!({ "ok": true }));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
