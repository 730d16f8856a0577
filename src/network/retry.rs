//! Retry logic with exponential backoff

use std::time::Duration;
use tracing::warn;
use crate::errors::{BotError, BotResult};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay after `delay`, grown by the exponential base, capped, with +/-5% jitter.
    fn next_delay(&self, delay: u64) -> u64 {
        let grown = ((delay as f64 * self.exponential_base) as u64).min(self.max_delay_ms);
        let jitter = (grown as f64 * 0.1 * (rand::random::<f64>() - 0.5)) as i64;
        grown.saturating_add_signed(jitter)
    }
}

/// Retry `operation` while it fails with a transient error, up to `max_attempts`.
/// Non-transient errors are returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    config: &RetryConfig,
    context: &str,
) -> BotResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = BotResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay_ms;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(BotError::Network {
                message: format!("{} failed after {} attempts", context, attempt),
                source: Some(error.into()),
                retry_count: attempt,
            });
        }

        warn!(
            attempt,
            max_attempts,
            "🔁 {} failed: {}. Retrying in {}ms",
            context, error, delay
        );
        tokio::time::sleep(Duration::from_millis(delay)).await;
        delay = config.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            exponential_base: 2.0,
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(BotError::Network {
                        message: "flaky".into(),
                        source: None,
                        retry_count: 0,
                    })
                } else {
                    Ok(7)
                }
            },
            &fast(),
            "test",
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: BotResult<()> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BotError::Timeout {
                    operation: "submit".into(),
                    after: Duration::from_millis(1),
                })
            },
            &fast(),
            "submit",
        )
        .await;
        assert!(matches!(result, Err(BotError::Network { retry_count: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: BotResult<()> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BotError::config("bad"))
            },
            &fast(),
            "config",
        )
        .await;
        assert!(matches!(result, Err(BotError::Config { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
