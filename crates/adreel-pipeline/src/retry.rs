//! Retry with timeout and exponential backoff for remote inference calls.

use adreel_inference::{InferenceError, InferenceResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{info_span, warn, Instrument};

use crate::metrics::record_retry;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging and metrics.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Exponential delay cap for a given attempt, before jitter.
    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Backoff with full jitter, never below `base_delay`.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let cap = self.backoff_for_attempt(attempt).as_millis() as u64;
        let jittered = if cap > 0 {
            rand::rng().random_range(0..=cap)
        } else {
            0
        };
        Duration::from_millis(jittered).max(self.base_delay.min(self.max_delay))
    }
}

/// Run `op` under `timeout`, retrying retryable failures.
///
/// A timeout counts as a retryable [`InferenceError::Timeout`].
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, timeout: Duration, op: F) -> InferenceResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = InferenceResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        let span = info_span!(
            "remote_call",
            operation = %config.operation_name,
            attempt = attempt + 1
        );
        let result = match tokio::time::timeout(timeout, op()).instrument(span).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(timeout.as_secs())),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.jittered_delay(attempt);
                attempt += 1;
                warn!(
                    operation = %config.operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote call failed, retrying"
                );
                record_retry(&config.operation_name);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(name: &str) -> RetryConfig {
        RetryConfig::new(name)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::new("test")
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500));
        assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for_attempt(5), Duration::from_millis(500));
        let d = config.jittered_delay(3);
        assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_eventual_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast("vision"), Duration::from_secs(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(InferenceError::Status {
                        status: 503,
                        body: String::new(),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: InferenceResult<()> = with_retry(&fast("chat"), Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(InferenceError::parse("bad")) }
        })
        .await;
        assert!(matches!(result, Err(InferenceError::Parse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_reported() {
        let calls = AtomicU32::new(0);
        let config = fast("transcription").with_max_retries(1);
        let result: InferenceResult<()> = with_retry(&config, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        })
        .await;
        assert!(matches!(result, Err(InferenceError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
