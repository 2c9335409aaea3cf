//! Bounded retry with exponential backoff for upstream calls.
//!
//! Only errors classified as retryable (network, timeout, 429, 5xx) are
//! retried. Both the in-flight attempt and the backoff sleep race the
//! cancellation token, so cancelling aborts the whole sequence promptly.

use crate::config::RetryConfig;
use crate::error::{ConductorError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier.max(1),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Calculate the delay before retrying after a failed `attempt` (1-indexed).
    ///
    /// ```
    /// use conductor::tools::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.calculate_backoff(1), Duration::from_secs(1));
    /// assert_eq!(policy.calculate_backoff(3), Duration::from_secs(4));
    /// assert_eq!(policy.calculate_backoff(10), Duration::from_secs(60));
    /// ```
    #[must_use]
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.multiplier).saturating_pow(exponent);
        let initial = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(initial.saturating_mul(factor).min(max))
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// # Errors
///
/// - [`ConductorError::Cancelled`] if the token fires
/// - the original error if it is not retryable
/// - [`ConductorError::RetriesExhausted`] after the last retryable failure
pub async fn with_retry<T, F, Fut>(
    service: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ConductorError::cancelled(service)),
            result = operation(attempt) => result,
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if attempt >= policy.max_attempts {
            return Err(ConductorError::RetriesExhausted {
                service: service.to_string(),
                attempts: attempt,
                last_error: error.to_string(),
            });
        }

        let delay = policy.calculate_backoff(attempt);
        warn!(
            service,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Upstream call failed, retrying"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ConductorError::cancelled(service)),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
