//! Exponential backoff with jitter for a single adapter call.

use errors::ProviderResult;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Attempt ceiling and backoff shape for one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Fractional jitter applied to each delay, `0.2` means ±20%.
    pub jitter_factor: f64
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            jitter_factor: 0.2
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Un-jittered delay after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if self.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
        base.mul_f64((1.0 + factor).max(0.0))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt ceiling is reached. The last error is returned unmodified.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    provider: &str,
    operation: F
) -> ProviderResult<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = ProviderResult<T>>
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() || attempt >= policy.max_attempts => return Err(err),
            Err(err) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    provider,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "provider attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
