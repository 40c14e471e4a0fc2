//! Retry policy with exponential backoff and jitter.
//!
//! Defaults match the provider contract: base 500 ms, factor 2, ±20 %
//! jitter, 30 s cap, five attempts.

use std::time::Duration;

use rand::Rng;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0) applied around each delay.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No retries, for non-idempotent operations.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }
}

/// Retry policy implementation
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay for a given attempt (1-indexed), jittered.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self
            .config
            .initial_delay
            .mul_f64(self.config.multiplier.powi((attempt - 1) as i32));
        self.add_jitter(base.min(self.config.max_delay))
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let mut rng = rand::thread_rng();
        let jitter = delay.mul_f64(rng.gen_range(0.0..self.config.jitter_factor));
        if rng.gen_bool(0.5) {
            delay + jitter
        } else {
            delay.saturating_sub(jitter)
        }
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }
}

/// Drive an async operation under a policy, retrying while the predicate
/// accepts the error.
pub async fn retry_with<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.config.max_retries || !should_retry(&e) {
                    return Err(e);
                }
                attempt += 1;
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_matches_provider_contract() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.multiplier, 2.0);
    }

    #[test]
    fn test_exponential_delays_without_jitter() {
        let policy = RetryPolicy::new(RetryConfig {
            jitter_factor: 0.0,
            ..Default::default()
        });
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            initial_delay: Duration::from_secs(20),
            jitter_factor: 0.0,
            ..Default::default()
        });
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::new(RetryConfig {
            initial_delay: Duration::from_secs(1),
            jitter_factor: 0.2,
            ..Default::default()
        });
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(800));
            assert!(delay <= Duration::from_millis(1200));
        }
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(RetryConfig {
            initial_delay: Duration::from_millis(1),
            jitter_factor: 0.0,
            ..Default::default()
        });

        let result: Result<u32, &str> = retry_with(
            &policy,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(n)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), &str> = retry_with(
            &policy,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent") }
            },
            |e| *e != "permanent",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
