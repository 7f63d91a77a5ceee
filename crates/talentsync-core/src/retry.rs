//! Retry policy with exponential backoff and optional jitter.

use std::time::Duration;

/// Exponential backoff: the delay before retry `n` is `base * factor^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// The initial backoff duration.
    pub base: Duration,
    /// The multiplicative factor for each subsequent retry.
    pub factor: f64,
    /// The maximum duration to wait between retries.
    pub max: Duration,
    /// Whether to apply random jitter (+/- 50%) to the delay.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::doubling(Duration::from_secs(1))
    }
}

impl Backoff {
    /// Deterministic doubling schedule: `base`, `2 * base`, `4 * base`, ...
    pub const fn doubling(base: Duration) -> Self {
        Self {
            base,
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let seconds = self.base.as_secs_f64() * self.factor.powi(exponent);
        let capped_seconds = seconds.min(self.max.as_secs_f64());

        let mut delay = Duration::from_secs_f64(capped_seconds);

        if self.jitter {
            let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
            let random_offset = fastrand::u64(0..=(jitter_ms * 2));
            let total_ms = delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
            delay = Duration::from_millis(total_ms.max(0) as u64);
        }

        delay
    }
}

/// Configuration for the executor's retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Enables or disables retries. When disabled a request is tried exactly once.
    pub enabled: bool,
    /// Retries after the initial attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Whether 5xx responses are retried. 4xx responses never are.
    pub retry_on_server_error: bool,
    pub retry_on_timeout: bool,
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_server_error: true,
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total transport attempts allowed for one request.
    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_server_error && status >= 500
    }

    /// Delay before retry number `retry` (0-based: the first retry is 0).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        self.backoff.delay(retry)
    }
}
