//! Runtime configuration.
//!
//! Every knob has a default and can be overridden through a `TALENTSYNC_*`
//! environment variable:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TALENTSYNC_MAX_CONCURRENT` | `10` |
//! | `TALENTSYNC_RATE_LIMIT_PER_MINUTE` | `100` |
//! | `TALENTSYNC_REQUEST_TIMEOUT_MS` | `30000` |
//! | `TALENTSYNC_RETRY_ATTEMPTS` | `3` |
//! | `TALENTSYNC_RETRY_BASE_DELAY_MS` | `1000` |
//! | `TALENTSYNC_RETRY_JITTER` | `false` (spread each delay by +/- 50%) |
//! | `TALENTSYNC_CACHE_TTL_MS` | `300000` |
//! | `TALENTSYNC_HEALTH_CHECK_INTERVAL_MS` | `300000` |
//! | `TALENTSYNC_HEALTH_TIMEOUT_MS` | `10000` |
//! | `TALENTSYNC_BATCH_PAUSE_MS` | `2000` |
//! | `TALENTSYNC_FAILURE_THRESHOLD` | `3` |
//! | `TALENTSYNC_FETCH_LIMIT` | `100` |
//! | `TALENTSYNC_JOB_LOCATION` | `Saudi Arabia` (empty disables the filter) |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::{Backoff, RetryConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Sources synced concurrently within one batch.
    pub max_concurrent: usize,
    /// Default per-source ceiling for the trailing 60 second window.
    pub rate_limit_per_minute: u32,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub cache_ttl: Duration,
    pub health_check_interval: Duration,
    pub health_timeout: Duration,
    /// Pause inserted between consecutive batches of a fleet run.
    pub batch_pause: Duration,
    /// Consecutive failed syncs before a source is demoted to `error`.
    pub failure_threshold: u32,
    /// `limit` query parameter sent with listing requests.
    pub fetch_limit: u32,
    /// `location` query parameter sent with job listing requests.
    pub job_location: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            rate_limit_per_minute: 100,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            cache_ttl: Duration::from_secs(300),
            health_check_interval: Duration::from_secs(300),
            health_timeout: Duration::from_secs(10),
            batch_pause: Duration::from_secs(2),
            failure_threshold: 3,
            fetch_limit: 100,
            job_location: Some(String::from("Saudi Arabia")),
        }
    }
}

impl SyncConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = read::<usize>(&lookup, "TALENTSYNC_MAX_CONCURRENT")? {
            config.max_concurrent = positive("TALENTSYNC_MAX_CONCURRENT", value)?;
        }
        if let Some(value) = read::<u32>(&lookup, "TALENTSYNC_RATE_LIMIT_PER_MINUTE")? {
            config.rate_limit_per_minute = positive("TALENTSYNC_RATE_LIMIT_PER_MINUTE", value)?;
        }
        if let Some(value) = read::<u64>(&lookup, "TALENTSYNC_REQUEST_TIMEOUT_MS")? {
            config.request_timeout =
                Duration::from_millis(positive("TALENTSYNC_REQUEST_TIMEOUT_MS", value)?);
        }
        if let Some(value) = read::<u32>(&lookup, "TALENTSYNC_RETRY_ATTEMPTS")? {
            config.retry.max_retries = value;
            config.retry.enabled = value > 0;
        }
        if let Some(value) = read::<u64>(&lookup, "TALENTSYNC_RETRY_BASE_DELAY_MS")? {
            config.retry.backoff = Backoff::doubling(Duration::from_millis(value));
        }
        if let Some(value) = read::<bool>(&lookup, "TALENTSYNC_RETRY_JITTER")? {
            config.retry.backoff = config.retry.backoff.with_jitter(value);
        }
        if let Some(value) = read::<u64>(&lookup, "TALENTSYNC_CACHE_TTL_MS")? {
            config.cache_ttl = Duration::from_millis(value);
        }
        if let Some(value) = read::<u64>(&lookup, "TALENTSYNC_HEALTH_CHECK_INTERVAL_MS")? {
            config.health_check_interval =
                Duration::from_millis(positive("TALENTSYNC_HEALTH_CHECK_INTERVAL_MS", value)?);
        }
        if let Some(value) = read::<u64>(&lookup, "TALENTSYNC_HEALTH_TIMEOUT_MS")? {
            config.health_timeout =
                Duration::from_millis(positive("TALENTSYNC_HEALTH_TIMEOUT_MS", value)?);
        }
        if let Some(value) = read::<u64>(&lookup, "TALENTSYNC_BATCH_PAUSE_MS")? {
            config.batch_pause = Duration::from_millis(value);
        }
        if let Some(value) = read::<u32>(&lookup, "TALENTSYNC_FAILURE_THRESHOLD")? {
            config.failure_threshold = positive("TALENTSYNC_FAILURE_THRESHOLD", value)?;
        }
        if let Some(value) = read::<u32>(&lookup, "TALENTSYNC_FETCH_LIMIT")? {
            config.fetch_limit = positive("TALENTSYNC_FETCH_LIMIT", value)?;
        }
        if let Some(value) = lookup("TALENTSYNC_JOB_LOCATION") {
            let trimmed = value.trim();
            config.job_location = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        }

        Ok(config)
    }
}

fn read<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|error| ConfigError::InvalidEnv {
            name,
            value: raw.clone(),
            reason: error.to_string(),
        })
}

fn positive<T>(name: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
            reason: String::from("must be greater than zero"),
        })
    }
}
