//! Exponential backoff for node commands
//!
//! Gluster serializes cluster-wide operations with a transaction lock, so a
//! command racing with another management operation fails with "Another
//! transaction is in progress". SSH connections to busy nodes fail in similar
//! transient ways. Both are retried here; every other error is returned on
//! the first attempt.
//!
//! # Example
//!
//! ```no_run
//! use brickops::error::Result;
//! use brickops::retry::{retry_async, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn stop_volume() -> Result<()> { Ok(()) }
//! # async fn run() -> Result<()> {
//! let config = RetryConfig::new(5, Duration::from_millis(500), Duration::from_secs(30));
//! retry_async(&config, "volume stop vol1", || stop_volume()).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently a failing command is retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each later one (seconds)
    #[serde(default = "default_base_delay", with = "duration_secs")]
    pub base_delay: Duration,
    /// Upper bound for a single delay (seconds)
    #[serde(default = "default_max_delay", with = "duration_secs")]
    pub max_delay: Duration,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(default_max_retries(), default_base_delay(), default_max_delay())
    }
}

/// Position within one command's retry sequence
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    /// Retries already spent
    pub retries: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1-based number of the attempt about to run
    pub fn attempt(&self) -> u32 {
        self.retries + 1
    }

    pub fn exhausted(&self, config: &RetryConfig) -> bool {
        self.retries >= config.max_retries
    }

    /// `base_delay * 2^retries`, capped at `max_delay`
    pub fn delay(&self, config: &RetryConfig) -> Duration {
        let factor = 2u32.saturating_pow(self.retries.min(31));
        let delay = config.base_delay.saturating_mul(factor).min(config.max_delay);

        debug!("Backoff delay {:?} before attempt {}", delay, self.attempt() + 1);
        delay
    }

    pub fn advance(&mut self) {
        self.retries += 1;
    }

    /// Wall-clock time of the next attempt, for logs
    pub fn next_attempt_at(&self, config: &RetryConfig) -> chrono::DateTime<chrono::Utc> {
        let delay = chrono::Duration::from_std(self.delay(config))
            .unwrap_or_else(|_| chrono::Duration::zero());
        chrono::Utc::now() + delay
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// Only errors for which [`crate::error::BrickOpsError::is_retryable`] holds are retried.
pub async fn retry_async<T, F, Fut>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = Backoff::new();

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && !backoff.exhausted(config) => {
                let delay = backoff.delay(config);
                warn!(
                    "{} failed on attempt {} ({}), retrying at {}",
                    what,
                    backoff.attempt(),
                    e,
                    backoff.next_attempt_at(config).to_rfc3339()
                );
                tokio::time::sleep(delay).await;
                backoff.advance();
            }
            Err(e) => {
                if backoff.retries > 0 {
                    warn!("{} failed after {} retries: {}", what, backoff.retries, e);
                }
                return Err(e);
            }
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
