//! Delivery configuration
//!
//! Queue location, request timeout, send rate and retry policy for the CHORDS
//! relay. Every field has a default so the whole block is optional in the run
//! configuration.

use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Directory name under the platform data dir
const APP_DIR: &str = "sunpower-relay";

/// Queue database file name
const QUEUE_FILE: &str = "queue.db";

/// Delivery settings for the relay
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// SQLite file backing the queue; defaults to the platform data dir
    pub queue_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// Upper bound on outgoing requests; 0 disables the limit
    pub requests_per_minute: u32,
    /// How often an idle sender checks the queue
    pub poll_interval_ms: u64,
    pub retry: RetryConfig,
}

/// Exponential backoff for failed deliveries
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts before an entry is dropped; 0 retries forever
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_path: None,
            request_timeout_secs: 10,
            requests_per_minute: 600,
            poll_interval_ms: 500,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl DeliveryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Minimum spacing between two requests
    pub fn send_interval(&self) -> Duration {
        if self.requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / self.requests_per_minute
        }
    }

    /// Configured queue file, or `<data dir>/sunpower-relay/queue.db`
    pub fn resolve_queue_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.queue_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_local_dir().context("Could not determine local data directory")?;
        Ok(data_dir.join(APP_DIR).join(QUEUE_FILE))
    }
}

impl RetryConfig {
    /// Whether an entry that failed `attempts` times should be dropped
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }

    /// Backoff before the next attempt, after `attempts` failures
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(32) as i32;
        let raw = self.base_delay_ms as f64 * self.backoff_multiplier.max(1.0).powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);

        let millis = if self.jitter {
            capped * rand::rng().random_range(0.5..=1.0)
        } else {
            capped
        };

        Duration::from_millis(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = no_jitter();
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(1_000));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(2_000));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(4_000));
        assert_eq!(retry.delay_for_attempt(20), Duration::from_millis(60_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let retry = RetryConfig::default();
        for _ in 0..50 {
            let delay = retry.delay_for_attempt(2);
            assert!(delay >= Duration::from_millis(1_000));
            assert!(delay <= Duration::from_millis(2_000));
        }
    }

    #[test]
    fn test_exhausted() {
        let forever = RetryConfig::default();
        assert!(!forever.exhausted(1_000));

        let limited = RetryConfig {
            max_attempts: 3,
            ..RetryConfig::default()
        };
        assert!(!limited.exhausted(2));
        assert!(limited.exhausted(3));
    }

    #[test]
    fn test_send_interval() {
        let config = DeliveryConfig::default();
        assert_eq!(config.send_interval(), Duration::from_millis(100));

        let unlimited = DeliveryConfig {
            requests_per_minute: 0,
            ..DeliveryConfig::default()
        };
        assert_eq!(unlimited.send_interval(), Duration::ZERO);
    }

    #[test]
    fn test_explicit_queue_path() {
        let config = DeliveryConfig {
            queue_path: Some(PathBuf::from("/var/lib/relay/queue.db")),
            ..DeliveryConfig::default()
        };
        assert_eq!(
            config.resolve_queue_path().unwrap(),
            PathBuf::from("/var/lib/relay/queue.db")
        );
    }
}
