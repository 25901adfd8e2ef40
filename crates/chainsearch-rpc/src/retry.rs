//! Exponential backoff for transient transport failures.
//!
//! Only HTTP and timeout errors are retried. A node answering with a
//! JSON-RPC error (including a result-limit rejection) is never retried
//! here; the search engine reacts to those by narrowing the range.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff settings for [`RetryPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// Computes the delay before each retry.
#[derive(Debug, Clone)]
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

    /// Delay before retry number `attempt` (1-based), or `None` once the
    /// budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let factor = self.config.multiplier.max(1.0).powi(attempt as i32 - 1);
        let delay = self.config.initial_backoff.mul_f64(factor);
        Some(delay.min(self.config.max_backoff))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32, max_backoff_ms: u64) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(max_backoff_ms),
            multiplier: 2.0,
        })
    }

    #[test]
    fn delays_double_until_budget_spent() {
        let p = policy(3, 10_000);
        assert_eq!(p.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(p.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(p.next_delay(3), Some(Duration::from_millis(400)));
        assert_eq!(p.next_delay(4), None);
    }

    #[test]
    fn delay_is_capped() {
        let p = policy(10, 300);
        assert_eq!(p.next_delay(8), Some(Duration::from_millis(300)));
    }

    #[test]
    fn disabled_never_retries() {
        let p = RetryPolicy::new(RetryConfig::disabled());
        assert_eq!(p.next_delay(1), None);
    }

    #[test]
    fn config_from_json_uses_millis() {
        let cfg: RetryConfig =
            serde_json::from_str(r#"{"max_retries":1,"initial_backoff":50}"#).unwrap();
        assert_eq!(cfg.max_retries, 1);
        assert_eq!(cfg.initial_backoff, Duration::from_millis(50));
        assert_eq!(cfg.max_backoff, Duration::from_secs(5));
    }
}
