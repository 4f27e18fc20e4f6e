use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential reconnection backoff.
///
/// The delay before attempt `n` (1-based) is
/// `initial · multiplierⁿ⁻¹`, capped at `max`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    /// Give up after this many consecutive failures; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 10_000,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.initial_ms as f64 * self.multiplier.powi(exp);
        let capped = scaled.min(self.max_ms as f64).max(1.0);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `failures` failures.
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_ms == 0 {
            return Err("backoff initial_ms must be non-zero".to_string());
        }
        if self.max_ms < self.initial_ms {
            return Err("backoff max_ms must not be below initial_ms".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err("backoff multiplier must be finite and >= 1".to_string());
        }
        if self.max_attempts == Some(0) {
            return Err("backoff max_attempts must be positive when set".to_string());
        }
        Ok(())
    }
}
