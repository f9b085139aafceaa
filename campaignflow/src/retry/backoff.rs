//! Deterministic backoff computation.

use crate::config::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retries performed after the first attempt when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Computes the wait after failed attempt `attempt` (0-indexed).
///
/// `base * 2^attempt`, saturating, capped at `ceiling`.
#[must_use]
pub fn compute_backoff(attempt: u32, base: Duration, ceiling: Duration) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(ceiling_ms))
}

/// Retry limits and backoff parameters for one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay.
    pub base_delay: Duration,
    /// Maximum single delay.
    pub ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(RetryConfig::default())
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
            ceiling: Duration::from_millis(config.backoff_ceiling_ms),
        }
    }
}

impl RetryPolicy {
    /// Returns the total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the wait after failed attempt `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        compute_backoff(attempt, self.base_delay, self.ceiling)
    }
}
