//! Configuration for retries and per-stage timeouts.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`RetryConfig::max_retries`].
pub const ENV_MAX_RETRIES: &str = "CAMPAIGNFLOW_MAX_RETRIES";
/// Environment variable overriding [`RetryConfig::retry_delay_ms`].
pub const ENV_RETRY_DELAY_MS: &str = "CAMPAIGNFLOW_RETRY_DELAY_MS";
/// Environment variable overriding [`RetryConfig::backoff_ceiling_ms`].
pub const ENV_BACKOFF_CEILING_MS: &str = "CAMPAIGNFLOW_BACKOFF_CEILING_MS";
/// Environment variable overriding [`PipelineConfig::stage_timeout_ms`].
pub const ENV_STAGE_TIMEOUT_MS: &str = "CAMPAIGNFLOW_STAGE_TIMEOUT_MS";

/// Retry executor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; `0` means a single attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds, doubled on every failed attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound for any single backoff, in milliseconds.
    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_backoff_ceiling_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
        }
    }
}

impl RetryConfig {
    /// Creates a retry config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum retries.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = delay;
        self
    }

    /// Sets the backoff ceiling.
    #[must_use]
    pub fn with_backoff_ceiling_ms(mut self, ceiling: u64) -> Self {
        self.backoff_ceiling_ms = ceiling;
        self
    }

    /// Checks that delays are positive and the ceiling is reachable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_delay_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "retry_delay_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.backoff_ceiling_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "backoff_ceiling_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.backoff_ceiling_ms < self.retry_delay_ms {
            return Err(ConfigError::Invalid {
                field: "backoff_ceiling_ms",
                message: format!(
                    "{} is below retry_delay_ms {}",
                    self.backoff_ceiling_ms, self.retry_delay_ms
                ),
            });
        }
        Ok(())
    }
}

/// Pipeline-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Retry behaviour applied to every specialist invocation.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-invocation timeout in milliseconds; `None` disables it.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: Option<u64>,
}

#[allow(clippy::unnecessary_wraps)]
fn default_stage_timeout_ms() -> Option<u64> {
    Some(60_000)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            stage_timeout_ms: default_stage_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    /// Creates a pipeline config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry config.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub fn with_stage_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.stage_timeout_ms = timeout;
        self
    }

    /// Returns the per-invocation timeout as a `Duration`.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }

    /// Loads a config from a JSON file; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `CAMPAIGNFLOW_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Applies overrides from an arbitrary lookup, then validates.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_override(&lookup, ENV_MAX_RETRIES)? {
            self.retry.max_retries = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_RETRY_DELAY_MS)? {
            self.retry.retry_delay_ms = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_BACKOFF_CEILING_MS)? {
            self.retry.backoff_ceiling_ms = value;
        }
        if let Some(value) = parse_override::<u64, _>(&lookup, ENV_STAGE_TIMEOUT_MS)? {
            self.stage_timeout_ms = Some(value);
        }
        self.validate()?;
        Ok(self)
    }

    /// Validates all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        if self.stage_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "stage_timeout_ms",
                message: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_override<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Env {
            var: var.to_string(),
            value: raw,
        }),
    }
}
