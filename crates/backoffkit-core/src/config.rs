//! Backoff configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::attempt::IntoAttempt;
use crate::calculator;
use crate::error::{ConfigError, Result};
use crate::result::BackoffResult;

/// Default delay for the first attempt, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: f64 = 1000.0;

/// Default ceiling for the capped delay, in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: f64 = 5000.0;

/// Default jitter factor (±20%).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Environment variable for [`BackoffConfig::base_delay_ms`].
pub const ENV_BASE_DELAY_MS: &str = "BACKOFF_BASE_DELAY_MS";

/// Environment variable for [`BackoffConfig::max_delay_ms`].
pub const ENV_MAX_DELAY_MS: &str = "BACKOFF_MAX_DELAY_MS";

/// Environment variable for [`BackoffConfig::jitter_factor`].
pub const ENV_JITTER_FACTOR: &str = "BACKOFF_JITTER_FACTOR";

/// Parameters for the backoff calculation.
///
/// Delays are plain `f64` milliseconds so that fractional and overflowing
/// intermediate values stay representable until the final result.
///
/// No field is validated. A `max_delay_ms` below `base_delay_ms` caps every
/// attempt, and a `jitter_factor` above 1.0 simply widens the jitter range.
///
/// # Serialization
///
/// The serde form uses the field names `baseDelay`, `maxDelay` and
/// `jitterFactor`. Missing fields take their defaults and unknown fields are
/// ignored:
///
/// ```rust
/// use backoffkit_core::BackoffConfig;
///
/// let config = BackoffConfig::from_json(r#"{"maxDelay": 30000, "retries": 9}"#).unwrap();
/// assert_eq!(config.base_delay_ms, 1000.0);
/// assert_eq!(config.max_delay_ms, 30000.0);
/// assert_eq!(config.jitter_factor, 0.2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay for attempt 1, in milliseconds.
    #[serde(rename = "baseDelay")]
    pub base_delay_ms: f64,

    /// Ceiling applied before jitter, in milliseconds.
    #[serde(rename = "maxDelay")]
    pub max_delay_ms: f64,

    /// Fraction of the capped delay used as the jitter range.
    ///
    /// Zero or negative disables jitter.
    #[serde(rename = "jitterFactor")]
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    /// Defaults:
    /// - `base_delay_ms`: 1000
    /// - `max_delay_ms`: 5000
    /// - `jitter_factor`: 0.2
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl BackoffConfig {
    /// Set the delay for the first attempt.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = duration_to_millis(delay);
        self
    }

    /// Set the ceiling for the capped delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = duration_to_millis(delay);
        self
    }

    /// Set the jitter factor.
    ///
    /// The value is stored as given. Unlike most jitter knobs it is not
    /// clamped to `[0, 1]`.
    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Compute the backoff for `attempt` using the thread-local RNG.
    ///
    /// Shorthand for [`compute`](crate::compute).
    pub fn compute(&self, attempt: impl IntoAttempt) -> BackoffResult {
        calculator::compute(attempt, self)
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the input is not valid JSON or a
    /// recognized field has the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from environment variables.
    ///
    /// This will look for:
    /// - `BACKOFF_BASE_DELAY_MS` for the base delay
    /// - `BACKOFF_MAX_DELAY_MS` for the maximum delay
    /// - `BACKOFF_JITTER_FACTOR` for the jitter factor
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNumber`] if a variable is set but does
    /// not parse as a number.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = env_number(ENV_BASE_DELAY_MS)? {
            config.base_delay_ms = value;
        }
        if let Some(value) = env_number(ENV_MAX_DELAY_MS)? {
            config.max_delay_ms = value;
        }
        if let Some(value) = env_number(ENV_JITTER_FACTOR)? {
            config.jitter_factor = value;
        }

        Ok(config)
    }
}

fn env_number(var: &'static str) -> Result<Option<f64>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        Err(_) => Ok(None),
    }
}

fn duration_to_millis(delay: Duration) -> f64 {
    delay.as_secs() as f64 * 1000.0 + f64::from(delay.subsec_nanos()) / 1_000_000.0
}
