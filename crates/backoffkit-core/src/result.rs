//! The outcome of one backoff calculation.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::time::Duration;

/// Delay to wait before a retry, together with how it was derived.
///
/// A `BackoffResult` is an immutable snapshot of a single calculation. All
/// delays are in milliseconds.
///
/// | Field | Meaning |
/// |-------|---------|
/// | `raw_delay_ms` | `base_delay * 2^(attempt - 1)`, may be `+inf` |
/// | `capped_delay_ms` | `min(raw, max_delay)` |
/// | `jitter_offset_ms` | signed random adjustment, `0.0` without jitter |
/// | `final_delay_ms` | `max(0, capped + jitter)` |
///
/// # Examples
///
/// ```rust
/// use backoffkit_core::prelude::*;
///
/// let config = BackoffConfig::default().with_jitter_factor(0.0);
/// let result = config.compute(2);
///
/// assert_eq!(result.retry_attempt(), 2);
/// assert_eq!(result.final_delay(), std::time::Duration::from_millis(2000));
/// assert_eq!(
///     result.to_string(),
///     "attempt 2: waiting 2000ms (raw 2000ms, not capped, no jitter)"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffResult {
    final_delay_ms: f64,
    raw_delay_ms: f64,
    capped_delay_ms: f64,
    jitter_offset_ms: f64,
    retry_attempt: u32,
}

impl BackoffResult {
    pub(crate) fn new(
        retry_attempt: u32,
        raw_delay_ms: f64,
        capped_delay_ms: f64,
        jitter_offset_ms: f64,
        final_delay_ms: f64,
    ) -> Self {
        Self {
            final_delay_ms,
            raw_delay_ms,
            capped_delay_ms,
            jitter_offset_ms,
            retry_attempt,
        }
    }

    /// The delay to actually wait, in milliseconds. Never negative.
    pub fn final_delay_ms(&self) -> f64 {
        self.final_delay_ms
    }

    /// The uncapped exponential delay, in milliseconds.
    pub fn raw_delay_ms(&self) -> f64 {
        self.raw_delay_ms
    }

    /// The delay after the ceiling was applied, before jitter.
    pub fn capped_delay_ms(&self) -> f64 {
        self.capped_delay_ms
    }

    /// The signed jitter adjustment, `0.0` if jitter was disabled.
    pub fn jitter_offset_ms(&self) -> f64 {
        self.jitter_offset_ms
    }

    /// The normalized attempt number used for the calculation.
    pub fn retry_attempt(&self) -> u32 {
        self.retry_attempt
    }

    /// Whether the ceiling reduced the raw delay.
    pub fn was_capped(&self) -> bool {
        self.raw_delay_ms > self.capped_delay_ms
    }

    /// Whether a jitter adjustment was applied.
    pub fn has_jitter(&self) -> bool {
        self.jitter_offset_ms != 0.0
    }

    /// The final delay as a [`Duration`].
    ///
    /// Non-positive and NaN delays map to [`Duration::ZERO`], delays too large
    /// for a `Duration` map to [`Duration::MAX`].
    pub fn final_delay(&self) -> Duration {
        millis_to_duration(self.final_delay_ms)
    }
}

fn millis_to_duration(ms: f64) -> Duration {
    if ms.is_nan() || ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
}

impl fmt::Display for BackoffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {}: waiting {:.0}ms (raw {:.0}ms, {}, ",
            self.retry_attempt,
            self.final_delay_ms,
            self.raw_delay_ms,
            if self.was_capped() { "capped" } else { "not capped" },
        )?;
        if self.has_jitter() {
            write!(f, "jitter {:+.0}ms)", self.jitter_offset_ms)
        } else {
            f.write_str("no jitter)")
        }
    }
}

impl Serialize for BackoffResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BackoffResult", 6)?;
        state.serialize_field("finalDelay", &self.final_delay_ms)?;
        state.serialize_field("rawDelay", &self.raw_delay_ms)?;
        state.serialize_field("cappedDelay", &self.capped_delay_ms)?;
        state.serialize_field("jitterOffset", &self.jitter_offset_ms)?;
        state.serialize_field("wasCapped", &self.was_capped())?;
        state.serialize_field("retryAttempt", &self.retry_attempt)?;
        state.end()
    }
}
