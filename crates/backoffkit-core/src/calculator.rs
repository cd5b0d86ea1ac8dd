//! Exponential backoff with capping and jitter.

use rand::Rng;

use crate::attempt::IntoAttempt;
use crate::config::BackoffConfig;
use crate::result::BackoffResult;

/// Compute the backoff for `attempt`, drawing jitter from the thread-local RNG.
///
/// See [`compute_with_rng`] for the algorithm.
///
/// # Examples
///
/// ```rust
/// use backoffkit_core::{compute, BackoffConfig};
///
/// let result = compute(3, &BackoffConfig::default());
///
/// // 4000ms ±20%
/// assert!((3200.0..=4800.0).contains(&result.final_delay_ms()));
/// ```
pub fn compute(attempt: impl IntoAttempt, config: &BackoffConfig) -> BackoffResult {
    compute_with_rng(attempt, config, &mut rand::thread_rng())
}

/// Compute the backoff for `attempt` with a caller-supplied RNG.
///
/// # Mathematical Formula
///
/// ```text
/// n            = max(1, floor(attempt))
/// raw          = base_delay * 2^(n - 1)
/// capped       = min(raw, max_delay)
/// jitter_range = capped * |jitter_factor|
/// offset       = (2u - 1) * jitter_range          u ~ U[0, 1)
/// final_delay  = max(0, capped + offset)
/// ```
///
/// The cap is applied before jitter so that once the ceiling is reached the
/// delay oscillates symmetrically around `max_delay`. When `jitter_factor` is
/// zero or negative the RNG is not touched and the result is deterministic.
///
/// This function never fails and never panics. An attempt large enough to
/// overflow `2^(n - 1)` yields an infinite raw delay, which the cap reduces
/// to `max_delay`. A zero `base_delay` gives a zero raw delay at every
/// attempt, never `0 * inf`.
///
/// # Examples
///
/// ```rust
/// use backoffkit_core::{compute_with_rng, BackoffConfig};
/// use rand::{SeedableRng, rngs::StdRng};
///
/// let config = BackoffConfig::default();
/// let mut rng = StdRng::seed_from_u64(7);
///
/// let first = compute_with_rng(2, &config, &mut rng);
/// let again = compute_with_rng(2, &config, &mut StdRng::seed_from_u64(7));
/// assert_eq!(first, again);
/// ```
pub fn compute_with_rng<R>(
    attempt: impl IntoAttempt,
    config: &BackoffConfig,
    rng: &mut R,
) -> BackoffResult
where
    R: Rng + ?Sized,
{
    let attempt = attempt.into_attempt();

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let raw = if config.base_delay_ms == 0.0 {
        0.0
    } else {
        config.base_delay_ms * 2f64.powi(exponent)
    };
    let capped = raw.min(config.max_delay_ms);

    let (jitter_offset, final_delay) = if config.jitter_factor > 0.0 {
        let u: f64 = rng.gen_range(0.0..1.0);
        let jitter_range = capped * config.jitter_factor.abs();
        let offset = (2.0 * u - 1.0) * jitter_range;
        (offset, (capped + offset).max(0.0))
    } else {
        (0.0, capped.max(0.0))
    };

    let result = BackoffResult::new(attempt, raw, capped, jitter_offset, final_delay);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        attempt,
        final_delay_ms = final_delay,
        raw_delay_ms = raw,
        capped = result.was_capped(),
        jitter_offset_ms = jitter_offset,
        "computed backoff delay"
    );

    result
}
