//! Stateful attempt counting with backoff sleeps.

use backoffkit_core::{BackoffConfig, BackoffResult, compute, compute_with_rng};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::error::Error;
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

use crate::policy::{AlwaysRetry, RetryPolicy};

/// Counts retry attempts and waits out the backoff between them.
///
/// The counter starts at 0. Each [`wait`](Self::wait) increments it, computes
/// the backoff for the new value, and sleeps for the final delay. The counter
/// is private state mutated only through `&mut self`, so one tracker serves
/// one retry loop at a time.
///
/// Retry decisions go through the injected [`RetryPolicy`]; the default
/// [`AlwaysRetry`] never says no.
///
/// # Examples
///
/// ```rust
/// use backoffkit::{AttemptTracker, BackoffConfig};
/// use std::time::Duration;
///
/// # async fn example() {
/// let config = BackoffConfig::default()
///     .with_base_delay(Duration::from_millis(1))
///     .with_jitter_factor(0.0);
/// let mut tracker = AttemptTracker::new(config);
///
/// let first = tracker.wait().await;
/// assert_eq!(first.retry_attempt(), 1);
/// assert_eq!(tracker.attempts(), 1);
///
/// tracker.reset();
/// assert_eq!(tracker.attempts(), 0);
/// # }
/// ```
pub struct AttemptTracker<P = AlwaysRetry> {
    attempts: u32,
    config: BackoffConfig,
    policy: P,
    rng: Box<dyn RngCore + Send>,
}

impl AttemptTracker {
    /// Create a tracker that always permits retries.
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_policy(config, AlwaysRetry)
    }
}

impl Default for AttemptTracker {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl<P: RetryPolicy> AttemptTracker<P> {
    /// Create a tracker with a custom retry policy.
    pub fn with_policy(config: BackoffConfig, policy: P) -> Self {
        Self {
            attempts: 0,
            config,
            policy,
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    /// Replace the jitter source, e.g. with a seeded RNG for tests.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Number of retries waited for since creation or the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Snapshot of the backoff configuration.
    pub fn config(&self) -> BackoffConfig {
        self.config
    }

    /// The injected retry policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Whether the policy permits another retry.
    pub fn can_retry(&self) -> bool {
        self.policy.can_retry(self.attempts)
    }

    /// Whether the policy considers `error` worth retrying.
    pub fn should_retry(&self, error: &dyn Error) -> bool {
        self.policy.should_retry(error, self.attempts)
    }

    /// Advance to the next attempt and sleep for its backoff.
    ///
    /// Returns the result that was slept on. This is the tracker's only
    /// suspension point; it yields to the runtime rather than blocking the
    /// thread.
    pub async fn wait(&mut self) -> BackoffResult {
        self.attempts = self.attempts.saturating_add(1);
        let result = compute_with_rng(self.attempts, &self.config, self.rng.as_mut());

        debug!(attempt = self.attempts, delay = %result, "waiting before retry");
        tokio::time::sleep(result.final_delay()).await;

        result
    }

    /// The backoff the next [`wait`](Self::wait) would use, without advancing.
    ///
    /// Neither the attempt counter nor the tracker's RNG is touched. With
    /// jitter enabled the preview draws from the thread-local RNG, so its
    /// offset need not match the later wait.
    pub fn peek(&self) -> BackoffResult {
        compute(self.attempts.saturating_add(1), &self.config)
    }

    /// Zero the attempt counter for reuse with an unrelated operation.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Run `operation` until it succeeds or the policy gives up.
    ///
    /// After every failure the policy is asked [`can_retry`](Self::can_retry)
    /// and [`should_retry`](Self::should_retry). If either declines, the
    /// failure is returned exactly as the operation produced it. Otherwise the
    /// tracker [`wait`](Self::wait)s and tries again.
    ///
    /// The counter is not reset on success or failure. With [`AlwaysRetry`]
    /// a permanently failing operation is retried forever.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use backoffkit::{AttemptTracker, BackoffConfig, PredicatePolicy};
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let config = BackoffConfig::default().with_base_delay(Duration::from_millis(1));
    /// let policy = PredicatePolicy::new().with_can_retry(|attempts| attempts < 2);
    /// let mut tracker = AttemptTracker::with_policy(config, policy);
    ///
    /// let result = tracker
    ///     .retry(|| async { Err::<(), _>(std::io::Error::other("still down")) })
    ///     .await;
    ///
    /// assert_eq!(result.unwrap_err().to_string(), "still down");
    /// assert_eq!(tracker.attempts(), 2);
    /// # }
    /// ```
    pub async fn retry<F, Fut, T, E>(&mut self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error,
    {
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !self.should_retry(&err) => {
                    debug!(attempts = self.attempts, error = %err, "error is not retryable");
                    return Err(err);
                }
                Err(err) if !self.can_retry() => {
                    warn!(attempts = self.attempts, error = %err, "giving up after retries");
                    return Err(err);
                }
                Err(err) => {
                    debug!(attempts = self.attempts, error = %err, "operation failed, backing off");
                    self.wait().await;
                }
            }
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for AttemptTracker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptTracker")
            .field("attempts", &self.attempts)
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
