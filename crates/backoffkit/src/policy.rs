//! Retry decision hooks for [`AttemptTracker`](crate::AttemptTracker).

use std::error::Error;
use std::fmt;

/// Decides whether an [`AttemptTracker`](crate::AttemptTracker) should retry.
///
/// Both methods default to `true`. Override them to cap total attempts or to
/// tell transient failures from permanent ones.
///
/// # Examples
///
/// ```rust
/// use backoffkit::RetryPolicy;
/// use std::error::Error;
///
/// struct NetworkOnly;
///
/// impl RetryPolicy for NetworkOnly {
///     fn should_retry(&self, error: &dyn Error, _attempts: u32) -> bool {
///         error.to_string().to_lowercase().contains("network")
///     }
/// }
///
/// let err = std::io::Error::other("network unreachable");
/// assert!(NetworkOnly.should_retry(&err, 0));
/// assert!(NetworkOnly.can_retry(100));
/// ```
pub trait RetryPolicy: Send + Sync {
    /// Whether another attempt is permitted at all.
    ///
    /// # Parameters
    /// - `attempts`: retries already waited for
    fn can_retry(&self, attempts: u32) -> bool {
        let _ = attempts;
        true
    }

    /// Whether this particular failure is worth retrying.
    ///
    /// # Parameters
    /// - `error`: the failure to classify
    /// - `attempts`: retries already waited for
    fn should_retry(&self, error: &dyn Error, attempts: u32) -> bool {
        let _ = (error, attempts);
        true
    }
}

/// Policy that always permits a retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl RetryPolicy for AlwaysRetry {}

type CanRetryFn = Box<dyn Fn(u32) -> bool + Send + Sync>;
type ShouldRetryFn = Box<dyn Fn(&dyn Error, u32) -> bool + Send + Sync>;

/// A [`RetryPolicy`] assembled from closures.
///
/// Any hook left unset behaves like [`AlwaysRetry`].
///
/// # Examples
///
/// ```rust
/// use backoffkit::{PredicatePolicy, RetryPolicy};
///
/// let policy = PredicatePolicy::new()
///     .with_can_retry(|attempts| attempts < 5)
///     .with_should_retry(|error, _| !error.to_string().contains("unauthorized"));
///
/// assert!(policy.can_retry(4));
/// assert!(!policy.can_retry(5));
/// ```
#[derive(Default)]
pub struct PredicatePolicy {
    can_retry: Option<CanRetryFn>,
    should_retry: Option<ShouldRetryFn>,
}

impl PredicatePolicy {
    /// Create a policy with both hooks unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry-permission predicate.
    pub fn with_can_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        self.can_retry = Some(Box::new(predicate));
        self
    }

    /// Set the error-classification predicate.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Error, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Box::new(predicate));
        self
    }
}

impl RetryPolicy for PredicatePolicy {
    fn can_retry(&self, attempts: u32) -> bool {
        self.can_retry.as_ref().is_none_or(|f| f(attempts))
    }

    fn should_retry(&self, error: &dyn Error, attempts: u32) -> bool {
        self.should_retry.as_ref().is_none_or(|f| f(error, attempts))
    }
}

impl fmt::Debug for PredicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicatePolicy")
            .field("can_retry", &self.can_retry.is_some())
            .field("should_retry", &self.should_retry.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_always_retry() {
        let err = std::io::Error::other("boom");

        assert!(AlwaysRetry.can_retry(u32::MAX));
        assert!(AlwaysRetry.should_retry(&err, 10));
    }

    #[test]
    fn test_unset_predicates_default_to_true() {
        let policy = PredicatePolicy::new();
        let err = std::io::Error::other("boom");

        assert!(policy.can_retry(1_000));
        assert!(policy.should_retry(&err, 1_000));
    }

    #[test]
    fn test_predicates_are_consulted() {
        let policy = PredicatePolicy::new()
            .with_can_retry(|attempts| attempts < 2)
            .with_should_retry(|error, _| error.to_string().contains("timeout"));

        assert!(policy.can_retry(1));
        assert!(!policy.can_retry(2));
        assert!(policy.should_retry(&std::io::Error::other("timeout"), 0));
        assert!(!policy.should_retry(&std::io::Error::other("forbidden"), 0));
    }

    #[rstest]
    #[case("connection reset", 0, true)]
    #[case("connection reset", 3, false)]
    #[case("unauthorized", 0, false)]
    fn test_combined_decision(#[case] message: &str, #[case] attempts: u32, #[case] retry: bool) {
        let policy = PredicatePolicy::new()
            .with_can_retry(|attempts| attempts < 3)
            .with_should_retry(|error, _| !error.to_string().contains("unauthorized"));
        let err = std::io::Error::other(message);

        let decision = policy.should_retry(&err, attempts) && policy.can_retry(attempts);
        assert_eq!(decision, retry);
    }

    #[test]
    fn test_debug_output() {
        let policy = PredicatePolicy::new().with_can_retry(|_| true);
        assert_eq!(
            format!("{policy:?}"),
            "PredicatePolicy { can_retry: true, should_retry: false }"
        );
    }
}
