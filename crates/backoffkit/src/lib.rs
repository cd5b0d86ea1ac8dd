#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Retry delays for transient failures.
//!
//! `backoffkit` builds two collaborators on top of the pure calculator in
//! [`backoffkit_core`]:
//!
//! - **[`AttemptTracker`]**: counts attempts, sleeps for the computed delay,
//!   and asks a [`RetryPolicy`] whether to keep going
//! - **[`BackoffEmission`]**: a cancellable, single-shot [`Stream`](futures::Stream)
//!   that fires once the computed delay has elapsed
//!
//! Neither decides which errors are retryable or how many attempts are
//! allowed. Those decisions belong to the caller, through a policy or its
//! own retry loop.
//!
//! # Examples
//!
//! ```rust
//! use backoffkit::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let config = BackoffConfig::default()
//!     .with_base_delay(Duration::from_millis(10))
//!     .with_max_delay(Duration::from_millis(100));
//!
//! let policy = PredicatePolicy::new().with_can_retry(|attempts| attempts < 3);
//! let mut tracker = AttemptTracker::with_policy(config, policy);
//!
//! let value = tracker
//!     .retry(|| async { Ok::<_, std::io::Error>(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod emission;
pub mod policy;
pub mod tracker;

pub use backoffkit_core::{
    BackoffConfig, BackoffResult, ConfigError, IntoAttempt, compute, compute_with_rng,
};
pub use emission::{
    BackoffEmission, BackoffEvent, EmissionConfig, EmissionHandle, backoff_emission,
    debug_retry_delay_fn, retry_delay_fn,
};
pub use policy::{AlwaysRetry, PredicatePolicy, RetryPolicy};
pub use tracker::AttemptTracker;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use backoffkit::prelude::*;
/// ```
pub mod prelude {
    pub use backoffkit_core::prelude::*;

    pub use crate::emission::{
        BackoffEmission, BackoffEvent, EmissionConfig, EmissionHandle, backoff_emission,
        debug_retry_delay_fn, retry_delay_fn,
    };
    pub use crate::policy::{AlwaysRetry, PredicatePolicy, RetryPolicy};
    pub use crate::tracker::AttemptTracker;
}
