#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Exponential backoff calculation with capping and jitter.
//!
//! This crate holds the one piece of the backoffkit workspace with real
//! numeric content: turning an attempt number and a [`BackoffConfig`] into a
//! [`BackoffResult`]. The calculation is synchronous, never fails, and
//! touches nothing but a random number generator.
//!
//! # Algorithm
//!
//! ```text
//! attempt     = max(1, floor(attempt))
//! raw         = base_delay * 2^(attempt - 1)
//! capped      = min(raw, max_delay)
//! jitter      = (2u - 1) * capped * |jitter_factor|     u ~ U[0, 1)
//! final_delay = max(0, capped + jitter)
//! ```
//!
//! Jitter is skipped entirely when `jitter_factor <= 0`.
//!
//! # Examples
//!
//! ```rust
//! use backoffkit_core::prelude::*;
//!
//! let config = BackoffConfig::default().with_jitter_factor(0.0);
//!
//! let result = compute(4, &config);
//! assert_eq!(result.raw_delay_ms(), 8000.0);
//! assert_eq!(result.final_delay_ms(), 5000.0);
//! assert!(result.was_capped());
//! ```
//!
//! # Features
//!
//! - `tracing`: emit one `debug` event per calculation.

pub mod attempt;
pub mod calculator;
pub mod config;
pub mod error;
pub mod result;


pub use attempt::IntoAttempt;
pub use calculator::{compute, compute_with_rng};
pub use config::BackoffConfig;
pub use error::{ConfigError, Result};
pub use result::BackoffResult;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use backoffkit_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attempt::IntoAttempt;
    pub use crate::calculator::{compute, compute_with_rng};
    pub use crate::config::BackoffConfig;
    pub use crate::result::BackoffResult;
}
