//! Configuration loading errors.
//!
//! The calculator itself has no failure modes. These errors only come from
//! reading a [`BackoffConfig`](crate::BackoffConfig) out of the environment
//! or a serialized document.

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading a backoff configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set to something that is not a number
    #[error("{var} must be a number, got: '{value}'")]
    InvalidNumber {
        /// Name of the offending variable
        var: &'static str,
        /// The raw value found
        value: String,
    },

    /// The JSON document could not be parsed
    #[error("invalid backoff configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}
