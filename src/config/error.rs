//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric environment variable could not be parsed.
    #[error("failed to parse {var}='{value}' as a number")]
    InvalidNumber { var: &'static str, value: String },

    /// A boolean environment variable was neither true/false nor 1/0.
    #[error("failed to parse {var}='{value}' as a boolean")]
    InvalidBool { var: &'static str, value: String },

    /// The distance metric name is not recognized.
    #[error("unknown distance metric '{value}' (expected 'cosine' or 'euclidean')")]
    InvalidMetric { value: String },

    /// A setting failed validation.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}
