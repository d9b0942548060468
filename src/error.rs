//! Error types for the Postmen API SDK.
//!
//! This module contains error types used when constructing and validating
//! client configuration. Per-call errors live in [`crate::clients`].
//!
//! # Error Handling
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. A client is never built from an invalid configuration.
//!
//! # Example
//!
//! ```rust
//! use postmen_api::{ApiKey, ConfigError};
//!
//! let result = ApiKey::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyApiKey)));
//! ```

use thiserror::Error;

/// Errors that can occur while configuring a Postmen client.
///
/// Each variant provides a clear, actionable error message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API key cannot be empty.
    #[error("API key cannot be empty. Please provide a valid Postmen API key.")]
    EmptyApiKey,

    /// Region is invalid.
    #[error("Invalid region '{region}'. Expected a non-empty region such as 'production' or 'sandbox'.")]
    InvalidRegion {
        /// The invalid region that was provided.
        region: String,
    },

    /// Endpoint is invalid.
    #[error("Invalid endpoint '{endpoint}'. Please provide an absolute http(s) URL (e.g., 'https://production-api.postmen.com/v3').")]
    InvalidEndpoint {
        /// The invalid endpoint that was provided.
        endpoint: String,
    },

    /// Proxy is invalid.
    #[error("Invalid proxy '{proxy}'. Please provide an absolute http(s) URL (e.g., 'http://127.0.0.1:8888').")]
    InvalidProxy {
        /// The invalid proxy that was provided.
        proxy: String,
    },

    /// The `retry` option is not a boolean.
    #[error("Invalid retry option '{value}'. Expected a boolean.")]
    InvalidRetry {
        /// The offending value, serialized.
        value: String,
    },

    /// The `rate` option is not a boolean.
    #[error("Invalid rate option '{value}'. Expected a boolean.")]
    InvalidRate {
        /// The offending value, serialized.
        value: String,
    },

    /// The `raw` option is not a boolean.
    #[error("Invalid raw option '{value}'. Expected a boolean.")]
    InvalidRaw {
        /// The offending value, serialized.
        value: String,
    },

    /// The `safe` option is not a boolean.
    #[error("Invalid safe option '{value}'. Expected a boolean.")]
    InvalidSafe {
        /// The offending value, serialized.
        value: String,
    },

    /// The options value itself has the wrong shape.
    #[error("Invalid client options: {reason}")]
    InvalidOptions {
        /// The reason the options were rejected.
        reason: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },
}
