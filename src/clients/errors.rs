//! Error types for Postmen API calls.
//!
//! This module contains the error taxonomy of a logical call:
//!
//! - [`ValidationError`]: Malformed caller input, returned synchronously
//!   before any network activity
//! - [`TransportError`]: The transport could not complete the exchange
//! - [`PostmenError`]: Every failure delivered through the completion
//!   channel (transport, throttling, server, API, malformed response)
//!
//! # Example
//!
//! ```rust,ignore
//! use postmen_api::{Postmen, PostmenError};
//!
//! match postmen.get("/labels/123", Default::default())?.await {
//!     Ok(response) => println!("Label: {:?}", response),
//!     Err(PostmenError::Api { details, .. }) => {
//!         println!("API error {}: {}", details.code, details.message);
//!     }
//!     Err(PostmenError::Transport { error, retry_count }) => {
//!         println!("Transport failed after {retry_count} retries: {error}");
//!     }
//!     Err(other) => println!("Call failed: {other}"),
//! }
//! ```

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Message used when the response body cannot be parsed as JSON.
pub const MALFORMED_RESPONSE_MESSAGE: &str = "Something went wrong on Postmen's end";

/// Code reported for malformed responses.
pub const MALFORMED_RESPONSE_CODE: i64 = 500;

/// Message prefix used when the transport fails to produce a response.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Failed to perform HTTP request";

/// Error returned when a call's arguments fail validation.
///
/// These errors never reach the network and are never delivered through the
/// completion channel; they are returned directly by the call site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The HTTP method is not one of GET, POST, PUT or DELETE.
    #[error("Invalid HTTP method '{method}'. Expected one of GET, POST, PUT, DELETE.")]
    InvalidMethod {
        /// The method that was provided.
        method: String,
    },

    /// The resource path is empty.
    #[error("Invalid resource path '{resource}'. The resource path cannot be empty.")]
    InvalidResource {
        /// The resource that was provided.
        resource: String,
    },

    /// The call input is not an object.
    #[error("Invalid call input: {reason}")]
    InvalidInput {
        /// Why the input was rejected.
        reason: String,
    },

    /// The body is not a JSON object.
    #[error("Invalid body: {reason}")]
    InvalidBody {
        /// Why the body was rejected.
        reason: String,
    },

    /// The query is neither a flat object nor a decodable query string.
    #[error("Invalid query: {reason}")]
    InvalidQuery {
        /// Why the query was rejected.
        reason: String,
    },

    /// Extra headers are not a flat object of strings.
    #[error("Invalid headers: {reason}")]
    InvalidHeaders {
        /// Why the headers were rejected.
        reason: String,
    },

    /// The call options are not an object.
    #[error("Invalid call options: {reason}")]
    InvalidOptions {
        /// Why the options were rejected.
        reason: String,
    },

    /// The `retry` option is not a boolean.
    #[error("Invalid retry option '{value}'. Expected a boolean.")]
    InvalidRetry {
        /// The offending value, serialized.
        value: String,
    },

    /// The `raw` option is not a boolean.
    #[error("Invalid raw option '{value}'. Expected a boolean.")]
    InvalidRaw {
        /// The offending value, serialized.
        value: String,
    },

    /// The per-call API key is empty or not a string.
    #[error("Invalid API key override '{value}'. Expected a non-empty string.")]
    InvalidApiKey {
        /// The offending value, serialized.
        value: String,
    },
}

/// Classification of transport-level failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request timed out.
    Timeout,
    /// The connection was reset by the peer.
    ConnectionReset,
    /// The connection was refused.
    ConnectionRefused,
    /// Any other transport failure.
    Other,
}

impl TransportErrorKind {
    /// Returns `true` for the kinds worth sending again: timeouts, resets
    /// and refused connections.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectionReset | Self::ConnectionRefused
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "ETIMEDOUT"),
            Self::ConnectionReset => write!(f, "ECONNRESET"),
            Self::ConnectionRefused => write!(f, "ECONNREFUSED"),
            Self::Other => write!(f, "EOTHER"),
        }
    }
}

/// Error returned by a [`Transport`](crate::clients::Transport) when no
/// response was obtained.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// The classified failure kind.
    pub kind: TransportErrorKind,
    /// A human-readable description from the underlying transport.
    pub message: String,
}

impl TransportError {
    /// Creates a new transport error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The error envelope carried by a Postmen API response.
///
/// Built from the `meta` block of the response body (`code`, `message`,
/// `type`, `details`) plus its `data` payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiErrorDetails {
    /// The API-level code (`meta.code`, falling back to the HTTP status).
    pub code: i64,
    /// The human-readable message (`meta.message`).
    pub message: String,
    /// The upstream error type tag (`meta.type`), if any.
    pub error_type: Option<String>,
    /// Additional details (`meta.details`), `Null` when absent.
    pub details: Value,
    /// The response data payload (`data`), `Null` when absent.
    pub data: Value,
    /// The response body text.
    pub response_body: String,
}

impl ApiErrorDetails {
    /// Extracts the error envelope from a parsed response body.
    ///
    /// `status` is used as the code when the body carries no `meta.code`.
    #[must_use]
    pub fn from_body(body: &Value, status: u16) -> Self {
        let meta = body.get("meta");
        let field = |name: &str| meta.and_then(|m| m.get(name));

        Self {
            code: field("code")
                .and_then(Value::as_i64)
                .unwrap_or_else(|| i64::from(status)),
            message: field("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            error_type: field("type").and_then(Value::as_str).map(String::from),
            details: field("details").cloned().unwrap_or(Value::Null),
            data: body.get("data").cloned().unwrap_or(Value::Null),
            response_body: body.to_string(),
        }
    }
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_type {
            Some(error_type) => write!(f, "{error_type} ({}): {}", self.code, self.message),
            None => write!(f, "({}): {}", self.code, self.message),
        }
    }
}

/// Unified error type for failures delivered through the completion channel.
///
/// `retry_count` is the number of error retries performed before the call
/// gave up; it is `0` when the first attempt was terminal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PostmenError {
    /// The transport failed to produce a response.
    #[error("Failed to perform HTTP request ({error}) after {retry_count} retries")]
    Transport {
        /// The underlying transport failure.
        error: TransportError,
        /// Retries performed before giving up.
        retry_count: u32,
    },

    /// The API signaled rate-limit exhaustion and rate awareness is disabled.
    #[error("Rate limit exceeded {details}")]
    Throttled {
        /// The throttling response envelope.
        details: ApiErrorDetails,
        /// Retries performed before giving up.
        retry_count: u32,
    },

    /// The API kept reporting a transient server-side fault.
    #[error("Server error {details} after {retry_count} retries")]
    Server {
        /// The last server error envelope.
        details: ApiErrorDetails,
        /// Retries performed before giving up.
        retry_count: u32,
    },

    /// The API rejected the call.
    #[error("API error {details}")]
    Api {
        /// The error envelope.
        details: ApiErrorDetails,
        /// Retries performed before giving up.
        retry_count: u32,
    },

    /// The response body could not be parsed as a JSON object.
    #[error("Something went wrong on Postmen's end")]
    MalformedResponse {
        /// The unparsable body text.
        body: String,
        /// The HTTP status of the response.
        status: u16,
        /// Retries performed before giving up.
        retry_count: u32,
    },
}

impl PostmenError {
    /// Returns the numeric code of the error, if it has one.
    ///
    /// Transport failures have no code; malformed responses report `500`.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Transport { .. } => None,
            Self::Throttled { details, .. }
            | Self::Server { details, .. }
            | Self::Api { details, .. } => Some(details.code),
            Self::MalformedResponse { .. } => Some(MALFORMED_RESPONSE_CODE),
        }
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Transport { error, .. } => format!("{TRANSPORT_FAILURE_MESSAGE}: {error}"),
            Self::Throttled { details, .. }
            | Self::Server { details, .. }
            | Self::Api { details, .. } => details.message.clone(),
            Self::MalformedResponse { .. } => MALFORMED_RESPONSE_MESSAGE.to_string(),
        }
    }

    /// Returns the upstream error type tag, if any.
    #[must_use]
    pub fn error_type(&self) -> Option<&str> {
        self.details().and_then(|d| d.error_type.as_deref())
    }

    /// Returns the upstream data payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.details().map(|d| &d.data)
    }

    /// Returns the API error envelope for errors that carry one.
    #[must_use]
    pub const fn details(&self) -> Option<&ApiErrorDetails> {
        match self {
            Self::Throttled { details, .. }
            | Self::Server { details, .. }
            | Self::Api { details, .. } => Some(details),
            Self::Transport { .. } | Self::MalformedResponse { .. } => None,
        }
    }

    /// Returns `true` if the failure belongs to a class the engine retries
    /// (retriable transport kinds, throttling, transient server errors).
    ///
    /// A `true` result on a delivered error means the retry budget was
    /// exhausted or retries were disabled for the call.
    #[must_use]
    pub const fn is_retriable_kind(&self) -> bool {
        match self {
            Self::Transport { error, .. } => error.kind.is_retriable(),
            Self::Throttled { .. } | Self::Server { .. } => true,
            Self::Api { .. } | Self::MalformedResponse { .. } => false,
        }
    }

    /// Returns the number of retries performed before the call gave up.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        match self {
            Self::Transport { retry_count, .. }
            | Self::Throttled { retry_count, .. }
            | Self::Server { retry_count, .. }
            | Self::Api { retry_count, .. }
            | Self::MalformedResponse { retry_count, .. } => *retry_count,
        }
    }
}
