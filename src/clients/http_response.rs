//! HTTP response types for the Postmen API SDK.
//!
//! This module provides the transport-facing [`HttpResponse`], the
//! caller-facing [`ApiResponse`], and [`normalize`], which shapes a
//! successful response body into the latter.

use std::collections::HashMap;

use serde_json::Value;

/// The body of an HTTP response as received by the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// The body parsed as JSON, along with the text it was parsed from.
    Json {
        /// The parsed body.
        value: Value,
        /// The body text exactly as received.
        text: String,
    },
    /// The body could not be parsed as JSON.
    Text(String),
}

impl ResponseBody {
    /// Parses body text, falling back to [`ResponseBody::Text`] when it is
    /// not valid JSON.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json { value, text },
            Err(_) => Self::Text(text),
        }
    }

    /// Wraps an already parsed body, serializing it to produce its text.
    #[must_use]
    pub fn json(value: Value) -> Self {
        let text = value.to_string();
        Self::Json { value, text }
    }

    /// Returns the body as a JSON object, if it is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&Value> {
        match self {
            Self::Json { value, .. } if value.is_object() => Some(value),
            _ => None,
        }
    }

    /// Returns the body text as received.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Json { text, .. } | Self::Text(text) => text.clone(),
        }
    }
}

/// An HTTP response from the Postmen API.
///
/// Header names are stored lowercase and may have multiple values.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub code: u16,
    /// Response headers.
    pub headers: HashMap<String, Vec<String>>,
    /// The response body.
    pub body: ResponseBody,
}

impl HttpResponse {
    /// Creates a new `HttpResponse`, lowercasing header names.
    #[must_use]
    pub fn new(code: u16, headers: HashMap<String, Vec<String>>, body: ResponseBody) -> Self {
        let mut normalized: HashMap<String, Vec<String>> = HashMap::with_capacity(headers.len());
        for (name, values) in headers {
            normalized
                .entry(name.to_ascii_lowercase())
                .or_default()
                .extend(values);
        }

        Self {
            code,
            headers: normalized,
            body,
        }
    }

    /// Returns the first value of a header, matching the name case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// The result delivered to the caller of a successful logical call.
///
/// # Example
///
/// ```rust
/// use postmen_api::clients::{normalize, ApiResponse};
/// use serde_json::json;
///
/// let text = r#"{"meta":{"code":200},"data":{"id":"123"}}"#;
/// let body = json!({"meta": {"code": 200}, "data": {"id": "123"}});
///
/// let parsed = normalize(body.clone(), text.to_string(), false);
/// assert_eq!(parsed.as_json(), Some(&body));
///
/// let raw = normalize(body, text.to_string(), true);
/// assert_eq!(raw.as_raw(), Some(text));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ApiResponse {
    /// The parsed response body, including its `meta` envelope.
    Json(Value),
    /// The response body text exactly as received (raw mode).
    Raw(String),
    /// No result: the call failed and safe mode swallowed the error.
    Empty,
}

impl ApiResponse {
    /// Returns the parsed body, if this is a [`ApiResponse::Json`].
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the raw text, if this is a [`ApiResponse::Raw`].
    #[must_use]
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Consumes the response and returns the parsed body, if any.
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the `data` member of a parsed body.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.as_json().and_then(|body| body.get("data"))
    }

    /// Returns `true` if a safe-mode failure produced no result.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Shapes a response body for delivery.
///
/// `body` is the parsed form of `text`. In raw mode the received text is
/// returned unchanged, so member order and formatting match the wire;
/// otherwise the parsed body is returned, envelope and all.
#[must_use]
pub fn normalize(body: Value, text: String, raw: bool) -> ApiResponse {
    if raw {
        ApiResponse::Raw(text)
    } else {
        ApiResponse::Json(body)
    }
}
