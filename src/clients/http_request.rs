//! HTTP request types for the Postmen API SDK.
//!
//! This module provides the caller-facing call arguments ([`CallInput`],
//! [`Query`], [`CallOptions`]) and the transport-facing
//! [`RequestDescription`] the request builder turns them into.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::clients::errors::ValidationError;

/// HTTP methods supported by the Postmen API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET method for retrieving resources.
    Get,
    /// HTTP POST method for creating resources.
    Post,
    /// HTTP PUT method for updating resources.
    Put,
    /// HTTP DELETE method for removing resources.
    Delete,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    /// Parses a method name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ValidationError::InvalidMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// Query parameters for a call.
///
/// Either a flat key/value mapping or an already-encoded query string, which
/// is decoded into a mapping when the request is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// Decoded key/value pairs.
    Params(BTreeMap<String, String>),
    /// A percent-encoded query string such as `limit=10&status=created`.
    Encoded(String),
}

impl Query {
    /// Resolves the query into decoded key/value pairs.
    ///
    /// A leading `?` is ignored, `+` decodes to a space, and a segment
    /// without `=` maps its key to an empty value.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuery`] if a segment has an empty
    /// key or does not percent-decode to UTF-8.
    pub fn into_params(self) -> Result<BTreeMap<String, String>, ValidationError> {
        match self {
            Self::Params(params) => Ok(params),
            Self::Encoded(encoded) => {
                let encoded = encoded.trim().trim_start_matches('?');
                let mut params = BTreeMap::new();
                for segment in encoded.split('&').filter(|s| !s.is_empty()) {
                    let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
                    let key = decode_component(key)?;
                    if key.is_empty() {
                        return Err(ValidationError::InvalidQuery {
                            reason: format!("segment '{segment}' has an empty key"),
                        });
                    }
                    params.insert(key, decode_component(value)?);
                }
                Ok(params)
            }
        }
    }
}

fn decode_component(component: &str) -> Result<String, ValidationError> {
    let component = component.replace('+', " ");
    urlencoding::decode(&component)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ValidationError::InvalidQuery {
            reason: format!("'{component}' is not valid percent-encoded UTF-8: {e}"),
        })
}

impl From<&str> for Query {
    fn from(encoded: &str) -> Self {
        Self::Encoded(encoded.to_string())
    }
}

impl From<String> for Query {
    fn from(encoded: String) -> Self {
        Self::Encoded(encoded)
    }
}

impl From<BTreeMap<String, String>> for Query {
    fn from(params: BTreeMap<String, String>) -> Self {
        Self::Params(params)
    }
}

impl From<HashMap<String, String>> for Query {
    fn from(params: HashMap<String, String>) -> Self {
        Self::Params(params.into_iter().collect())
    }
}

/// The payload of a call: body, query and extra headers.
///
/// # Example
///
/// ```rust
/// use postmen_api::clients::CallInput;
/// use serde_json::json;
///
/// let input = CallInput::new()
///     .body(json!({"async": false}))
///     .query_param("limit", "10")
///     .header("platform", "csv");
///
/// assert!(input.body.is_some());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallInput {
    /// JSON body, which must be an object.
    pub body: Option<Value>,
    /// Query parameters.
    pub query: Option<Query>,
    /// Extra headers merged into the built-in ones.
    pub headers: Option<BTreeMap<String, String>>,
}

impl CallInput {
    /// Creates an empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an input carrying only a body.
    #[must_use]
    pub fn with_body(body: impl Into<Value>) -> Self {
        Self::new().body(body)
    }

    /// Creates an input carrying only a query.
    #[must_use]
    pub fn with_query(query: impl Into<Query>) -> Self {
        Self::new().query(query)
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the query, replacing any previous one.
    #[must_use]
    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Adds a single query parameter.
    ///
    /// An encoded query string set earlier is replaced by the parameter map.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut params = match self.query.take() {
            Some(Query::Params(params)) => params,
            _ => BTreeMap::new(),
        };
        params.insert(key.into(), value.into());
        self.query = Some(Query::Params(params));
        self
    }

    /// Adds a single extra header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

fn non_null<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl TryFrom<&Value> for CallInput {
    type Error = ValidationError;

    /// Validates a loosely typed `{body, query, headers}` object.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(ValidationError::InvalidInput {
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        let body = match non_null(object, "body") {
            None => None,
            Some(body @ Value::Object(_)) => Some(body.clone()),
            Some(other) => {
                return Err(ValidationError::InvalidBody {
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        let query = match non_null(object, "query") {
            None => None,
            Some(Value::String(encoded)) => Some(Query::Encoded(encoded.clone())),
            Some(Value::Object(params)) => {
                let mut decoded = BTreeMap::new();
                for (key, value) in params {
                    let value = scalar_to_string(value).ok_or_else(|| {
                        ValidationError::InvalidQuery {
                            reason: format!("value of '{key}' must be a scalar, got {value}"),
                        }
                    })?;
                    decoded.insert(key.clone(), value);
                }
                Some(Query::Params(decoded))
            }
            Some(other) => {
                return Err(ValidationError::InvalidQuery {
                    reason: format!("expected an object or a query string, got {other}"),
                })
            }
        };

        let headers = match non_null(object, "headers") {
            None => None,
            Some(Value::Object(headers)) => {
                let mut extra = BTreeMap::new();
                for (key, value) in headers {
                    let Value::String(value) = value else {
                        return Err(ValidationError::InvalidHeaders {
                            reason: format!("value of '{key}' must be a string, got {value}"),
                        });
                    };
                    extra.insert(key.clone(), value.clone());
                }
                Some(extra)
            }
            Some(other) => {
                return Err(ValidationError::InvalidHeaders {
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        Ok(Self {
            body,
            query,
            headers,
        })
    }
}

/// Per-call overrides of the client defaults.
///
/// Every field left as `None` falls back to the client's setting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Override the client's retry setting for this call.
    pub retry: Option<bool>,
    /// Override the client's raw setting for this call.
    pub raw: Option<bool>,
    /// Use this API key for this call only.
    pub api_key: Option<String>,
}

impl CallOptions {
    /// Creates options with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the retry setting.
    #[must_use]
    pub const fn retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Overrides the raw setting.
    #[must_use]
    pub const fn raw(mut self, raw: bool) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Overrides the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl TryFrom<&Value> for CallOptions {
    type Error = ValidationError;

    /// Validates a loosely typed `{retry, raw, api_key}` object.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(ValidationError::InvalidOptions {
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        let flag = |key: &str, invalid: fn(String) -> ValidationError| match non_null(object, key) {
            None => Ok(None),
            Some(Value::Bool(enabled)) => Ok(Some(*enabled)),
            Some(other) => Err(invalid(other.to_string())),
        };

        let api_key = match non_null(object, "api_key") {
            None => None,
            Some(Value::String(key)) => Some(key.clone()),
            Some(other) => {
                return Err(ValidationError::InvalidApiKey {
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            retry: flag("retry", |value| ValidationError::InvalidRetry { value })?,
            raw: flag("raw", |value| ValidationError::InvalidRaw { value })?,
            api_key,
        })
    }
}

/// A fully built request, ready to hand to a transport.
///
/// Absent body, query and proxy are `None` and are skipped when serialized,
/// so no null placeholder ever reaches the transport.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestDescription {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The absolute request URL.
    pub url: String,
    /// Request headers, including the credential header.
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Decoded query parameters, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, String>>,
    /// Proxy URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl RequestDescription {
    /// Returns the value of a header, matching the name case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("PUT".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
        assert_eq!("delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
    }

    #[test]
    fn test_http_method_rejects_unsupported_verbs() {
        assert!(matches!(
            "PATCH".parse::<HttpMethod>(),
            Err(ValidationError::InvalidMethod { method }) if method == "PATCH"
        ));
        assert!("".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_encoded_query_is_decoded() {
        let params = Query::from("?limit=10&status=in+transit&tag=a%26b&flag")
            .into_params()
            .unwrap();

        assert_eq!(params.get("limit").map(String::as_str), Some("10"));
        assert_eq!(params.get("status").map(String::as_str), Some("in transit"));
        assert_eq!(params.get("tag").map(String::as_str), Some("a&b"));
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn test_encoded_query_rejects_empty_keys_and_bad_utf8() {
        assert!(matches!(
            Query::from("=value").into_params(),
            Err(ValidationError::InvalidQuery { .. })
        ));
        assert!(matches!(
            Query::from("key=%FF").into_params(),
            Err(ValidationError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_query_param_replaces_encoded_query() {
        let input = CallInput::with_query("a=1").query_param("b", "2");
        let params = input.query.unwrap().into_params().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_call_input_from_value() {
        let input = CallInput::try_from(&json!({
            "body": {"async": false},
            "query": {"limit": 10, "status": "created", "archived": false},
            "headers": {"platform": "csv"}
        }))
        .unwrap();

        assert_eq!(input.body, Some(json!({"async": false})));
        let params = input.query.unwrap().into_params().unwrap();
        assert_eq!(params.get("limit").map(String::as_str), Some("10"));
        assert_eq!(params.get("archived").map(String::as_str), Some("false"));
        assert_eq!(
            input.headers.unwrap().get("platform").map(String::as_str),
            Some("csv")
        );
    }

    #[test]
    fn test_call_input_from_value_rejects_bad_shapes() {
        assert!(matches!(
            CallInput::try_from(&json!("body")),
            Err(ValidationError::InvalidInput { .. })
        ));
        assert!(matches!(
            CallInput::try_from(&json!({"body": [1, 2]})),
            Err(ValidationError::InvalidBody { .. })
        ));
        assert!(matches!(
            CallInput::try_from(&json!({"body": "text"})),
            Err(ValidationError::InvalidBody { .. })
        ));
        assert!(matches!(
            CallInput::try_from(&json!({"query": 42})),
            Err(ValidationError::InvalidQuery { .. })
        ));
        assert!(matches!(
            CallInput::try_from(&json!({"query": {"nested": {"a": 1}}})),
            Err(ValidationError::InvalidQuery { .. })
        ));
        assert!(matches!(
            CallInput::try_from(&json!({"headers": {"platform": 1}})),
            Err(ValidationError::InvalidHeaders { .. })
        ));
    }

    #[test]
    fn test_call_input_null_fields_are_absent() {
        let input = CallInput::try_from(&json!({"body": null, "query": null})).unwrap();
        assert_eq!(input, CallInput::default());
    }

    #[test]
    fn test_call_options_from_value() {
        let options =
            CallOptions::try_from(&json!({"retry": false, "raw": true, "api_key": "OTHER"}))
                .unwrap();
        assert_eq!(options, CallOptions::new().retry(false).raw(true).api_key("OTHER"));
    }

    #[test]
    fn test_call_options_from_value_rejects_wrong_types() {
        assert!(matches!(
            CallOptions::try_from(&json!(true)),
            Err(ValidationError::InvalidOptions { .. })
        ));
        assert!(matches!(
            CallOptions::try_from(&json!({"retry": "true"})),
            Err(ValidationError::InvalidRetry { .. })
        ));
        assert!(matches!(
            CallOptions::try_from(&json!({"raw": 0})),
            Err(ValidationError::InvalidRaw { .. })
        ));
        assert!(matches!(
            CallOptions::try_from(&json!({"api_key": 123})),
            Err(ValidationError::InvalidApiKey { .. })
        ));
    }

    #[test]
    fn test_request_description_skips_absent_fields() {
        let request = RequestDescription {
            method: HttpMethod::Get,
            url: "https://example.com/v3/labels".to_string(),
            headers: BTreeMap::new(),
            body: None,
            query: None,
            proxy: None,
        };

        let serialized = serde_json::to_value(&request).unwrap();
        let object = serialized.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["method"], json!("GET"));
        assert!(!object.contains_key("body"));
        assert!(!object.contains_key("query"));
        assert!(!object.contains_key("proxy"));
    }
}
