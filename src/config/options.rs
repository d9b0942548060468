//! Loosely typed constructor options.
//!
//! [`ClientOptions`] mirrors the options object accepted by the Postmen
//! client constructor (`{endpoint, proxy, retry, rate, raw, safe}`). It can be
//! built in code or parsed from a JSON value, in which case every field is
//! type-checked once and rejected with a field-specific [`ConfigError`].

use serde_json::{Map, Value};

use crate::config::{Endpoint, ProxyUrl};
use crate::error::ConfigError;

/// Optional client settings, each overriding the built-in default when set.
///
/// # Example
///
/// ```rust
/// use postmen_api::ClientOptions;
/// use serde_json::json;
///
/// let options = ClientOptions::try_from(&json!({"retry": false, "raw": true})).unwrap();
/// assert_eq!(options.retry, Some(false));
/// assert_eq!(options.raw, Some(true));
///
/// assert!(ClientOptions::try_from(&json!({"retry": "no"})).is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Explicit endpoint, replacing the region-derived default.
    pub endpoint: Option<Endpoint>,
    /// Proxy every request is routed through.
    pub proxy: Option<ProxyUrl>,
    /// Retry transient failures (default `true`).
    pub retry: Option<bool>,
    /// Wait out rate limiting instead of failing (default `true`).
    pub rate: Option<bool>,
    /// Return the serialized response text instead of parsed JSON (default `false`).
    pub raw: Option<bool>,
    /// Swallow errors and store them for later inspection (default `false`).
    pub safe: Option<bool>,
}

fn optional_bool(
    options: &Map<String, Value>,
    key: &str,
    invalid: fn(String) -> ConfigError,
) -> Result<Option<bool>, ConfigError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(other) => Err(invalid(other.to_string())),
    }
}

fn optional_str<'a>(
    options: &'a Map<String, Value>,
    key: &str,
    invalid: fn(String) -> ConfigError,
) -> Result<Option<&'a str>, ConfigError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(invalid(other.to_string())),
    }
}

impl TryFrom<&Value> for ClientOptions {
    type Error = ConfigError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let options = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(options) => options,
            other => {
                return Err(ConfigError::InvalidOptions {
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        let endpoint = optional_str(options, "endpoint", |endpoint| {
            ConfigError::InvalidEndpoint { endpoint }
        })?
        .map(Endpoint::new)
        .transpose()?;

        let proxy = optional_str(options, "proxy", |proxy| ConfigError::InvalidProxy { proxy })?
            .map(ProxyUrl::new)
            .transpose()?;

        Ok(Self {
            endpoint,
            proxy,
            retry: optional_bool(options, "retry", |value| ConfigError::InvalidRetry { value })?,
            rate: optional_bool(options, "rate", |value| ConfigError::InvalidRate { value })?,
            raw: optional_bool(options, "raw", |value| ConfigError::InvalidRaw { value })?,
            safe: optional_bool(options, "safe", |value| ConfigError::InvalidSafe { value })?,
        })
    }
}
