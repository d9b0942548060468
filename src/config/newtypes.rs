//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear error messages.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Host serving the regional Postmen APIs.
pub const DEFAULT_API_HOST: &str = "postmen.com";

/// Version segment appended to region-derived endpoints.
pub const API_VERSION_PREFIX: &str = "/v3";

/// A validated Postmen API key.
///
/// The key is the only credential the API accepts, so its value is masked in
/// debug output to prevent accidental exposure in logs.
///
/// # Example
///
/// ```rust
/// use postmen_api::ApiKey;
///
/// let key = ApiKey::new("my-api-key").unwrap();
/// assert_eq!(key.as_ref(), "my-api-key");
/// assert_eq!(format!("{:?}", key), "ApiKey(*****)");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(String);

impl ApiKey {
    /// Creates a new validated API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiKey`] if the key is empty or whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(*****)")
    }
}

/// A validated Postmen region identifier (e.g. `production`, `sandbox`).
///
/// Regions are lowercased and may only contain ASCII letters, digits and
/// hyphens, since they become part of the endpoint host name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Region {
    /// Creates a new validated region.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRegion`] if the region is empty or
    /// contains characters that are not valid in a host name label.
    pub fn new(region: impl Into<String>) -> Result<Self, ConfigError> {
        let region = region.into().trim().to_lowercase();

        let valid = !region.is_empty()
            && !region.starts_with('-')
            && !region.ends_with('-')
            && region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        if !valid {
            return Err(ConfigError::InvalidRegion { region });
        }
        Ok(Self(region))
    }
}

impl AsRef<str> for Region {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses an absolute http(s) URL, returning the trimmed input on success.
fn parse_http_url(value: &str) -> Option<String> {
    let value = value.trim();
    let url = reqwest::Url::parse(value).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(value.to_string())
}

/// A validated API endpoint (base URL every resource path is joined to).
///
/// Endpoints are either derived from a [`Region`] or supplied explicitly.
/// Trailing slashes are stripped so joining never depends on how the value
/// was written.
///
/// # Example
///
/// ```rust
/// use postmen_api::{Endpoint, Region};
///
/// let endpoint = Endpoint::for_region(&Region::new("sandbox").unwrap());
/// assert_eq!(endpoint.as_ref(), "https://sandbox-api.postmen.com/v3");
///
/// let endpoint = Endpoint::new("http://localhost:9000/").unwrap();
/// assert_eq!(endpoint.as_ref(), "http://localhost:9000");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Creates a new validated endpoint from an explicit URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the value is not an
    /// absolute `http` or `https` URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        let parsed =
            parse_http_url(&endpoint).ok_or(ConfigError::InvalidEndpoint { endpoint })?;
        Ok(Self(parsed.trim_end_matches('/').to_string()))
    }

    /// Derives the default endpoint for a region:
    /// `https://<region>-api.postmen.com/v3`.
    #[must_use]
    pub fn for_region(region: &Region) -> Self {
        Self(format!(
            "https://{region}-api.{DEFAULT_API_HOST}{API_VERSION_PREFIX}"
        ))
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Endpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

/// A validated proxy URL requests are routed through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProxyUrl(String);

impl ProxyUrl {
    /// Creates a new validated proxy URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProxy`] if the value is not an absolute
    /// `http` or `https` URL.
    pub fn new(proxy: impl Into<String>) -> Result<Self, ConfigError> {
        let proxy = proxy.into();
        let parsed = parse_http_url(&proxy).ok_or(ConfigError::InvalidProxy { proxy })?;
        Ok(Self(parsed))
    }
}

impl AsRef<str> for ProxyUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
