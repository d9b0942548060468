//! Configuration types for the Postmen API SDK.
//!
//! This module provides the configuration types used to initialize a
//! [`Postmen`](crate::Postmen) client.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`PostmenConfig`]: The resolved client configuration
//! - [`PostmenConfigBuilder`]: A builder for constructing [`PostmenConfig`] instances
//! - [`ClientOptions`]: Loosely typed constructor options, parseable from JSON
//! - [`ApiKey`]: A validated API key newtype with masked debug output
//! - [`Region`]: A validated region identifier
//! - [`Endpoint`]: A validated base URL
//! - [`ProxyUrl`]: A validated proxy URL
//!
//! # Example
//!
//! ```rust
//! use postmen_api::{PostmenConfig, ApiKey, Region};
//!
//! let config = PostmenConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .region(Region::new("sandbox").unwrap())
//!     .retry(false)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.endpoint().as_ref(), "https://sandbox-api.postmen.com/v3");
//! assert!(!config.retry());
//! ```

mod newtypes;
mod options;

pub use newtypes::{ApiKey, Endpoint, ProxyUrl, Region, API_VERSION_PREFIX, DEFAULT_API_HOST};
pub use options::ClientOptions;

use crate::error::ConfigError;

/// Configuration for a Postmen client.
///
/// Holds the credential, the resolved endpoint, and the default call policy
/// (retry, rate awareness, raw mode, safe mode) every call starts from.
///
/// # Thread Safety
///
/// `PostmenConfig` is `Clone`, `Send`, and `Sync`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostmenConfig {
    api_key: ApiKey,
    endpoint: Endpoint,
    proxy: Option<ProxyUrl>,
    retry: bool,
    rate: bool,
    raw: bool,
    safe: bool,
    user_agent_prefix: Option<String>,
}

impl PostmenConfig {
    /// Creates a new builder for constructing a `PostmenConfig`.
    #[must_use]
    pub fn builder() -> PostmenConfigBuilder {
        PostmenConfigBuilder::new()
    }

    /// Returns the default API key.
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the resolved endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the proxy, if configured.
    #[must_use]
    pub const fn proxy(&self) -> Option<&ProxyUrl> {
        self.proxy.as_ref()
    }

    /// Returns whether transient failures are retried by default.
    #[must_use]
    pub const fn retry(&self) -> bool {
        self.retry
    }

    /// Returns whether rate limiting is waited out instead of failing.
    #[must_use]
    pub const fn rate(&self) -> bool {
        self.rate
    }

    /// Returns whether calls return the raw response text by default.
    #[must_use]
    pub const fn raw(&self) -> bool {
        self.raw
    }

    /// Returns whether errors are swallowed and stored instead of returned.
    #[must_use]
    pub const fn safe(&self) -> bool {
        self.safe
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }
}

// Verify PostmenConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PostmenConfig>();
};

/// Builder for constructing [`PostmenConfig`] instances.
///
/// `api_key` is required, as is either `region` or an explicit `endpoint`.
///
/// # Defaults
///
/// - `endpoint`: `https://<region>-api.postmen.com/v3`
/// - `proxy`: `None`
/// - `retry`: `true`
/// - `rate`: `true`
/// - `raw`: `false`
/// - `safe`: `false`
///
/// # Example
///
/// ```rust
/// use postmen_api::{PostmenConfig, ApiKey, Endpoint, ProxyUrl};
///
/// let config = PostmenConfig::builder()
///     .api_key(ApiKey::new("key").unwrap())
///     .endpoint(Endpoint::new("http://localhost:9000").unwrap())
///     .proxy(ProxyUrl::new("http://localhost:8000").unwrap())
///     .raw(true)
///     .user_agent_prefix("MyApp/1.0")
///     .build()
///     .unwrap();
///
/// assert!(config.raw());
/// ```
#[derive(Debug, Default)]
pub struct PostmenConfigBuilder {
    api_key: Option<ApiKey>,
    region: Option<Region>,
    endpoint: Option<Endpoint>,
    proxy: Option<ProxyUrl>,
    retry: Option<bool>,
    rate: Option<bool>,
    raw: Option<bool>,
    safe: Option<bool>,
    user_agent_prefix: Option<String>,
}

impl PostmenConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the region the endpoint is derived from.
    #[must_use]
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Sets an explicit endpoint, overriding the region-derived one.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the proxy requests are routed through.
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyUrl) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets whether transient failures are retried.
    #[must_use]
    pub const fn retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets whether rate limiting is waited out.
    #[must_use]
    pub const fn rate(mut self, rate: bool) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Sets whether responses are returned as raw text.
    #[must_use]
    pub const fn raw(mut self, raw: bool) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Sets whether errors are swallowed and stored for later inspection.
    #[must_use]
    pub const fn safe(mut self, safe: bool) -> Self {
        self.safe = Some(safe);
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Applies every option that is set, leaving the others untouched.
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        if let Some(endpoint) = options.endpoint {
            self.endpoint = Some(endpoint);
        }
        if let Some(proxy) = options.proxy {
            self.proxy = Some(proxy);
        }
        self.retry = options.retry.or(self.retry);
        self.rate = options.rate.or(self.rate);
        self.raw = options.raw.or(self.raw);
        self.safe = options.safe.or(self.safe);
        self
    }

    /// Builds the [`PostmenConfig`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `api_key` is not set,
    /// or if neither `endpoint` nor `region` is set.
    pub fn build(self) -> Result<PostmenConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;

        let endpoint = match (self.endpoint, self.region) {
            (Some(endpoint), _) => endpoint,
            (None, Some(region)) => Endpoint::for_region(&region),
            (None, None) => return Err(ConfigError::MissingRequiredField { field: "region" }),
        };

        Ok(PostmenConfig {
            api_key,
            endpoint,
            proxy: self.proxy,
            retry: self.retry.unwrap_or(true),
            rate: self.rate.unwrap_or(true),
            raw: self.raw.unwrap_or(false),
            safe: self.safe.unwrap_or(false),
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}
