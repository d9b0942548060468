//! The Postmen client.
//!
//! This module provides [`Postmen`], the handle applications hold. It owns
//! the default call settings, builds each call with
//! [`build_request`](crate::clients::build_request), and hands it to a
//! [`Dispatcher`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clients::dispatch::{Dispatcher, PendingCall};
use crate::clients::errors::{PostmenError, ValidationError};
use crate::clients::http_request::{CallInput, CallOptions, HttpMethod};
use crate::clients::payload::{build_request, CallDefaults};
use crate::clients::rate_limit::{RateLimitLedger, RateLimitRecord};
use crate::clients::transport::{ReqwestTransport, Transport};
use crate::config::{ApiKey, ClientOptions, PostmenConfig, ProxyUrl, Region, API_VERSION_PREFIX};
use crate::error::ConfigError;

/// Client for the Postmen shipping API.
///
/// Every call method validates its arguments immediately and returns a
/// [`PendingCall`], which resolves once the call succeeds or fails for good
/// (after retries and rate-limit waits). Await it, or pass a callback to
/// [`PendingCall::on_complete`].
///
/// # Mutating defaults
///
/// The `set_*` methods and [`Postmen::use_api_key`] change this client's
/// defaults in place and return `&mut Self` for chaining. Calls already
/// started keep the settings they were built with.
///
/// # Thread Safety
///
/// `Postmen` is `Send + Sync`. Clients built with
/// [`Postmen::with_ledger`] around the same [`RateLimitLedger`] share
/// rate-limit state.
///
/// # Example
///
/// ```rust,ignore
/// use postmen_api::{CallInput, Postmen, Resource};
/// use serde_json::json;
///
/// let mut postmen = Postmen::new("MY_API_KEY", "sandbox")?;
///
/// // Future style
/// let labels = postmen.get(Resource::Labels, CallInput::new())?.await?;
///
/// // Callback style
/// postmen
///     .create(Resource::Rates, CallInput::with_body(json!({"async": false})))?
///     .on_complete(|result| println!("{result:?}"));
///
/// // Use another key for the next call only
/// postmen.use_api_key("OTHER_KEY").get(Resource::Labels, CallInput::new())?;
/// ```
#[derive(Debug)]
pub struct Postmen {
    defaults: CallDefaults,
    pending_api_key: Option<String>,
    dispatcher: Dispatcher,
}

// Verify Postmen is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Postmen>();
};

impl Postmen {
    /// Creates a client for `region` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiKey`] or [`ConfigError::InvalidRegion`]
    /// if either argument is invalid.
    ///
    /// # Panics
    ///
    /// Panics if the underlying reqwest client cannot be created.
    pub fn new(api_key: &str, region: &str) -> Result<Self, ConfigError> {
        Self::with_options(api_key, region, ClientOptions::default())
    }

    /// Creates a client for `region`, applying the given options.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the API key or region is invalid.
    ///
    /// # Panics
    ///
    /// Panics if the underlying reqwest client cannot be created.
    ///
    /// # Example
    ///
    /// ```rust
    /// use postmen_api::{ClientOptions, Postmen};
    /// use serde_json::json;
    ///
    /// let options = ClientOptions::try_from(&json!({"retry": false})).unwrap();
    /// let postmen = Postmen::with_options("KEY", "sandbox", options).unwrap();
    ///
    /// assert_eq!(postmen.endpoint(), "https://sandbox-api.postmen.com/v3");
    /// assert!(!postmen.retry());
    /// ```
    pub fn with_options(
        api_key: &str,
        region: &str,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        let config = PostmenConfig::builder()
            .api_key(ApiKey::new(api_key)?)
            .region(Region::new(region)?)
            .options(options)
            .build()?;
        Ok(Self::from_config(config))
    }

    /// Creates a client from a resolved configuration.
    ///
    /// # Panics
    ///
    /// Panics if the underlying reqwest client cannot be created.
    #[must_use]
    pub fn from_config(config: PostmenConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Creates a client that sends requests through `transport`.
    #[must_use]
    pub fn with_transport(config: PostmenConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            defaults: CallDefaults::from(&config),
            pending_api_key: None,
            dispatcher: Dispatcher::new(transport, RateLimitLedger::new()),
        }
    }

    /// Replaces the client's rate-limit ledger with a shared one.
    #[must_use]
    pub fn with_ledger(mut self, ledger: RateLimitLedger) -> Self {
        self.dispatcher = self.dispatcher.with_ledger(ledger);
        self
    }

    /// Returns the endpoint resources are resolved against.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.defaults.endpoint
    }

    /// Returns the proxy, if one is set.
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.defaults.proxy.as_deref()
    }

    /// Returns whether transient failures are retried by default.
    #[must_use]
    pub const fn retry(&self) -> bool {
        self.defaults.retry
    }

    /// Returns whether rate limiting is waited out.
    #[must_use]
    pub const fn rate(&self) -> bool {
        self.defaults.rate
    }

    /// Returns whether calls return raw text by default.
    #[must_use]
    pub const fn raw(&self) -> bool {
        self.defaults.raw
    }

    /// Returns whether errors are swallowed into [`Postmen::last_error`].
    #[must_use]
    pub const fn safe(&self) -> bool {
        self.defaults.safe
    }

    /// Uses `api_key` for the next call only.
    ///
    /// The override is consumed by the next call, whether or not that call
    /// passes validation.
    pub fn use_api_key(&mut self, api_key: impl Into<String>) -> &mut Self {
        self.pending_api_key = Some(api_key.into());
        self
    }

    /// Sets or clears the proxy.
    pub fn set_proxy(&mut self, proxy: Option<ProxyUrl>) -> &mut Self {
        self.defaults.proxy = proxy.map(|p| p.as_ref().to_string());
        self
    }

    /// Sets whether transient failures are retried.
    pub fn set_retry(&mut self, retry: bool) -> &mut Self {
        self.defaults.retry = retry;
        self
    }

    /// Sets whether calls return raw text.
    pub fn set_raw(&mut self, raw: bool) -> &mut Self {
        self.defaults.raw = raw;
        self
    }

    /// Sets whether rate limiting is waited out.
    pub fn set_rate(&mut self, rate: bool) -> &mut Self {
        self.defaults.rate = rate;
        self
    }

    /// Sets whether errors are swallowed into [`Postmen::last_error`].
    pub fn set_safe(&mut self, safe: bool) -> &mut Self {
        self.defaults.safe = safe;
        self
    }

    /// Starts a call.
    ///
    /// A `resource` without a leading `/` is prefixed with the API version
    /// unless the endpoint already ends with it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the method, resource, input or
    /// options are invalid. Nothing is sent in that case.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use postmen_api::{CallInput, CallOptions};
    ///
    /// let raw = postmen
    ///     .call("GET", "/labels", CallInput::with_query("limit=10"), CallOptions::new().raw(true))?
    ///     .await?;
    /// ```
    pub fn call(
        &mut self,
        method: &str,
        resource: impl AsRef<str>,
        input: CallInput,
        options: CallOptions,
    ) -> Result<PendingCall, ValidationError> {
        let mut defaults = self.defaults.clone();
        defaults.api_key_override = self.pending_api_key.take();

        let path = versioned_path(&defaults.endpoint, resource.as_ref());
        let (request, policy) = build_request(method, &path, input, options, &defaults)?;
        Ok(self.dispatcher.dispatch(request, policy))
    }

    fn call_with(
        &mut self,
        method: HttpMethod,
        resource: impl AsRef<str>,
        input: CallInput,
    ) -> Result<PendingCall, ValidationError> {
        self.call(method.as_str(), resource, input, CallOptions::default())
    }

    /// Starts a GET call.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the resource or input is invalid.
    pub fn get(
        &mut self,
        resource: impl AsRef<str>,
        input: CallInput,
    ) -> Result<PendingCall, ValidationError> {
        self.call_with(HttpMethod::Get, resource, input)
    }

    /// Starts a GET call for one item: `GET {resource}/{id}`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the resource is invalid.
    pub fn retrieve(
        &mut self,
        resource: impl AsRef<str>,
        id: &str,
    ) -> Result<PendingCall, ValidationError> {
        let path = format!("{}/{}", resource.as_ref(), id);
        self.call_with(HttpMethod::Get, path, CallInput::new())
    }

    /// Starts a POST call creating an item of `resource`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the resource or input is invalid.
    pub fn create(
        &mut self,
        resource: impl AsRef<str>,
        input: CallInput,
    ) -> Result<PendingCall, ValidationError> {
        self.call_with(HttpMethod::Post, resource, input)
    }

    /// Starts a POST call. Same as [`Postmen::create`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the resource or input is invalid.
    pub fn post(
        &mut self,
        resource: impl AsRef<str>,
        input: CallInput,
    ) -> Result<PendingCall, ValidationError> {
        self.create(resource, input)
    }

    /// Starts a PUT call.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the resource or input is invalid.
    pub fn put(
        &mut self,
        resource: impl AsRef<str>,
        input: CallInput,
    ) -> Result<PendingCall, ValidationError> {
        self.call_with(HttpMethod::Put, resource, input)
    }

    /// Starts a DELETE call.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the resource or input is invalid.
    pub fn delete(
        &mut self,
        resource: impl AsRef<str>,
        input: CallInput,
    ) -> Result<PendingCall, ValidationError> {
        self.call_with(HttpMethod::Delete, resource, input)
    }

    /// Returns the rate-limit ledger.
    #[must_use]
    pub const fn ledger(&self) -> &RateLimitLedger {
        self.dispatcher.ledger()
    }

    /// Returns the last observed rate-limit record of every API key.
    #[must_use]
    pub fn rate_limits(&self) -> HashMap<String, RateLimitRecord> {
        self.ledger().snapshot()
    }

    /// Returns the last observed rate-limit record of `api_key`.
    #[must_use]
    pub fn rate_limit(&self, api_key: &str) -> Option<RateLimitRecord> {
        self.ledger().get(api_key)
    }

    /// Returns the last error swallowed by safe mode, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<PostmenError> {
        self.dispatcher.last_error()
    }
}

/// Prefixes a relative resource path with [`API_VERSION_PREFIX`].
///
/// Paths starting with `/` are taken as given. Nothing is added when the
/// endpoint already ends with the version segment, as region endpoints do.
fn versioned_path<'a>(endpoint: &str, resource: &'a str) -> Cow<'a, str> {
    if resource.is_empty()
        || resource.starts_with('/')
        || endpoint.trim_end_matches('/').ends_with(API_VERSION_PREFIX)
    {
        Cow::Borrowed(resource)
    } else {
        Cow::Owned(format!("{API_VERSION_PREFIX}/{resource}"))
    }
}
