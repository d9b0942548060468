//! Request construction for Postmen API calls.
//!
//! [`build_request`] turns a logical call (method, resource, input, per-call
//! options) into a [`RequestDescription`] plus the [`CallPolicy`] that governs
//! its dispatch. It performs no I/O: every argument is validated here, so a
//! malformed call fails before anything reaches the network.

use std::collections::BTreeMap;

use crate::clients::errors::ValidationError;
use crate::clients::http_request::{CallInput, CallOptions, HttpMethod, RequestDescription};
use crate::config::PostmenConfig;

/// SDK version from Cargo.toml.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "postmen-api-key";

/// Header carrying the SDK version tag.
pub const AGENT_HEADER: &str = "x-postmen-agent";

/// Client-level defaults every call starts from.
///
/// Snapshotted from the client for each call, so changing the client's
/// settings never affects a call that is already in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallDefaults {
    /// Base URL resources are joined to.
    pub endpoint: String,
    /// The client's default API key.
    pub api_key: String,
    /// One-shot API key override for this call, if one was pending.
    pub api_key_override: Option<String>,
    /// Proxy requests are routed through, if any.
    pub proxy: Option<String>,
    /// Whether transient failures are retried.
    pub retry: bool,
    /// Whether rate limiting is waited out.
    pub rate: bool,
    /// Whether responses are returned as raw text.
    pub raw: bool,
    /// Whether errors are swallowed and stored.
    pub safe: bool,
    /// Prefix prepended to the `User-Agent` header.
    pub user_agent_prefix: Option<String>,
}

impl From<&PostmenConfig> for CallDefaults {
    fn from(config: &PostmenConfig) -> Self {
        Self {
            endpoint: config.endpoint().as_ref().to_string(),
            api_key: config.api_key().as_ref().to_string(),
            api_key_override: None,
            proxy: config.proxy().map(|p| p.as_ref().to_string()),
            retry: config.retry(),
            rate: config.rate(),
            raw: config.raw(),
            safe: config.safe(),
            user_agent_prefix: config.user_agent_prefix().map(String::from),
        }
    }
}

/// The effective policy of one logical call.
///
/// Resolved once by [`build_request`] and never changed afterwards, including
/// across retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallPolicy {
    /// Retry retriable transport and server failures.
    pub retry: bool,
    /// Wait out throttling instead of failing.
    pub rate: bool,
    /// Return the serialized response text.
    pub raw: bool,
    /// Swallow errors into the client's last-error slot.
    pub safe: bool,
    /// The API key the call is sent with, used as the rate-limit ledger key.
    pub api_key: String,
}

/// Builds the request description and call policy for a logical call.
///
/// The API key is taken from `options.api_key`, then from the one-shot
/// override in `defaults`, then from the default key. Per-call `retry` and
/// `raw` override the defaults.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the method is unsupported, the resource
/// is empty, the body is not an object, the query cannot be decoded, or the
/// effective API key is empty.
///
/// # Example
///
/// ```rust
/// use postmen_api::clients::{build_request, CallDefaults, CallInput, CallOptions};
///
/// let defaults = CallDefaults {
///     endpoint: "https://sandbox-api.postmen.com/v3".to_string(),
///     api_key: "KEY".to_string(),
///     api_key_override: None,
///     proxy: None,
///     retry: true,
///     rate: true,
///     raw: false,
///     safe: false,
///     user_agent_prefix: None,
/// };
///
/// let (request, policy) = build_request(
///     "get",
///     "/labels/123",
///     CallInput::new(),
///     CallOptions::new().retry(false),
///     &defaults,
/// )
/// .unwrap();
///
/// assert_eq!(request.url, "https://sandbox-api.postmen.com/v3/labels/123");
/// assert_eq!(request.header("postmen-api-key"), Some("KEY"));
/// assert!(!policy.retry);
/// ```
pub fn build_request(
    method: &str,
    resource: &str,
    input: CallInput,
    options: CallOptions,
    defaults: &CallDefaults,
) -> Result<(RequestDescription, CallPolicy), ValidationError> {
    let method: HttpMethod = method.parse()?;

    if resource.trim().is_empty() {
        return Err(ValidationError::InvalidResource {
            resource: resource.to_string(),
        });
    }

    let body = match input.body {
        None => None,
        Some(body) if body.is_object() => Some(body),
        Some(other) => {
            return Err(ValidationError::InvalidBody {
                reason: format!("expected an object, got {other}"),
            })
        }
    };

    let query = input.query.map(|q| q.into_params()).transpose()?;

    let api_key = options
        .api_key
        .or_else(|| defaults.api_key_override.clone())
        .unwrap_or_else(|| defaults.api_key.clone());
    if api_key.trim().is_empty() {
        return Err(ValidationError::InvalidApiKey { value: api_key });
    }

    let mut headers = BTreeMap::new();
    headers.insert(API_KEY_HEADER.to_string(), api_key.clone());
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Connection".to_string(), "keep-alive".to_string());
    headers.insert(AGENT_HEADER.to_string(), SDK_VERSION.to_string());
    headers.insert(
        "User-Agent".to_string(),
        user_agent(defaults.user_agent_prefix.as_deref()),
    );

    // Built-in headers are never replaced, whatever the caller's casing.
    for (key, value) in input.headers.unwrap_or_default() {
        if !headers.keys().any(|k| k.eq_ignore_ascii_case(&key)) {
            headers.insert(key, value);
        }
    }

    let request = RequestDescription {
        method,
        url: join_url(&defaults.endpoint, resource),
        headers,
        body,
        query,
        proxy: defaults.proxy.clone(),
    };

    let policy = CallPolicy {
        retry: options.retry.unwrap_or(defaults.retry),
        rate: defaults.rate,
        raw: options.raw.unwrap_or(defaults.raw),
        safe: defaults.safe,
        api_key,
    };

    Ok((request, policy))
}

fn user_agent(prefix: Option<&str>) -> String {
    let prefix = prefix.map_or(String::new(), |prefix| format!("{prefix} | "));
    let rust_version = env!("CARGO_PKG_RUST_VERSION");
    format!("{prefix}Postmen API Library v{SDK_VERSION} | Rust {rust_version}")
}

/// Joins an endpoint and a resource path, collapsing repeated `/` everywhere
/// except in the scheme separator.
///
/// # Example
///
/// ```rust
/// use postmen_api::clients::join_url;
///
/// assert_eq!(
///     join_url("https://sandbox-api.postmen.com/v3/", "//labels"),
///     "https://sandbox-api.postmen.com/v3/labels"
/// );
/// ```
#[must_use]
pub fn join_url(endpoint: &str, resource: &str) -> String {
    let joined = format!("{endpoint}/{resource}");
    let (scheme, rest) = joined
        .find("://")
        .map_or(("", joined.as_str()), |i| joined.split_at(i + 3));

    let mut url = String::with_capacity(joined.len());
    url.push_str(scheme);
    let mut previous_slash = false;
    for c in rest.chars() {
        let slash = c == '/';
        if !(slash && previous_slash) {
            url.push(c);
        }
        previous_slash = slash;
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> CallDefaults {
        CallDefaults {
            endpoint: "https://testing-api.postmen.com/v3".to_string(),
            api_key: "KEY".to_string(),
            api_key_override: None,
            proxy: None,
            retry: true,
            rate: true,
            raw: false,
            safe: false,
            user_agent_prefix: None,
        }
    }

    #[test]
    fn test_join_url_collapses_duplicate_separators() {
        assert_eq!(
            join_url("https://testing-api.postmen.com/v3", "/labels"),
            "https://testing-api.postmen.com/v3/labels"
        );
        assert_eq!(
            join_url("https://testing-api.postmen.com/v3/", "labels//123"),
            "https://testing-api.postmen.com/v3/labels/123"
        );
        assert_eq!(
            join_url("http://localhost:9000", "///rates"),
            "http://localhost:9000/rates"
        );
    }

    #[test]
    fn test_build_request_defaults() {
        let (request, policy) =
            build_request("GET", "/labels/123", CallInput::new(), CallOptions::new(), &defaults())
                .unwrap();

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "https://testing-api.postmen.com/v3/labels/123");
        assert_eq!(request.header("postmen-api-key"), Some("KEY"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("connection"), Some("keep-alive"));
        assert_eq!(request.header("x-postmen-agent"), Some(SDK_VERSION));
        assert!(request.body.is_none());
        assert!(request.query.is_none());
        assert!(request.proxy.is_none());

        assert_eq!(
            policy,
            CallPolicy {
                retry: true,
                rate: true,
                raw: false,
                safe: false,
                api_key: "KEY".to_string(),
            }
        );
    }

    #[test]
    fn test_build_request_rejects_invalid_method_and_resource() {
        assert!(matches!(
            build_request("PATCH", "/labels", CallInput::new(), CallOptions::new(), &defaults()),
            Err(ValidationError::InvalidMethod { .. })
        ));
        assert!(matches!(
            build_request("GET", "", CallInput::new(), CallOptions::new(), &defaults()),
            Err(ValidationError::InvalidResource { .. })
        ));
        assert!(matches!(
            build_request("GET", "   ", CallInput::new(), CallOptions::new(), &defaults()),
            Err(ValidationError::InvalidResource { .. })
        ));
    }

    #[test]
    fn test_build_request_rejects_non_object_body() {
        let input = CallInput::with_body(json!(["not", "an", "object"]));
        assert!(matches!(
            build_request("POST", "/labels", input, CallOptions::new(), &defaults()),
            Err(ValidationError::InvalidBody { .. })
        ));
    }

    #[test]
    fn test_build_request_decodes_encoded_query() {
        let input = CallInput::with_query("limit=5&status=created");
        let (request, _) =
            build_request("GET", "/labels", input, CallOptions::new(), &defaults()).unwrap();

        let query = request.query.unwrap();
        assert_eq!(query.get("limit").map(String::as_str), Some("5"));
        assert_eq!(query.get("status").map(String::as_str), Some("created"));
    }

    #[test]
    fn test_per_call_options_win_over_defaults() {
        let options = CallOptions::new().retry(false).raw(true).api_key("CALL");
        let mut defaults = defaults();
        defaults.api_key_override = Some("ONCE".to_string());

        let (request, policy) =
            build_request("GET", "/rates", CallInput::new(), options, &defaults).unwrap();

        assert_eq!(request.header("postmen-api-key"), Some("CALL"));
        assert!(!policy.retry);
        assert!(policy.raw);
        assert_eq!(policy.api_key, "CALL");
    }

    #[test]
    fn test_one_shot_override_wins_over_default_key() {
        let mut defaults = defaults();
        defaults.api_key_override = Some("ONCE".to_string());

        let (request, policy) =
            build_request("GET", "/rates", CallInput::new(), CallOptions::new(), &defaults)
                .unwrap();

        assert_eq!(request.header("postmen-api-key"), Some("ONCE"));
        assert_eq!(policy.api_key, "ONCE");
    }

    #[test]
    fn test_empty_api_key_override_is_rejected() {
        let options = CallOptions::new().api_key("  ");
        assert!(matches!(
            build_request("GET", "/rates", CallInput::new(), options, &defaults()),
            Err(ValidationError::InvalidApiKey { .. })
        ));
    }

    #[test]
    fn test_extra_headers_never_replace_built_ins() {
        let input = CallInput::new()
            .header("platform", "csv")
            .header("content-type", "text/plain")
            .header("postmen-api-key", "HIJACK");

        let (request, _) =
            build_request("POST", "/labels", input, CallOptions::new(), &defaults()).unwrap();

        assert_eq!(request.header("platform"), Some("csv"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.header("postmen-api-key"), Some("KEY"));
        assert_eq!(
            request
                .headers
                .keys()
                .filter(|k| k.eq_ignore_ascii_case("content-type"))
                .count(),
            1
        );
    }

    #[test]
    fn test_proxy_and_user_agent_prefix_are_applied() {
        let mut defaults = defaults();
        defaults.proxy = Some("http://127.0.0.1:8888".to_string());
        defaults.user_agent_prefix = Some("MyApp/1.0".to_string());

        let (request, _) =
            build_request("GET", "/labels", CallInput::new(), CallOptions::new(), &defaults)
                .unwrap();

        assert_eq!(request.proxy.as_deref(), Some("http://127.0.0.1:8888"));
        let user_agent = request.header("User-Agent").unwrap();
        assert!(user_agent.starts_with("MyApp/1.0 | "));
        assert!(user_agent.contains("Postmen API Library v"));
        assert!(user_agent.contains("Rust"));
    }

    #[test]
    fn test_built_request_never_contains_null_values() {
        let input = CallInput::with_body(json!({"async": false}));
        let (request, _) =
            build_request("POST", "/labels", input, CallOptions::new(), &defaults()).unwrap();

        let serialized = serde_json::to_value(&request).unwrap();
        let object = serialized.as_object().unwrap();
        assert!(object.values().all(|v| !v.is_null()));
        assert!(object.contains_key("body"));
        assert!(!object.contains_key("query"));
    }
}
