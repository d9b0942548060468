//! The HTTP transport seam.
//!
//! The dispatcher never talks to the network directly: it hands every
//! [`RequestDescription`] to a [`Transport`]. [`ReqwestTransport`] is the
//! production implementation; tests substitute scripted transports.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::io;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::clients::errors::{TransportError, TransportErrorKind};
use crate::clients::http_request::{HttpMethod, RequestDescription};
use crate::clients::http_response::{HttpResponse, ResponseBody};

/// Sends one physical HTTP request.
///
/// Implementations must not retry: the dispatcher owns the retry policy.
/// A response with any status code is `Ok`; `Err` means no response was
/// obtained at all.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends the request and returns the response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] classified by [`TransportErrorKind`] if
    /// the exchange could not be completed.
    async fn send(&self, request: &RequestDescription) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Requests without a proxy share one client. A client is built and cached
/// per distinct proxy URL on first use.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    proxied: Mutex<HashMap<String, reqwest::Client>>,
}

// Verify ReqwestTransport is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ReqwestTransport>();
};

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Creates a new transport.
    ///
    /// # Panics
    ///
    /// Panics if the underlying reqwest client cannot be created. This should
    /// only happen in extremely unusual circumstances (e.g., TLS initialization failure).
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            proxied: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a transport around an existing reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            proxied: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };

        let mut proxied = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = proxied.get(proxy) {
            return Ok(client.clone());
        }

        let client = reqwest::Proxy::all(proxy)
            .and_then(|p| reqwest::Client::builder().proxy(p).build())
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Other,
                    format!("failed to configure proxy {proxy}: {e}"),
                )
            })?;
        proxied.insert(proxy.to_string(), client.clone());
        Ok(client)
    }

    /// Parses response headers into a `HashMap`.
    fn parse_response_headers(
        headers: &reqwest::header::HeaderMap,
    ) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            let key = name.as_str().to_lowercase();
            let value = value.to_str().unwrap_or_default().to_string();
            result.entry(key).or_default().push(value);
        }
        result
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescription) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(request.proxy.as_deref())?;

        let mut req_builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
            HttpMethod::Put => client.put(&request.url),
            HttpMethod::Delete => client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(query) = &request.query {
            req_builder = req_builder.query(query);
        }

        if let Some(body) = &request.body {
            req_builder = req_builder.body(body.to_string());
        }

        let res = req_builder.send().await.map_err(classify_reqwest_error)?;

        let code = res.status().as_u16();
        let headers = Self::parse_response_headers(res.headers());
        let text = res.text().await.map_err(classify_reqwest_error)?;

        Ok(HttpResponse::new(code, headers, ResponseBody::from_text(text)))
    }
}

/// Maps a reqwest failure onto a [`TransportErrorKind`].
fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else {
        io_error_kind(&error).map_or(TransportErrorKind::Other, |kind| match kind {
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                TransportErrorKind::ConnectionReset
            }
            io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            _ => TransportErrorKind::Other,
        })
    };
    TransportError::new(kind, error.to_string())
}

/// Finds the innermost I/O error kind in an error's source chain.
fn io_error_kind(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current = error.source();
    let mut kind = None;
    while let Some(source) = current {
        if let Some(io_error) = source.downcast_ref::<io::Error>() {
            kind = Some(io_error.kind());
        }
        current = source.source();
    }
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kind_walks_source_chain() {
        #[derive(Debug)]
        struct Wrapper(io::Error);

        impl std::fmt::Display for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "wrapped: {}", self.0)
            }
        }

        impl StdError for Wrapper {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let error = Wrapper(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(io_error_kind(&error), Some(io::ErrorKind::ConnectionRefused));

        let plain = io::Error::from(io::ErrorKind::Other);
        assert_eq!(io_error_kind(&plain), None);
    }

    #[test]
    fn test_proxied_clients_are_cached() {
        let transport = ReqwestTransport::new();
        transport.client_for(Some("http://127.0.0.1:8888")).unwrap();
        transport.client_for(Some("http://127.0.0.1:8888")).unwrap();
        transport.client_for(None).unwrap();

        assert_eq!(transport.proxied.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_transport_is_object_safe() {
        let transport: Box<dyn Transport> = Box::new(ReqwestTransport::new());
        assert!(format!("{transport:?}").contains("ReqwestTransport"));
    }
}
