//! The dispatch and retry engine.
//!
//! A [`Dispatcher`] runs one logical call as a sequence of attempts:
//!
//! 1. If the call is rate aware and the ledger says its key is exhausted,
//!    wait for the window to reset without sending.
//! 2. Send the request through the [`Transport`].
//! 3. Record the response's rate-limit headers in the ledger.
//! 4. [`classify`] the result into an [`Outcome`] and either finish, wait
//!    for a throttling window, or back off and send again.
//!
//! Error retries back off exponentially from one second (1s, 2s, 4s, 8s,
//! 16s) and stop after [`MAX_RETRIES`]. Throttling waits do not count
//! against that budget.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::clients::errors::{ApiErrorDetails, PostmenError, TransportError};
use crate::clients::http_request::RequestDescription;
use crate::clients::http_response::{normalize, ApiResponse, HttpResponse, ResponseBody};
use crate::clients::payload::CallPolicy;
use crate::clients::rate_limit::RateLimitLedger;
use crate::clients::transport::Transport;

/// Maximum number of error retries per logical call.
pub const MAX_RETRIES: u32 = 5;

/// Delay before the first error retry.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Wait used for throttling when the ledger has no future reset time.
pub const THROTTLE_WAIT_FLOOR: Duration = Duration::from_secs(1);

/// Error-retry bookkeeping for one logical call.
///
/// `attempt` counts the retries scheduled so far and starts at `0`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use postmen_api::clients::RetryState;
///
/// let mut state = RetryState::new();
/// let delays: Vec<_> = std::iter::from_fn(|| state.schedule()).collect();
///
/// assert_eq!(delays, [1, 2, 4, 8, 16].map(Duration::from_secs));
/// assert_eq!(state.attempt(), 5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    delay: Duration,
    max_attempts: u32,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryState {
    /// Creates the initial state: no retries yet, one second delay.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempt: 0,
            delay: INITIAL_RETRY_DELAY,
            max_attempts: MAX_RETRIES,
        }
    }

    /// Returns the number of retries scheduled so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the delay the next retry would wait.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules a retry.
    ///
    /// Returns the delay to wait before it, then counts the retry and
    /// doubles the delay. Returns `None` once the budget is spent, leaving
    /// the state unchanged.
    pub fn schedule(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.delay;
        self.attempt += 1;
        self.delay = self.delay.saturating_mul(2);
        Some(delay)
    }
}

/// The classified result of one attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The call succeeded; carries the normalized result.
    Success(ApiResponse),
    /// The API throttled the call and the call is rate aware.
    Throttled(ApiErrorDetails),
    /// The API throttled the call and the call is not rate aware.
    RateLimitExceeded(ApiErrorDetails),
    /// A transient server-side fault (500, 502, 503, 504).
    RetriableServerError(ApiErrorDetails),
    /// A timeout, reset or refused connection.
    RetriableTransportError(TransportError),
    /// Any other API-level failure.
    TerminalApiError(ApiErrorDetails),
    /// Any other transport failure.
    TerminalTransportError(TransportError),
    /// The response body is not a JSON object.
    MalformedResponse {
        /// The body text as received.
        body: String,
        /// The HTTP status.
        status: u16,
    },
}

/// Classifies the result of one attempt.
///
/// The status is taken from the body's `meta.code`, falling back to the
/// HTTP status. Throttling and transient server faults are classified the
/// same way in raw mode; any other status in raw mode is a success carrying
/// the received body text. Whether a retriable outcome is actually retried
/// is decided by the caller, which owns the retry budget.
#[must_use]
pub fn classify(result: Result<HttpResponse, TransportError>, policy: &CallPolicy) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(error) if error.kind.is_retriable() => return Outcome::RetriableTransportError(error),
        Err(error) => return Outcome::TerminalTransportError(error),
    };

    let status = response.code;
    let (body, text) = match response.body {
        ResponseBody::Json { value, text } if value.is_object() => (value, text),
        other => {
            return Outcome::MalformedResponse {
                body: other.to_text(),
                status,
            }
        }
    };

    let code = body
        .get("meta")
        .and_then(|meta| meta.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or_else(|| i64::from(status));

    let details = |body: &Value, text: String| ApiErrorDetails {
        response_body: text,
        ..ApiErrorDetails::from_body(body, status)
    };

    match code {
        429 if policy.rate => Outcome::Throttled(details(&body, text)),
        500 | 502 | 503 | 504 => Outcome::RetriableServerError(details(&body, text)),
        _ if policy.raw => Outcome::Success(normalize(body, text, true)),
        200 | 201 => Outcome::Success(normalize(body, text, false)),
        429 => Outcome::RateLimitExceeded(details(&body, text)),
        _ => Outcome::TerminalApiError(details(&body, text)),
    }
}

/// Runs logical calls against a transport, sharing one rate-limit ledger.
///
/// Cloning a dispatcher is cheap; clones share the transport, the ledger and
/// the last-error slot.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    ledger: RateLimitLedger,
    last_error: Arc<Mutex<Option<PostmenError>>>,
}

// Verify Dispatcher is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Dispatcher>();
};

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, ledger: RateLimitLedger) -> Self {
        Self {
            transport,
            ledger,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Replaces the rate-limit ledger, keeping the transport.
    #[must_use]
    pub fn with_ledger(mut self, ledger: RateLimitLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Returns the rate-limit ledger.
    #[must_use]
    pub const fn ledger(&self) -> &RateLimitLedger {
        &self.ledger
    }

    /// Returns the last error swallowed by safe mode, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<PostmenError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Starts a logical call.
    ///
    /// Nothing is sent until the returned [`PendingCall`] is awaited or
    /// handed to [`PendingCall::on_complete`]. In safe mode a failed call
    /// completes with [`ApiResponse::Empty`] and the error is stored for
    /// [`Dispatcher::last_error`].
    #[must_use]
    pub fn dispatch(&self, request: RequestDescription, policy: CallPolicy) -> PendingCall {
        let transport = Arc::clone(&self.transport);
        let ledger = self.ledger.clone();
        let last_error = Arc::clone(&self.last_error);

        PendingCall::new(async move {
            let result = run(transport.as_ref(), &ledger, &request, &policy).await;
            match result {
                Err(error) if policy.safe => {
                    tracing::warn!(
                        "Safe mode suppressed error for {} {}: {}",
                        request.method,
                        request.url,
                        error
                    );
                    *last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
                    Ok(ApiResponse::Empty)
                }
                other => other,
            }
        })
    }
}

/// Wait after a 429: until the window resets, but never less than
/// [`THROTTLE_WAIT_FLOOR`].
fn throttle_wait(ledger: &RateLimitLedger, api_key: &str) -> Duration {
    ledger
        .time_until_reset(api_key)
        .filter(|wait| !wait.is_zero())
        .unwrap_or(THROTTLE_WAIT_FLOOR)
}

fn next_retry(policy: &CallPolicy, state: &mut RetryState) -> Option<Duration> {
    if policy.retry {
        state.schedule()
    } else {
        None
    }
}

async fn run(
    transport: &dyn Transport,
    ledger: &RateLimitLedger,
    request: &RequestDescription,
    policy: &CallPolicy,
) -> Result<ApiResponse, PostmenError> {
    let mut state = RetryState::new();
    // Set after a throttling wait so the next attempt is always sent.
    let mut waited_for_reset = false;

    loop {
        if policy.rate && !waited_for_reset && ledger.is_exhausted(&policy.api_key) {
            // A window that has already reset is not waited on.
            let wait = ledger
                .time_until_reset(&policy.api_key)
                .unwrap_or_default();
            if !wait.is_zero() {
                tracing::debug!(
                    "Rate limit exhausted, holding {} {} until reset",
                    request.method,
                    request.url
                );
                tracing::warn!("Rate limited, waiting {:?} before sending", wait);
                tokio::time::sleep(wait).await;
            }
        }
        waited_for_reset = false;

        tracing::debug!(
            "Sending {} {} (retry {} of {})",
            request.method,
            request.url,
            state.attempt(),
            MAX_RETRIES
        );

        let result = transport.send(request).await;
        if let Ok(response) = &result {
            ledger.observe(&policy.api_key, response);
        }

        match classify(result, policy) {
            Outcome::Success(response) => return Ok(response),
            Outcome::Throttled(details) => {
                let wait = throttle_wait(ledger, &policy.api_key);
                tracing::warn!(
                    "Throttled by Postmen API ({}), retrying {} {} in {:?}",
                    details,
                    request.method,
                    request.url,
                    wait
                );
                tokio::time::sleep(wait).await;
                waited_for_reset = true;
            }
            Outcome::RetriableServerError(details) => {
                let Some(delay) = next_retry(policy, &mut state) else {
                    if policy.raw {
                        return Ok(ApiResponse::Raw(details.response_body));
                    }
                    return Err(PostmenError::Server {
                        details,
                        retry_count: state.attempt(),
                    });
                };
                tracing::warn!(
                    "Server error {}, retry {} of {} for {} {} in {:?}",
                    details,
                    state.attempt(),
                    MAX_RETRIES,
                    request.method,
                    request.url,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Outcome::RetriableTransportError(error) => {
                let Some(delay) = next_retry(policy, &mut state) else {
                    return Err(PostmenError::Transport {
                        error,
                        retry_count: state.attempt(),
                    });
                };
                tracing::warn!(
                    "Transport error {}, retry {} of {} for {} {} in {:?}",
                    error,
                    state.attempt(),
                    MAX_RETRIES,
                    request.method,
                    request.url,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Outcome::RateLimitExceeded(details) => {
                return Err(PostmenError::Throttled {
                    details,
                    retry_count: state.attempt(),
                })
            }
            Outcome::TerminalApiError(details) => {
                return Err(PostmenError::Api {
                    details,
                    retry_count: state.attempt(),
                })
            }
            Outcome::TerminalTransportError(error) => {
                return Err(PostmenError::Transport {
                    error,
                    retry_count: state.attempt(),
                })
            }
            Outcome::MalformedResponse { body, status } => {
                return Err(PostmenError::MalformedResponse {
                    body,
                    status,
                    retry_count: state.attempt(),
                })
            }
        }
    }
}

type CallFuture = Pin<Box<dyn Future<Output = Result<ApiResponse, PostmenError>> + Send>>;

/// A logical call in progress.
///
/// Await it for the result, or attach a completion callback with
/// [`PendingCall::on_complete`].
///
/// # Example
///
/// ```rust,ignore
/// // Future style
/// let label = postmen.get("/labels/123", CallInput::new())?.await?;
///
/// // Callback style
/// postmen
///     .get("/labels/123", CallInput::new())?
///     .on_complete(|result| match result {
///         Ok(label) => println!("{label:?}"),
///         Err(error) => eprintln!("{error}"),
///     });
/// ```
#[must_use = "a PendingCall does nothing unless awaited or given a completion callback"]
pub struct PendingCall {
    inner: CallFuture,
}

impl PendingCall {
    fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<ApiResponse, PostmenError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }

    /// Runs the call on the current Tokio runtime and passes its result to
    /// `callback` exactly once.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn on_complete<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<ApiResponse, PostmenError>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) })
    }
}

impl Future for PendingCall {
    type Output = Result<ApiResponse, PostmenError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::TransportErrorKind;
    use serde_json::json;
    use std::collections::HashMap;

    fn policy() -> CallPolicy {
        CallPolicy {
            retry: true,
            rate: true,
            raw: false,
            safe: false,
            api_key: "KEY".to_string(),
        }
    }

    fn response(status: u16, body: Value) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(status, HashMap::new(), ResponseBody::json(body)))
    }

    // ========================================================================
    // RetryState
    // ========================================================================

    #[test]
    fn test_retry_state_doubles_delay_and_caps_attempts() {
        let mut state = RetryState::new();
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.delay(), Duration::from_secs(1));

        for expected in [1, 2, 4, 8, 16] {
            assert_eq!(state.schedule(), Some(Duration::from_secs(expected)));
        }
        assert_eq!(state.attempt(), MAX_RETRIES);
        assert_eq!(state.schedule(), None);
        assert_eq!(state.attempt(), MAX_RETRIES);
    }

    #[test]
    fn test_retries_disabled_never_schedule() {
        let mut state = RetryState::new();
        let policy = CallPolicy {
            retry: false,
            ..policy()
        };
        assert_eq!(next_retry(&policy, &mut state), None);
        assert_eq!(state.attempt(), 0);
    }

    // ========================================================================
    // classify
    // ========================================================================

    #[test]
    fn test_classify_success_codes() {
        let body = json!({"meta": {"code": 200}, "data": {"id": "123"}});
        assert_eq!(
            classify(response(200, body.clone()), &policy()),
            Outcome::Success(ApiResponse::Json(body))
        );

        let created = json!({"meta": {"code": 201}, "data": {}});
        assert!(matches!(
            classify(response(201, created), &policy()),
            Outcome::Success(_)
        ));
    }

    #[test]
    fn test_classify_prefers_meta_code_over_status() {
        let body = json!({"meta": {"code": 4153, "message": "Not found", "retryable": false}});
        match classify(response(200, body), &policy()) {
            Outcome::TerminalApiError(details) => assert_eq!(details.code, 4153),
            other => panic!("expected terminal api error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_falls_back_to_http_status() {
        assert!(matches!(
            classify(response(503, json!({})), &policy()),
            Outcome::RetriableServerError(details) if details.code == 503
        ));
        assert!(matches!(
            classify(response(404, json!({"error": "nope"})), &policy()),
            Outcome::TerminalApiError(details) if details.code == 404
        ));
    }

    #[test]
    fn test_classify_retriable_server_codes() {
        for code in [500, 502, 503, 504] {
            let body = json!({"meta": {"code": code, "retryable": true}});
            assert!(matches!(
                classify(response(200, body), &policy()),
                Outcome::RetriableServerError(_)
            ));
        }
        let body = json!({"meta": {"code": 501}});
        assert!(matches!(
            classify(response(501, body), &policy()),
            Outcome::TerminalApiError(_)
        ));
    }

    #[test]
    fn test_classify_throttling_depends_on_rate_awareness() {
        let body = json!({"meta": {"code": 429, "message": "Too many requests"}});
        assert!(matches!(
            classify(response(429, body.clone()), &policy()),
            Outcome::Throttled(_)
        ));

        let unaware = CallPolicy {
            rate: false,
            ..policy()
        };
        assert!(matches!(
            classify(response(429, body), &unaware),
            Outcome::RateLimitExceeded(details) if details.code == 429
        ));
    }

    #[test]
    fn test_classify_malformed_bodies() {
        let text = Ok(HttpResponse::new(
            200,
            HashMap::new(),
            ResponseBody::Text("<html>oops</html>".to_string()),
        ));
        assert_eq!(
            classify(text, &policy()),
            Outcome::MalformedResponse {
                body: "<html>oops</html>".to_string(),
                status: 200,
            }
        );

        assert!(matches!(
            classify(response(200, json!("a json string")), &policy()),
            Outcome::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_classify_raw_mode_skips_final_status_check() {
        let raw = CallPolicy {
            raw: true,
            ..policy()
        };
        for code in [200, 201, 404, 4153] {
            let wire = format!(r#"{{"meta":{{"code":{code}}},"data":{{}}}}"#);
            let received = Ok(HttpResponse::new(
                200,
                HashMap::new(),
                ResponseBody::from_text(wire.clone()),
            ));
            assert_eq!(
                classify(received, &raw),
                Outcome::Success(ApiResponse::Raw(wire))
            );
        }

        let unaware = CallPolicy {
            rate: false,
            ..raw.clone()
        };
        assert!(matches!(
            classify(response(429, json!({"meta": {"code": 429}})), &unaware),
            Outcome::Success(ApiResponse::Raw(_))
        ));
    }

    #[test]
    fn test_classify_raw_mode_keeps_retry_rules() {
        let raw = CallPolicy {
            raw: true,
            ..policy()
        };
        assert!(matches!(
            classify(response(429, json!({"meta": {"code": 429}})), &raw),
            Outcome::Throttled(_)
        ));
        for code in [500, 502, 503, 504] {
            assert!(matches!(
                classify(response(200, json!({"meta": {"code": code}})), &raw),
                Outcome::RetriableServerError(_)
            ));
        }
    }

    #[test]
    fn test_classify_error_details_keep_received_text() {
        let wire = r#"{"meta":{"code":503,"message":"busy"},"data":{}}"#;
        let received = Ok(HttpResponse::new(
            503,
            HashMap::new(),
            ResponseBody::from_text(wire),
        ));
        match classify(received, &policy()) {
            Outcome::RetriableServerError(details) => assert_eq!(details.response_body, wire),
            other => panic!("expected retriable server error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_transport_errors() {
        let reset = TransportError::new(TransportErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            classify(Err(reset), &policy()),
            Outcome::RetriableTransportError(_)
        ));

        let other = TransportError::new(TransportErrorKind::Other, "dns failure");
        assert!(matches!(
            classify(Err(other), &policy()),
            Outcome::TerminalTransportError(_)
        ));
    }

    #[test]
    fn test_pending_call_debug() {
        let call = PendingCall::new(async { Ok(ApiResponse::Empty) });
        assert!(format!("{call:?}").starts_with("PendingCall"));
    }

    #[tokio::test]
    async fn test_pending_call_resolves() {
        let call = PendingCall::new(async { Ok(ApiResponse::Raw("{}".to_string())) });
        assert_eq!(call.await.unwrap(), ApiResponse::Raw("{}".to_string()));
    }

    #[tokio::test]
    async fn test_on_complete_invokes_callback_once() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let call = PendingCall::new(async { Ok(ApiResponse::Empty) });

        call.on_complete(move |result| {
            let _ = tx.send(result);
        })
        .await
        .unwrap();

        assert_eq!(rx.await.unwrap().unwrap(), ApiResponse::Empty);
    }
}
