//! HTTP plumbing for Postmen API calls.
//!
//! This module turns a logical call into HTTP attempts and a single result.
//! It handles request construction, retries with backoff, rate-limit
//! tracking, and response normalization.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`rest::Postmen`]: The client applications hold
//! - [`CallInput`] / [`CallOptions`]: Per-call payload and overrides
//! - [`build_request`]: Validates a call and builds its [`RequestDescription`]
//! - [`Dispatcher`]: Runs a call through the retry state machine
//! - [`PendingCall`]: A call in progress, awaitable or callback-driven
//! - [`RateLimitLedger`]: Per-API-key rate-limit state shared across calls
//! - [`Transport`]: The seam to the network, implemented by [`ReqwestTransport`]
//! - [`PostmenError`] / [`ValidationError`]: The error taxonomy
//!
//! # Retry Behavior
//!
//! - **Timeouts, resets, refused connections**: Retried
//! - **500, 502, 503, 504**: Retried
//! - **429 (Rate Limited)**: Waits until the `x-ratelimit-reset` time and
//!   resends, without spending the retry budget. Fails immediately when
//!   rate awareness is off
//! - **Anything else**: Returned immediately
//!
//! Retries wait 1, 2, 4, 8 and 16 seconds. The sixth consecutive failure is
//! returned with `retry_count() == 5`.

mod dispatch;
mod errors;
mod http_request;
mod http_response;
mod payload;
mod rate_limit;
pub mod rest;
mod transport;

pub use dispatch::{
    classify, Dispatcher, Outcome, PendingCall, RetryState, INITIAL_RETRY_DELAY, MAX_RETRIES,
    THROTTLE_WAIT_FLOOR,
};
pub use errors::{
    ApiErrorDetails, PostmenError, TransportError, TransportErrorKind, ValidationError,
    MALFORMED_RESPONSE_CODE, MALFORMED_RESPONSE_MESSAGE, TRANSPORT_FAILURE_MESSAGE,
};
pub use http_request::{CallInput, CallOptions, HttpMethod, Query, RequestDescription};
pub use http_response::{normalize, ApiResponse, HttpResponse, ResponseBody};
pub use payload::{
    build_request, join_url, CallDefaults, CallPolicy, AGENT_HEADER, API_KEY_HEADER, SDK_VERSION,
};
pub use rate_limit::{
    RateLimitLedger, RateLimitRecord, RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER,
    RATE_LIMIT_RESET_HEADER,
};
pub use transport::{ReqwestTransport, Transport};

// Re-export client types at the clients module level
pub use rest::{Postmen, Resource};
