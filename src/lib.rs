//! # Postmen API Rust SDK
//!
//! A Rust SDK for the Postmen shipping API: labels, rates, manifests, label
//! cancellations, address validations and shipper accounts.
//!
//! ## Overview
//!
//! This SDK provides:
//! - Type-safe configuration via [`PostmenConfig`] and [`PostmenConfigBuilder`]
//! - Validated newtypes for the API key, region, endpoint and proxy
//! - A [`Postmen`] client with verb shortcuts and a resource catalogue
//! - Automatic retries with exponential backoff for transient failures
//! - Per-API-key rate-limit tracking that waits out throttling
//! - Future-style and callback-style completion for every call
//! - Raw mode (exact response text) and safe mode (errors stored, not returned)
//!
//! ## Quick Start
//!
//! ```rust
//! use postmen_api::{PostmenConfig, ApiKey, Region};
//!
//! let config = PostmenConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .region(Region::new("sandbox").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.endpoint().as_ref(), "https://sandbox-api.postmen.com/v3");
//! ```
//!
//! ## Making API Calls
//!
//! ```rust,ignore
//! use postmen_api::{CallInput, CallOptions, Postmen, PostmenError, Resource};
//! use serde_json::json;
//!
//! let mut postmen = Postmen::new("your-api-key", "sandbox")?;
//!
//! // Retrieve one label
//! let label = postmen.retrieve(Resource::Labels, "a3ef2a9c")?.await?;
//!
//! // Calculate rates, with an extra header
//! let input = CallInput::with_body(json!({"async": false, "shipment": {}}))
//!     .header("platform", "csv");
//! let rates = postmen.create(Resource::Rates, input)?.await?;
//!
//! // Per-call overrides
//! let raw = postmen
//!     .call("GET", Resource::Labels, CallInput::new(), CallOptions::new().raw(true))?
//!     .await?;
//!
//! // Errors carry the API's code, type and data
//! match postmen.get("/labels/missing", CallInput::new())?.await {
//!     Err(PostmenError::Api { details, .. }) => println!("{}", details.code),
//!     other => println!("{other:?}"),
//! }
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: Rate-limit state lives in a [`RateLimitLedger`]
//!   owned by the client or injected to be shared
//! - **Fail-fast validation**: Bad configuration fails construction and bad
//!   call arguments fail before anything is sent
//! - **Thread-safe**: All client types are `Send + Sync`
//! - **Async-first**: Designed for use with Tokio async runtime

pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use config::{
    ApiKey, ClientOptions, Endpoint, PostmenConfig, PostmenConfigBuilder, ProxyUrl, Region,
};
pub use error::ConfigError;

// Re-export client types
pub use clients::{
    ApiErrorDetails, ApiResponse, CallInput, CallOptions, HttpMethod, PendingCall, Postmen,
    PostmenError, Query, RateLimitLedger, RateLimitRecord, Resource, Transport, TransportError,
    TransportErrorKind, ValidationError,
};
