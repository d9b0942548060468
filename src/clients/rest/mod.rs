//! The Postmen client and resource catalogue.
//!
//! # Overview
//!
//! - [`Postmen`]: The client, with `call()` plus `get()`, `create()`,
//!   `post()`, `put()`, `delete()` and `retrieve()` shortcuts
//! - [`Resource`]: The API's resource collections
//!
//! # Resource paths
//!
//! A path that does not start with `/` is prefixed with the API version
//! (`/v3/labels`) unless the endpoint already ends with it, as endpoints
//! derived from a region do. A path starting with `/` is used as given.
//! Repeated slashes are collapsed when the path is joined to the endpoint.

mod client;
mod resource;

pub use client::Postmen;
pub use resource::Resource;
