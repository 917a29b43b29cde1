//! # restkit
//!
//! Small blocking REST client layer for services that each speak their own
//! dialect of auth.
//!
//! - [`ServiceClient`]: base URL + [`Auth`] scheme, retry with exponential
//!   backoff on 5xx and connection failures, and dry-run suppression of
//!   every non-GET request
//! - [`Transport`]: the seam between the client and the network, with a
//!   real [`UreqTransport`] and an in-memory [`MockTransport`]
//! - [`with_retry`]: the retry loop, usable on its own
//!
//! ```
//! use restkit::{Auth, Method, MockTransport, RawResponse, ServiceClient};
//! use std::sync::Arc;
//!
//! let mock = MockTransport::new();
//! mock.on(Method::Get, "http://sonarr/api/v3/system/status", RawResponse::text(200, "ok"));
//!
//! let client = ServiceClient::new(
//!     "sonarr",
//!     "http://sonarr",
//!     Auth::ApiKey("key".into()),
//!     Arc::new(mock.clone()),
//! )
//! .with_dry_run(true);
//!
//! client.get("api/v3/system/status").unwrap();
//! assert!(!client.post_empty("api/v1/command").unwrap().is_applied());
//! assert!(mock.writes().is_empty());
//! ```

pub mod client;
pub mod error;
pub mod retry;
pub mod transport;

pub use client::{Auth, Body, ServiceClient};
pub use error::{Error, ErrorCategory, Result};
pub use retry::{LogCallback, RetryCallback, RetryConfig, with_retry};
pub use transport::{
    Method, MockTransport, RawResponse, Request, RequestBody, Transport, UreqTransport,
};
