//! Error types for service API calls.
//!
//! Errors are categorized so the retry helper can tell transient faults
//! (server errors, dropped connections) from failures that will never
//! succeed on a second attempt (bad requests, rejected credentials).

use crate::transport::Method;
use std::fmt;

/// Result type alias for service API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 5xx responses and connection-level failures (retryable).
    Transient,
    /// 4xx responses.
    Client,
    /// Session login rejected.
    Authentication,
    /// The service answered, but not with what we expected.
    Response,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Service temporarily unavailable",
            Self::Client => "Request rejected by service",
            Self::Authentication => "Authentication failed",
            Self::Response => "Malformed response",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a service API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Server error or connection failure.
    #[error("{method} {url} failed: {message}")]
    Transient {
        /// HTTP method of the failed request.
        method: Method,
        /// Full request URL.
        url: String,
        /// HTTP status, when the server answered at all.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// Non-retryable 4xx response.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    ClientHttp {
        /// HTTP method of the failed request.
        method: Method,
        /// Full request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, trimmed.
        body: String,
    },

    /// Session login was refused or set no session cookie.
    #[error("{service} login failed: {message}")]
    Authentication {
        /// Service being logged in to.
        service: String,
        /// What the service answered instead.
        message: String,
    },

    /// Response claimed to be JSON but did not parse.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        /// Full request URL.
        url: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Response parsed but had an unexpected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transient { .. } => ErrorCategory::Transient,
            Self::ClientHttp { .. } => ErrorCategory::Client,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Decode { .. } | Self::UnexpectedResponse(_) => ErrorCategory::Response,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } => *status,
            Self::ClientHttp { status, .. } => Some(*status),
            _ => None,
        }
    }
}
