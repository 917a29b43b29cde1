//! Transport trait and implementations for sending HTTP requests.
//!
//! [`ServiceClient`](crate::ServiceClient) never talks to the network
//! directly. It hands a fully-built [`Request`] to a [`Transport`], which
//! makes it possible to swap the real [`UreqTransport`] for an in-memory
//! [`MockTransport`] in tests.
//!
//! # Testing
//!
//! ```
//! use restkit::{Method, MockTransport, RawResponse, Request, Transport};
//!
//! let mock = MockTransport::new();
//! let tags = RawResponse::json(200, &serde_json::json!([]));
//! mock.on(Method::Get, "http://sonarr/api/v3/tag", tags);
//!
//! let response = mock.send(&Request::new(Method::Get, "http://sonarr/api/v3/tag")).unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(mock.requests().len(), 1);
//! ```

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use ureq::typestate::WithBody;

/// Per-request timeout for the real transport.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP methods used by the service APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the method changes remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully-built request, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Look up a header value (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Look up a form field value.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// The JSON payload, if the body is JSON.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Status, headers, and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body).with_header("content-type", "text/plain; charset=UTF-8")
    }

    /// A JSON response.
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// All header values with this name (case-insensitive).
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the content type announces JSON.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends requests somewhere and returns whatever came back.
///
/// Implementations report every HTTP status as a successful exchange.
/// Only connection-level failures (DNS, refused, timeout) are errors, and
/// those must be [`Error::Transient`] so they get retried.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<RawResponse>;
}

// =============================================================================
// ureq transport
// =============================================================================

/// Real transport backed by a blocking `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &Request) -> Result<RawResponse> {
        let url = request.url.as_str();

        let result = match request.method {
            Method::Get => prepare(self.agent.get(url), request).call(),
            Method::Delete => prepare(self.agent.delete(url), request).call(),
            Method::Post => send_with_body(prepare(self.agent.post(url), request), &request.body),
            Method::Put => send_with_body(prepare(self.agent.put(url), request), &request.body),
        };

        let connection_error = |e: ureq::Error| Error::Transient {
            method: request.method,
            url: request.url.clone(),
            status: None,
            message: e.to_string(),
        };

        let mut response = result.map_err(connection_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(connection_error)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn prepare<B>(mut builder: ureq::RequestBuilder<B>, request: &Request) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (name, value) in &request.query {
        builder = builder.query(name, value);
    }
    builder
}

fn send_with_body(
    builder: ureq::RequestBuilder<WithBody>,
    body: &RequestBody,
) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        RequestBody::Empty => builder.send_empty(),
        RequestBody::Json(value) => builder.send_json(value),
        RequestBody::Form(fields) => {
            builder.send_form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        }
    }
}

// =============================================================================
// Mock transport
// =============================================================================

#[derive(Debug, Clone)]
enum MockReply {
    Response(RawResponse),
    ConnectionError(String),
}

/// In-memory transport for tests.
///
/// Replies are queued per (method, URL). Each call pops the front of the
/// queue, except the last reply, which keeps answering. Unknown routes get
/// a 404. Every request is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<(Method, String), VecDeque<MockReply>>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, url: &str, reply: MockReply) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a response for a route.
    pub fn on(&self, method: Method, url: &str, response: RawResponse) -> &Self {
        self.push(method, url, MockReply::Response(response));
        self
    }

    /// Queue a JSON response for a route.
    pub fn on_json(&self, method: Method, url: &str, status: u16, value: &Value) -> &Self {
        self.on(method, url, RawResponse::json(status, value))
    }

    /// Queue a connection-level failure for a route.
    pub fn fail(&self, method: Method, url: &str, message: &str) -> &Self {
        self.push(method, url, MockReply::ConnectionError(message.to_string()));
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests that would have changed remote state.
    pub fn writes(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.is_mutation())
            .collect()
    }

    /// Requests sent to one route.
    pub fn requests_to(&self, method: Method, url: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &Request) -> Result<RawResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let reply = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            routes
                .get_mut(&(request.method, request.url.clone()))
                .and_then(|queue| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
        };

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::ConnectionError(message)) => Err(Error::Transient {
                method: request.method,
                url: request.url.clone(),
                status: None,
                message,
            }),
            None => Ok(RawResponse::text(404, "Not Found")),
        }
    }
}
