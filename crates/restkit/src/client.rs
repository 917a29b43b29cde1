//! Authenticated per-service client.
//!
//! A [`ServiceClient`] wraps one service's base URL and auth scheme. Reads
//! always go out. Writes are suppressed in dry-run mode and come back as
//! [`Body::Skipped`], so callers can tell an applied change from a
//! previewed one.

use crate::error::{Error, Result};
use crate::retry::{LogCallback, RetryConfig, with_retry};
use crate::transport::{Method, RawResponse, Request, RequestBody, Transport};
use serde_json::Value;
use std::cell::OnceCell;
use std::sync::Arc;

/// qBittorrent answers this on a successful login.
const LOGIN_OK: &str = "Ok.";
const LOGIN_PATH: &str = "api/v2/auth/login";

/// How a service expects to be authenticated.
#[derive(Debug, Clone)]
pub enum Auth {
    /// No credentials.
    None,
    /// `X-Api-Key: <key>` (Sonarr, Radarr, Prowlarr, Jellyseerr).
    ApiKey(String),
    /// `Authorization: MediaBrowser Token="<key>"` (Jellyfin).
    MediaBrowser(String),
    /// Form login that hands back a session cookie (qBittorrent).
    Session { username: String, password: String },
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
    /// The write was suppressed by dry-run.
    Skipped,
}

impl Body {
    /// Whether a write actually reached the service.
    pub fn is_applied(&self) -> bool {
        !matches!(self, Self::Skipped)
    }

    /// Borrow the JSON value, if any.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Client for one service instance.
pub struct ServiceClient {
    service: String,
    base_url: String,
    auth: Auth,
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    dry_run: bool,
    /// Session cookie, set once after login.
    session: OnceCell<String>,
}

impl ServiceClient {
    pub fn new(
        service: impl Into<String>,
        base_url: &str,
        auth: Auth,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            service: service.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            transport,
            retry: RetryConfig::default(),
            dry_run: false,
            session: OnceCell::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ------------------------------------------------------------------------
    // Public API
    // ------------------------------------------------------------------------

    pub fn get(&self, path: &str) -> Result<Body> {
        self.send(Method::Get, path, &[], RequestBody::Empty)
    }

    /// GET and require a JSON body.
    pub fn get_json(&self, path: &str) -> Result<Value> {
        match self.get(path)? {
            Body::Json(value) => Ok(value),
            Body::Text(text) => serde_json::from_str(&text).map_err(|source| Error::Decode {
                url: self.url(path),
                source,
            }),
            Body::Skipped => Err(Error::UnexpectedResponse(format!(
                "GET {} was skipped",
                self.url(path)
            ))),
        }
    }

    pub fn post_json(&self, path: &str, payload: &Value) -> Result<Body> {
        self.send(Method::Post, path, &[], RequestBody::Json(payload.clone()))
    }

    pub fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Body> {
        self.send(Method::Post, path, &[], form(fields))
    }

    pub fn post_empty(&self, path: &str) -> Result<Body> {
        self.send(Method::Post, path, &[], RequestBody::Empty)
    }

    pub fn put_json(&self, path: &str, payload: &Value) -> Result<Body> {
        self.send(Method::Put, path, &[], RequestBody::Json(payload.clone()))
    }

    pub fn delete(&self, path: &str) -> Result<Body> {
        self.send(Method::Delete, path, &[], RequestBody::Empty)
    }

    /// Send any request. Writes are suppressed in dry-run mode.
    pub fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: RequestBody,
    ) -> Result<Body> {
        if method.is_mutation() && self.dry_run {
            log::info!("[DRY-RUN] Would {} {}", method, self.url(path));
            return Ok(Body::Skipped);
        }

        if matches!(self.auth, Auth::Session { .. }) && self.session.get().is_none() {
            self.login()?;
        }

        let mut request = self.request(method, path).body(body);
        for (name, value) in query {
            request = request.query(*name, *value);
        }

        let response = self.execute(&request)?;
        self.decode(&request, response)
    }

    /// Log in to a session-based service.
    ///
    /// Runs even in dry-run mode, since every later read depends on it.
    /// Services without session auth accept this as a no-op.
    pub fn login(&self) -> Result<()> {
        let Auth::Session { username, password } = &self.auth else {
            return Ok(());
        };
        if self.session.get().is_some() {
            return Ok(());
        }

        let request = self
            .request(Method::Post, LOGIN_PATH)
            .body(form(&[("username", username.as_str()), ("password", password.as_str())]));
        let response = self.execute(&request)?;

        if response.body != LOGIN_OK {
            return Err(Error::Authentication {
                service: self.service.clone(),
                message: response.body.trim().to_string(),
            });
        }

        let Some(cookie) = session_cookie(&response) else {
            return Err(Error::Authentication {
                service: self.service.clone(),
                message: "login set no session cookie".to_string(),
            });
        };

        let _ = self.session.set(cookie);
        log::info!("{}: authenticated successfully", self.service);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn request(&self, method: Method, path: &str) -> Request {
        let request = Request::new(method, self.url(path));
        match &self.auth {
            Auth::None => request,
            Auth::ApiKey(key) => request.header("X-Api-Key", key.as_str()),
            Auth::MediaBrowser(key) => {
                request.header("Authorization", format!("MediaBrowser Token=\"{key}\""))
            }
            Auth::Session { .. } => match self.session.get() {
                Some(cookie) => request.header("Cookie", cookie.as_str()),
                None => request,
            },
        }
    }

    /// Send with retry; classify the status code.
    fn execute(&self, request: &Request) -> Result<RawResponse> {
        with_retry(&self.retry, Some(&LogCallback), || {
            let response = self.transport.send(request)?;
            match response.status {
                status if status >= 500 => Err(Error::Transient {
                    method: request.method,
                    url: request.url.clone(),
                    status: Some(status),
                    message: format!("HTTP {status} server error"),
                }),
                400..=499 => Err(Error::ClientHttp {
                    method: request.method,
                    url: request.url.clone(),
                    status: response.status,
                    body: response.body.trim().to_string(),
                }),
                _ => Ok(response),
            }
        })
    }

    fn decode(&self, request: &Request, response: RawResponse) -> Result<Body> {
        if !response.is_json() {
            return Ok(Body::Text(response.body));
        }
        if response.body.trim().is_empty() {
            return Ok(Body::Json(Value::Null));
        }
        serde_json::from_str(&response.body)
            .map(Body::Json)
            .map_err(|source| Error::Decode {
                url: request.url.clone(),
                source,
            })
    }
}

/// Every `name=value` pair the response sets, as a `Cookie` header value
fn session_cookie(response: &RawResponse) -> Option<String> {
    let pairs: Vec<&str> = response
        .header_all("set-cookie")
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.split_once('=').is_some_and(|(name, _)| !name.is_empty()))
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

fn form(fields: &[(&str, &str)]) -> RequestBody {
    RequestBody::Form(
        fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    )
}
