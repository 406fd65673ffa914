//! HTTP request types.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::client::HttpError;

/// Header names the wiki API protocol cares about.
pub mod headers {
    pub const RETRY_AFTER: &str = "retry-after";
    pub const X_DATABASE_LAG: &str = "x-database-lag";
}

/// HTTP verb used for an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the encoded parameters travel: the query string for GET, a
/// form-encoded body for POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Query(Vec<(String, String)>),
    Form(Vec<(String, String)>),
}

impl Payload {
    fn for_method(method: Method, params: Vec<(String, String)>) -> Self {
        match method {
            Method::Get => Payload::Query(params),
            Method::Post => Payload::Form(params),
        }
    }

    /// The encoded parameters regardless of placement.
    pub fn params(&self) -> &[(String, String)] {
        match self {
            Payload::Query(params) | Payload::Form(params) => params,
        }
    }
}

/// A single request handed to a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub payload: Payload,
    /// Per-request timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Rewrite the URL scheme to `https` before sending.
    pub force_ssl: bool,
}

impl HttpRequest {
    /// Create a request with no parameters.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            payload: Payload::for_method(method, Vec::new()),
            timeout: None,
            force_ssl: false,
        }
    }

    /// Set the encoded parameters, placed according to the method.
    pub fn params(mut self, params: Vec<(String, String)>) -> Self {
        self.payload = Payload::for_method(self.method, params);
        self
    }

    /// Add a header. Invalid names or values are skipped.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Merge headers, replacing any already present with the same name.
    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn force_ssl(mut self, force_ssl: bool) -> Self {
        self.force_ssl = force_ssl;
        self
    }

    /// Look up an encoded parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.payload
            .params()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The URL the request goes to, with the scheme switched to `https` when
    /// SSL is forced.
    pub fn effective_url(&self) -> Result<Url, HttpError> {
        let mut url = Url::parse(&self.url).map_err(|e| HttpError::InvalidUrl {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        if self.force_ssl && url.scheme() != "https" {
            url.set_scheme("https").map_err(|()| HttpError::InvalidUrl {
                url: self.url.clone(),
                message: "scheme cannot be changed to https".to_string(),
            })?;
        }

        Ok(url)
    }
}
