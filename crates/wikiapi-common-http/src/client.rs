//! reqwest-backed transport.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use crate::request::{HttpRequest, Payload};
use crate::response::HttpResponse;
use crate::transport::Transport;

/// Boxed error source for failures that don't come from reqwest directly.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// User agent string sent when a request carries none.
    pub user_agent: String,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("wikiapi/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// Build a configured reqwest client.
pub fn build_client(config: HttpConfig) -> Result<Client, HttpError> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host);

    if config.gzip {
        builder = builder.gzip(true);
    }

    builder.build().map_err(HttpError::ClientBuild)
}

/// HTTP errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The server could not be reached or dropped the connection before a
    /// full response arrived. The only retryable kind.
    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl HttpError {
    /// Whether this failure happened before any response was received.
    pub fn is_connection(&self) -> bool {
        matches!(self, HttpError::Connection(_))
    }

    /// Classify a failure while reading the response body.
    pub fn from_body(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else if is_disconnect(&e) {
            HttpError::Connection(Box::new(e))
        } else {
            HttpError::Body(e)
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            HttpError::Connection(Box::new(e))
        } else if e.is_timeout() {
            HttpError::Timeout
        } else if is_disconnect(&e) {
            HttpError::Connection(Box::new(e))
        } else {
            HttpError::Request(e)
        }
    }
}

/// Whether anything in the error chain says the peer went away: a hyper
/// incomplete/closed/canceled message or a reset, aborted or truncated socket.
fn is_disconnect(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(e) = err.downcast_ref::<hyper::Error>() {
            if e.is_incomplete_message() || e.is_closed() || e.is_canceled() {
                return true;
            }
        }
        if let Some(e) = err.downcast_ref::<io::Error>() {
            if matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

/// Transport backed by a pooled reqwest client.
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default config.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a new HTTP client with custom config.
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        let inner = build_client(config)?;
        Ok(Self { inner })
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.effective_url()?;
        tracing::debug!(method = %request.method, url = %url, "sending request");

        let mut builder = match &request.payload {
            Payload::Query(params) => self.inner.get(url.clone()).query(params),
            Payload::Form(params) => self.inner.post(url.clone()).form(params),
        };
        builder = builder.headers(request.headers);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(HttpError::from)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(HttpError::from_body)?;

        tracing::debug!(status, bytes = body.len(), url = %url, "received response");
        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("wikiapi/"));
        assert_eq!(config.pool_max_idle_per_host, 10);
        assert!(config.gzip);
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_custom_config() {
        let config = HttpConfig {
            connect_timeout: Duration::from_secs(5),
            user_agent: "test-agent".to_string(),
            pool_max_idle_per_host: 5,
            gzip: false,
        };

        let client = HttpClient::with_config(config);
        assert!(client.is_ok());
    }

    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request aborted")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_disconnect_found_in_source_chain() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
        ] {
            let error = Wrapped(io::Error::new(kind, "peer went away"));
            assert!(is_disconnect(&error), "{kind:?}");
        }

        let other = Wrapped(io::Error::new(io::ErrorKind::InvalidData, "bad"));
        assert!(!is_disconnect(&other));
    }

    #[test]
    fn test_connection_error_classification() {
        let err = HttpError::Connection("connection refused".into());
        assert!(err.is_connection());
        assert!(err.to_string().contains("connection refused"));
        assert!(!HttpError::Timeout.is_connection());
    }
}
