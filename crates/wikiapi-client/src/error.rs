//! Client error types.

use serde_json::Value;
use thiserror::Error;
use wikiapi_common_http::{HttpError, ResponseError};

/// Errors returned by [`Site`](crate::Site) operations.
#[derive(Debug, Error)]
pub enum WikiError {
    /// The transport failed and was not (or no longer) retried.
    #[error("transport error: {0}")]
    Transport(#[from] HttpError),

    /// The server answered with an `error` object or a non-success status.
    /// `payload` is the server's `error` object, or the status and body.
    #[error("{message}: {payload}")]
    Api { message: String, payload: Value },

    /// A response lacked a field the protocol requires.
    #[error("{message}")]
    Protocol { message: String, payload: Value },

    #[error("login failed: {payload}")]
    Authentication { payload: Value },

    /// Pages that changed while a paged query was running.
    #[error("pages modified during iteration: {ids:?}")]
    PagesModified { ids: Vec<u64> },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("unknown directive '{0}'")]
    UnknownDirective(String),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WikiError {
    pub(crate) fn api(message: impl Into<String>, payload: Value) -> Self {
        WikiError::Api {
            message: message.into(),
            payload,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>, payload: Value) -> Self {
        WikiError::Protocol {
            message: message.into(),
            payload,
        }
    }

    pub(crate) fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        WikiError::InvalidParam {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The server error code, for errors that carry one.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            WikiError::Api { payload, .. } => payload.get("code").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Whether this is a maxlag refusal that outlasted the retry budget.
    pub fn is_maxlag(&self) -> bool {
        self.api_code() == Some("maxlag")
    }
}

pub type Result<T, E = WikiError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_code() {
        let err = WikiError::api(
            "Server API Error",
            json!({"code": "maxlag", "lag": 7}),
        );
        assert_eq!(err.api_code(), Some("maxlag"));
        assert!(err.is_maxlag());
        assert!(err.to_string().starts_with("Server API Error: "));

        let other = WikiError::PagesModified { ids: vec![3, 1] };
        assert_eq!(other.api_code(), None);
        assert_eq!(other.to_string(), "pages modified during iteration: [3, 1]");
    }
}
