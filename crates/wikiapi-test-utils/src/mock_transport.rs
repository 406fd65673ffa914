//! Scripted in-memory transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use wikiapi_common_http::{HttpError, HttpRequest, HttpResponse, Transport};

enum Reply {
    Response(HttpResponse),
    Error(HttpError),
}

#[derive(Default)]
struct State {
    replies: VecDeque<Reply>,
    requests: Vec<HttpRequest>,
}

/// A [`Transport`] that answers from a queue and records every request.
///
/// Cloning shares the queue, so a test can keep one handle while the site
/// under test owns another. Running out of scripted replies panics.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `200 OK` reply with the given JSON body.
    pub fn push_json(&self, body: Value) -> &Self {
        self.push_response(HttpResponse::json(&body))
    }

    /// Queue an arbitrary response.
    pub fn push_response(&self, response: HttpResponse) -> &Self {
        self.state.lock().replies.push_back(Reply::Response(response));
        self
    }

    /// Queue a connection-level failure.
    pub fn push_connection_failure(&self) -> &Self {
        self.push_error(HttpError::Connection("connection refused".into()))
    }

    /// Queue any transport error.
    pub fn push_error(&self, error: HttpError) -> &Self {
        self.state.lock().replies.push_back(Reply::Error(error));
        self
    }

    /// All requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.state.lock().requests.last().cloned()
    }

    /// Replies still waiting to be served.
    pub fn remaining(&self) -> usize {
        self.state.lock().replies.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut state = self.state.lock();
        let description = format!("{} {}", request.method, request.url);
        tracing::trace!(request = %description, "mock transport received request");
        state.requests.push(request);

        match state.replies.pop_front() {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Error(error)) => Err(error),
            None => panic!("no scripted reply left for {description}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wikiapi_common_http::Method;

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let mock = MockTransport::new();
        mock.push_json(json!({"n": 1})).push_connection_failure();

        let request = HttpRequest::new(Method::Get, "https://w.example/api.php");
        let first = mock.send(request.clone()).await.unwrap();
        assert_eq!(first.text(), r#"{"n":1}"#);

        let second = mock.send(request).await.unwrap_err();
        assert!(second.is_connection());

        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "no scripted reply left")]
    async fn test_panics_when_exhausted() {
        let mock = MockTransport::new();
        let _ = mock
            .send(HttpRequest::new(Method::Get, "https://w.example/api.php"))
            .await;
    }
}
