//! HTTP mocking using wiremock.

use serde::Serialize;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Wiremock server wrapper with convenience methods for an `api.php` endpoint.
pub struct TestHttpServer {
    server: MockServer,
}

impl TestHttpServer {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the server.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// URL for a specific path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Answer GET requests to `endpoint` with JSON.
    pub async fn get_json<T: Serialize>(&self, endpoint: &str, response: &T) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Answer POST requests to `endpoint` with JSON.
    pub async fn post_json<T: Serialize>(&self, endpoint: &str, response: &T) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Answer GET requests carrying `action=<action>` with JSON.
    pub async fn action_json<T: Serialize>(&self, endpoint: &str, action: &str, response: &T) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("action", action))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Answer every request to `endpoint` with a status and plain-text body.
    pub async fn status(&self, endpoint: &str, status: u16, body: &str) {
        Mock::given(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Answer with JSON after a delay.
    pub async fn with_latency<T: Serialize>(&self, endpoint: &str, response: &T, latency: Duration) {
        Mock::given(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(response)
                    .set_delay(latency),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve the given responses once each, in order.
    pub async fn sequence(&self, endpoint: &str, responses: Vec<ResponseTemplate>) {
        for (i, response) in responses.into_iter().enumerate() {
            Mock::given(path(endpoint))
                .respond_with(response)
                .up_to_n_times(1)
                .with_priority(100 - i as u8)
                .mount(&self.server)
                .await;
        }
    }

    /// Assert how many requests hit `endpoint`.
    pub async fn verify_received(&self, endpoint: &str, times: u64) {
        let received = self.received_requests().await;
        let count = received.iter().filter(|r| r.url.path() == endpoint).count() as u64;
        assert_eq!(
            count, times,
            "Expected {} requests to {}, got {}",
            times, endpoint, count
        );
    }

    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Drop all mounted mocks and recorded requests.
    pub async fn reset(&self) {
        self.server.reset().await;
    }
}

/// Response templates for the wiremock server.
pub mod templates {
    use super::*;

    pub fn json<T: Serialize>(body: &T) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(body)
    }

    /// A maxlag refusal with a `Retry-After` header.
    pub fn maxlag(lag: f64, retry_after: u32) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("Retry-After", retry_after.to_string())
            .insert_header("X-Database-Lag", format!("{}", lag as i64))
            .set_body_json(crate::responses::maxlag(lag))
    }

    pub fn server_error() -> ResponseTemplate {
        ResponseTemplate::new(500).set_body_string("Internal server error")
    }
}
