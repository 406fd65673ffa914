//! Test utilities for wikiapi crates.
//!
//! - [`MockTransport`] replays scripted responses and records what was sent.
//! - [`responses`] builds the JSON envelopes the wiki API returns.
//! - [`TestHttpServer`] wraps a wiremock server for tests that need real HTTP.
//! - [`DisconnectingServer`] drops every connection it accepts.
//! - [`capture_logs`] records tracing events as JSON for assertions.

pub mod capture;
pub mod disconnect;
pub mod mock_transport;
pub mod responses;
pub mod server;

pub use capture::{capture_logs, CapturedLogs};
pub use disconnect::DisconnectingServer;
pub use mock_transport::MockTransport;
pub use server::{templates, TestHttpServer};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,wikiapi=debug"));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}
