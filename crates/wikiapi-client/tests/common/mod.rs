#![allow(dead_code)]

use std::time::Duration;
use wikiapi_client::{RetryPolicy, Site};
use wikiapi_test_utils::MockTransport;

pub const API_URL: &str = "https://test.example/w/api.php";

/// A site over `mock` with the default retry settings.
pub fn site(mock: &MockTransport) -> Site {
    wikiapi_test_utils::init_tracing();
    Site::builder(API_URL)
        .transport(mock.clone())
        .build()
        .expect("site")
}

/// A site with explicit retry budgets.
pub fn site_with_budgets(
    mock: &MockTransport,
    connection: RetryPolicy,
    lag: RetryPolicy,
) -> Site {
    wikiapi_test_utils::init_tracing();
    Site::builder(API_URL)
        .transport(mock.clone())
        .connection_retries(connection)
        .lag_retries(lag)
        .connection_delay(Duration::from_secs(5))
        .build()
        .expect("site")
}
