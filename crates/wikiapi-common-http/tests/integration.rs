use serde_json::json;
use std::time::Duration;
use wikiapi_common_http::{parse_json, HttpClient, HttpConfig, HttpError, HttpRequest, Method, Transport};
use wikiapi_test_utils::{templates, DisconnectingServer, TestHttpServer};

#[tokio::test]
async fn test_get_sends_query_string() {
    let server = TestHttpServer::start().await;
    server
        .action_json("/w/api.php", "query", &json!({"query": {"general": {"sitename": "Test"}}}))
        .await;

    let client = HttpClient::new().expect("client");
    let request = HttpRequest::new(Method::Get, server.url_for("/w/api.php")).params(vec![
        ("action".into(), "query".into()),
        ("meta".into(), "siteinfo".into()),
    ]);

    let response = client.send(request).await.expect("response");
    assert!(response.is_success());
    let body = parse_json(&response).expect("json");
    assert_eq!(body["query"]["general"]["sitename"], "Test");

    let received = server.received_requests().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method.as_str(), "GET");
    assert!(received[0].url.query().unwrap_or_default().contains("meta=siteinfo"));
}

#[tokio::test]
async fn test_post_sends_form_body() {
    let server = TestHttpServer::start().await;
    server.post_json("/w/api.php", &json!({"edit": {"result": "Success"}})).await;

    let client = HttpClient::new().expect("client");
    let request = HttpRequest::new(Method::Post, server.url_for("/w/api.php"))
        .params(vec![
            ("action".into(), "edit".into()),
            ("text".into(), "a b&c".into()),
        ])
        .header("User-Agent", "integration-test/1.0");

    let response = client.send(request).await.expect("response");
    assert_eq!(parse_json(&response).unwrap()["edit"]["result"], "Success");

    let received = server.received_requests().await;
    let body = String::from_utf8_lossy(&received[0].body).into_owned();
    assert!(body.contains("action=edit"));
    assert!(body.contains("text=a+b%26c"));
    assert_eq!(
        received[0].headers.get("user-agent").unwrap().to_str().unwrap(),
        "integration-test/1.0"
    );
}

#[tokio::test]
async fn test_error_status_is_returned_as_response() {
    let server = TestHttpServer::start().await;
    server.status("/w/api.php", 503, "backend down").await;

    let client = HttpClient::new().expect("client");
    let response = client
        .send(HttpRequest::new(Method::Get, server.url_for("/w/api.php")))
        .await
        .expect("a non-2xx status is still a response");

    assert_eq!(response.status, 503);
    assert_eq!(response.text(), "backend down");
}

#[tokio::test]
async fn test_maxlag_headers_are_exposed() {
    let server = TestHttpServer::start().await;
    server
        .sequence("/w/api.php", vec![templates::maxlag(4.0, 2)])
        .await;

    let client = HttpClient::new().expect("client");
    let response = client
        .send(HttpRequest::new(Method::Get, server.url_for("/w/api.php")))
        .await
        .expect("response");

    assert_eq!(response.retry_after(), Some(2.0));
    assert_eq!(response.header("x-database-lag"), Some("4"));
    assert_eq!(parse_json(&response).unwrap()["error"]["code"], "maxlag");
}

#[tokio::test]
async fn test_refused_connection_is_classified() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = HttpClient::new().expect("client");
    let error = client
        .send(HttpRequest::new(Method::Get, format!("http://{addr}/w/api.php")))
        .await
        .unwrap_err();

    assert!(error.is_connection(), "unexpected error: {error:?}");
}

#[tokio::test]
async fn test_dropped_connection_is_classified() {
    let server = DisconnectingServer::start().await;

    let client = HttpClient::new().expect("client");
    let error = client
        .send(HttpRequest::new(Method::Get, server.url()))
        .await
        .unwrap_err();

    assert!(error.is_connection(), "unexpected error: {error:?}");
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_truncated_body_is_classified() {
    let server = DisconnectingServer::start_with_partial_response(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"query\":",
    )
    .await;

    let client = HttpClient::new().expect("client");
    let error = client
        .send(HttpRequest::new(Method::Get, server.url()))
        .await
        .unwrap_err();

    assert!(error.is_connection(), "unexpected error: {error:?}");
}

#[tokio::test]
async fn test_request_timeout() {
    let server = TestHttpServer::start().await;
    server
        .with_latency("/w/api.php", &json!({}), Duration::from_secs(2))
        .await;

    let client = HttpClient::new().expect("client");
    let error = client
        .send(
            HttpRequest::new(Method::Get, server.url_for("/w/api.php"))
                .timeout(Some(Duration::from_millis(100))),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, HttpError::Timeout));
}

#[test]
fn test_custom_config_builds() {
    let config = HttpConfig {
        connect_timeout: Duration::from_secs(3),
        user_agent: "custom/0.1".to_string(),
        pool_max_idle_per_host: 2,
        gzip: false,
    };
    assert!(HttpClient::with_config(config).is_ok());
}
