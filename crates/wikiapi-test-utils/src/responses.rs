//! Builders for wiki API response envelopes.

use serde_json::{json, Value};
use wikiapi_common_http::HttpResponse;

/// A `maxlag` refusal body.
pub fn maxlag(lag: f64) -> Value {
    json!({
        "error": {
            "code": "maxlag",
            "info": format!("Waiting for a database server: {} seconds lagged.", lag),
            "host": "db1001",
            "lag": lag,
            "type": "db",
        }
    })
}

/// A `maxlag` refusal with `Retry-After` and `X-Database-Lag` headers.
pub fn maxlag_response(lag: f64, retry_after: &str) -> HttpResponse {
    HttpResponse::json(&maxlag(lag))
        .with_header("Retry-After", retry_after)
        .with_header("X-Database-Lag", &format!("{}", lag as i64))
}

/// A generic API error body.
pub fn api_error(code: &str, info: &str) -> Value {
    json!({ "error": { "code": code, "info": info } })
}

/// A `query` result, optionally followed by a continuation object.
pub fn query(result: Value, cont: Option<Value>) -> Value {
    let mut body = json!({ "batchcomplete": true, "query": result });
    if let Some(cont) = cont {
        body["continue"] = cont;
        body["batchcomplete"] = json!(false);
    }
    body
}

/// A `query` result holding the given pages.
pub fn query_pages(pages: Vec<Value>, cont: Option<Value>) -> Value {
    query(json!({ "pages": pages }), cont)
}

/// A `meta=tokens` reply for a single token type.
pub fn token(kind: &str, value: &str) -> Value {
    let mut tokens = serde_json::Map::new();
    tokens.insert(format!("{kind}token"), json!(value));
    query(json!({ "tokens": tokens }), None)
}

/// An `action=login` reply.
pub fn login(result: &str) -> Value {
    json!({ "login": { "result": result, "lguserid": 42, "lgusername": "Bot" } })
}

/// A `meta=userinfo` reply with the given rights.
pub fn userinfo(rights: &[&str]) -> Value {
    query(
        json!({ "userinfo": { "id": 42, "name": "Bot", "rights": rights } }),
        None,
    )
}
