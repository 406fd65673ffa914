//! Classification of decoded API responses.

use serde_json::{json, Value};
use tracing::Level;
use wikiapi_common_http::HttpResponse;

use crate::error::{Result, WikiError};

/// What a decoded response asks the retry engine to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification<'a> {
    /// No `error`, or an error the engine does not retry.
    Final,
    /// A `maxlag` refusal, with the server's reported lag when present.
    Maxlag { lag: Option<&'a Value> },
}

/// Classify a decoded body.
pub fn classify(body: &Value) -> Classification<'_> {
    match body.get("error") {
        Some(error) if error.get("code").and_then(Value::as_str) == Some("maxlag") => {
            Classification::Maxlag {
                lag: error.get("lag"),
            }
        }
        _ => Classification::Final,
    }
}

/// Fail on a non-success HTTP status, keeping the body for diagnosis.
pub fn check_status(response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    let payload = match serde_json::from_slice::<Value>(&response.body) {
        Ok(body) => json!({ "status_code": response.status, "json_body": body }),
        Err(_) => json!({ "status_code": response.status, "text_body": response.text() }),
    };
    Err(WikiError::api("Call failed", payload))
}

/// Turn a final body into the call result.
///
/// A top-level `error` fails the call. Warnings are logged and the body is
/// returned unchanged.
pub fn resolve(body: Value) -> Result<Value> {
    if let Some(error) = body.get("error") {
        return Err(WikiError::api("Server API Error", error.clone()));
    }

    if let Some(warnings) = body.get("warnings") {
        if tracing::enabled!(Level::WARN) {
            let message = format_warnings(warnings);
            tracing::warn!(code = "server-warnings", warnings = %warnings, "{message}");
        }
    }

    Ok(body)
}

/// Render a `warnings` object one source per line, `main` first and the
/// rest by name.
pub fn format_warnings(warnings: &Value) -> String {
    let Some(sources) = warnings.as_object() else {
        return render(warnings);
    };

    let mut entries: Vec<(&String, &Value)> = sources.iter().collect();
    entries.sort_by(|(a, _), (b, _)| {
        (a.as_str() != "main", a.as_str()).cmp(&(b.as_str() != "main", b.as_str()))
    });

    entries
        .into_iter()
        .map(|(_, value)| render(value.get("warnings").unwrap_or(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
