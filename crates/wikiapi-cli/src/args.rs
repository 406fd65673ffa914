//! Argument value parsers.

use std::time::Duration;

use wikiapi_client::Params;

/// Parse a `key=value` pair. The value may itself contain `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value pair: {s}"))?;
    if key.is_empty() {
        return Err(format!("missing parameter name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse a duration given in (possibly fractional) seconds.
pub fn parse_duration_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {s}"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid duration: {s}"))
}

/// Collect parsed pairs into call parameters. Later pairs replace earlier ones.
pub fn to_params(pairs: &[(String, String)]) -> Params {
    pairs
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}
