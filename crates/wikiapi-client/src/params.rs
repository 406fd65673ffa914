//! Call parameters, protocol directives and request normalization.
//!
//! Callers describe a call as an action plus a [`Params`] map of loosely
//! typed values. [`prepare_call`] turns that into the string pairs that go on
//! the wire and decides the HTTP method and whether SSL is forced.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone};
use serde_json::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use wikiapi_common_http::header::HeaderMap;
use wikiapi_common_http::Method;

use crate::error::{Result, WikiError};

/// Wire format for timestamps. The API rejects `+00:00` offsets.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Actions that always go out as POST.
const POST_ACTIONS: &[&str] = &["login", "edit"];

/// A single parameter value before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Removes the parameter.
    Null,
    /// `true` becomes `"1"`, `false` removes the parameter.
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Must carry a zero UTC offset.
    DateTime(DateTime<FixedOffset>),
    /// Interpreted as UTC.
    NaiveDateTime(NaiveDateTime),
    /// Pipe-joined; elements that normalize to nothing are dropped.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Normalize to the wire string. `None` means the parameter is omitted.
    pub fn normalize(&self, name: &str) -> Result<Option<String>> {
        match self {
            ParamValue::Null | ParamValue::Bool(false) => Ok(None),
            ParamValue::Bool(true) => Ok(Some("1".to_string())),
            ParamValue::Int(n) => Ok(Some(n.to_string())),
            ParamValue::Float(f) => Ok(Some(f.to_string())),
            ParamValue::Str(s) => Ok(Some(s.clone())),
            ParamValue::DateTime(dt) => {
                if dt.offset().fix().local_minus_utc() != 0 {
                    return Err(WikiError::invalid_param(
                        name,
                        "datetime value has a non-UTC timezone",
                    ));
                }
                Ok(Some(dt.format(TIMESTAMP_FORMAT).to_string()))
            }
            ParamValue::NaiveDateTime(dt) => Ok(Some(dt.format(TIMESTAMP_FORMAT).to_string())),
            ParamValue::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(part) = item.normalize(name)? {
                        parts.push(part);
                    }
                }
                Ok(Some(parts.join("|")))
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Str(s.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

macro_rules! int_param {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(n: $t) -> Self {
                ParamValue::Int(i64::from(n))
            }
        })*
    };
}

int_param!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for ParamValue {
    fn from(n: u64) -> Self {
        i64::try_from(n)
            .map(ParamValue::Int)
            .unwrap_or_else(|_| ParamValue::Str(n.to_string()))
    }
}

impl From<usize> for ParamValue {
    fn from(n: usize) -> Self {
        ParamValue::from(n as u64)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for ParamValue {
    fn from(dt: DateTime<Tz>) -> Self {
        ParamValue::DateTime(dt.fixed_offset())
    }
}

impl From<NaiveDateTime> for ParamValue {
    fn from(dt: NaiveDateTime) -> Self {
        ParamValue::NaiveDateTime(dt)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<ParamValue>> From<&[T]> for ParamValue {
    fn from(items: &[T]) -> Self {
        ParamValue::List(items.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => ParamValue::Int(i),
                (None, Some(f)) if n.is_f64() => ParamValue::Float(f),
                _ => ParamValue::Str(n.to_string()),
            },
            Value::String(s) => ParamValue::Str(s),
            Value::Array(items) => ParamValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(_) => ParamValue::Str(value.to_string()),
        }
    }
}

/// Named call parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Copy every entry of `other` into `self`, replacing existing names.
    pub fn extend(&mut self, other: Params) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}

impl IntoIterator for Params {
    type Item = (String, ParamValue);
    type IntoIter = btree_map::IntoIter<String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build [`Params`] from `name => value` pairs.
///
/// ```
/// use wikiapi_client::params;
///
/// let p = params! { "list" => "allpages", "aplimit" => 5, "redirects" => true };
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut p = $crate::Params::new();
        $(p.set($name, $value);)+
        p
    }};
}

/// A protocol directive name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Post,
    Https,
    Ssl,
    Extras,
    NoLogin,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Post => "POST",
            Directive::Https => "HTTPS",
            Directive::Ssl => "SSL",
            Directive::Extras => "EXTRAS",
            Directive::NoLogin => "NO_LOGIN",
        }
    }
}

impl FromStr for Directive {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "POST" => Ok(Directive::Post),
            "HTTPS" => Ok(Directive::Https),
            "SSL" => Ok(Directive::Ssl),
            "EXTRAS" => Ok(Directive::Extras),
            "NO_LOGIN" => Ok(Directive::NoLogin),
            other => Err(WikiError::UnknownDirective(other.to_string())),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call transport options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extras {
    /// Merged over the site headers; these win.
    pub headers: HeaderMap,
    /// Replaces the site's request timeout for this call.
    pub timeout: Option<Duration>,
}

/// Client-side switches for one call. Never sent to the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    pub force_post: bool,
    pub force_ssl: bool,
    pub no_login: bool,
    pub extras: Option<Extras>,
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse directive names. Unknown names fail.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut directives = Self::new();
        for name in names {
            directives.set(name.as_ref().parse()?);
        }
        Ok(directives)
    }

    pub fn set(&mut self, directive: Directive) {
        match directive {
            Directive::Post => self.force_post = true,
            Directive::Https | Directive::Ssl => self.force_ssl = true,
            Directive::NoLogin => self.no_login = true,
            Directive::Extras => {
                self.extras.get_or_insert_with(Extras::default);
            }
        }
    }

    pub fn post(mut self) -> Self {
        self.force_post = true;
        self
    }

    pub fn https(mut self) -> Self {
        self.force_ssl = true;
        self
    }

    pub fn no_login(mut self) -> Self {
        self.no_login = true;
        self
    }

    pub fn extras(mut self, extras: Extras) -> Self {
        self.extras = Some(extras);
        self
    }
}

/// Site-level settings that shape every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSettings {
    /// Sent as `maxlag` unless the caller provides one.
    pub maxlag: Option<u32>,
    /// Estimated size above which GET switches to POST.
    pub auto_post_min_size: usize,
    /// Never force SSL.
    pub no_ssl: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            maxlag: Some(30),
            auto_post_min_size: 2000,
            no_ssl: false,
        }
    }
}

/// A normalized call, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub method: Method,
    pub params: Vec<(String, String)>,
    pub force_ssl: bool,
    pub extras: Option<Extras>,
}

impl PreparedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Normalize an action call into wire parameters.
pub fn prepare_call(
    action: &str,
    params: &Params,
    directives: &Directives,
    settings: &RequestSettings,
) -> Result<PreparedCall> {
    let mut wire = BTreeMap::new();
    for (name, value) in params {
        if let Some(value) = value.normalize(name)? {
            wire.insert(name.clone(), value);
        }
    }

    wire.insert("action".to_string(), action.to_string());
    wire.insert("format".to_string(), "json".to_string());
    wire.entry("formatversion".to_string())
        .or_insert_with(|| "2".to_string());
    if let Some(maxlag) = settings.maxlag {
        wire.entry("maxlag".to_string())
            .or_insert_with(|| maxlag.to_string());
    }

    let estimated_size: usize = wire.iter().map(|(k, v)| k.len() + v.len() + 2).sum();

    let method = if directives.force_post
        || POST_ACTIONS.contains(&action)
        || estimated_size > settings.auto_post_min_size
    {
        Method::Post
    } else {
        Method::Get
    };

    Ok(PreparedCall {
        method,
        params: wire.into_iter().collect(),
        force_ssl: !settings.no_ssl && (action == "login" || directives.force_ssl),
        extras: directives.extras.clone(),
    })
}
