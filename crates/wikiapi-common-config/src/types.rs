//! Configuration types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiApiConfig {
    /// Target site and request shaping.
    pub site: SiteConfig,
    /// Retry budgets and delays.
    pub retry: RetryConfig,
    /// Transport tuning.
    pub http: HttpSettings,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Target site configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Full URL of the `api.php` endpoint.
    pub url: String,
    /// User agent override. Derived from the executable name when unset.
    pub user_agent: Option<String>,
    /// Replication lag ceiling sent as `maxlag`. `None` omits the parameter.
    pub maxlag: Option<u32>,
    /// Estimated request size above which GET switches to POST.
    pub auto_post_min_size: usize,
    /// Never force HTTPS, even for login.
    pub no_ssl: bool,
    /// Credentials used at startup.
    pub login: Option<LoginConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user_agent: None,
            maxlag: Some(30),
            auto_post_min_size: 2000,
            no_ssl: false,
            login: None,
        }
    }
}

/// Login credentials.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginConfig {
    pub user: String,
    pub password: String,
    /// Defer the login until the first call that needs it.
    #[serde(default = "default_on_demand")]
    pub on_demand: bool,
}

fn default_on_demand() -> bool {
    true
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("on_demand", &self.on_demand)
            .finish()
    }
}

/// How many times a failure class may be retried.
///
/// In YAML this is an integer (`0` meaning never) or one of the words
/// `never` and `unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RetryPolicyRepr", into = "RetryPolicyRepr")]
pub enum RetryPolicy {
    Never,
    UpTo(u32),
    Unbounded,
}

impl RetryPolicy {
    /// Whether another retry is allowed after `used` retries.
    pub fn allows(&self, used: u32) -> bool {
        match self {
            RetryPolicy::Never => false,
            RetryPolicy::UpTo(limit) => used < *limit,
            RetryPolicy::Unbounded => true,
        }
    }
}

impl From<u32> for RetryPolicy {
    fn from(count: u32) -> Self {
        match count {
            0 => RetryPolicy::Never,
            n => RetryPolicy::UpTo(n),
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::Never => f.write_str("never"),
            RetryPolicy::UpTo(n) => write!(f, "{n}"),
            RetryPolicy::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RetryPolicyRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<RetryPolicyRepr> for RetryPolicy {
    type Error = String;

    fn try_from(repr: RetryPolicyRepr) -> Result<Self, Self::Error> {
        match repr {
            RetryPolicyRepr::Count(n) => Ok(RetryPolicy::from(n)),
            RetryPolicyRepr::Word(word) => match word.to_lowercase().as_str() {
                "never" => Ok(RetryPolicy::Never),
                "unbounded" => Ok(RetryPolicy::Unbounded),
                other => Err(format!(
                    "invalid retry policy '{other}', expected a count, 'never' or 'unbounded'"
                )),
            },
        }
    }
}

impl From<RetryPolicy> for RetryPolicyRepr {
    fn from(policy: RetryPolicy) -> Self {
        match policy {
            RetryPolicy::Never => RetryPolicyRepr::Count(0),
            RetryPolicy::UpTo(n) => RetryPolicyRepr::Count(n),
            RetryPolicy::Unbounded => RetryPolicyRepr::Word("unbounded".to_string()),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Budget for connection failures.
    pub connection: RetryPolicy,
    /// Fixed delay between connection retries (seconds).
    pub connection_delay_secs: f64,
    /// Budget for maxlag refusals.
    pub lag: RetryPolicy,
    /// Delay before every request (seconds).
    pub pre_request_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            connection: RetryPolicy::UpTo(10),
            connection_delay_secs: 5.0,
            lag: RetryPolicy::UpTo(50),
            pre_request_delay_secs: 0.0,
        }
    }
}

/// Transport tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub pool_max_idle_per_host: usize,
    pub gzip: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: Some(60),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// `pretty`, `compact` or `json`.
    pub format: String,
    /// Append logs to this file in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}
