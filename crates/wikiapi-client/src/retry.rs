//! Retry budgets and backoff.

use std::time::Duration;
use wikiapi_common_config::RetryConfig;

pub use wikiapi_common_config::RetryPolicy;

/// Backoff for a maxlag refusal without a usable `Retry-After`.
pub const DEFAULT_LAG_DELAY: Duration = Duration::from_secs(5);

/// Retry behavior of a [`Site`](crate::Site).
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Budget for connection failures.
    pub connection: RetryPolicy,
    /// Fixed sleep between connection retries.
    pub connection_delay: Duration,
    /// Budget for maxlag refusals.
    pub lag: RetryPolicy,
    /// Used when a maxlag response has no valid `Retry-After`.
    pub default_lag_delay: Duration,
    /// Sleep before every request, including retries.
    pub pre_request_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            connection: RetryPolicy::UpTo(10),
            connection_delay: Duration::from_secs(5),
            lag: RetryPolicy::UpTo(50),
            default_lag_delay: DEFAULT_LAG_DELAY,
            pre_request_delay: Duration::ZERO,
        }
    }
}

impl From<&RetryConfig> for RetrySettings {
    fn from(config: &RetryConfig) -> Self {
        let defaults = Self::default();
        Self {
            connection: config.connection,
            connection_delay: Duration::try_from_secs_f64(config.connection_delay_secs)
                .unwrap_or(defaults.connection_delay),
            lag: config.lag,
            default_lag_delay: defaults.default_lag_delay,
            pre_request_delay: Duration::try_from_secs_f64(config.pre_request_delay_secs)
                .unwrap_or(defaults.pre_request_delay),
        }
    }
}

/// Retries spent on one failure class during one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    policy: RetryPolicy,
    used: u32,
}

impl RetryBudget {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, used: 0 }
    }

    /// Take one retry. Returns `false` once the policy is exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.policy.allows(self.used) {
            self.used = self.used.saturating_add(1);
            true
        } else {
            false
        }
    }

    /// Retries taken so far.
    pub fn used(&self) -> u32 {
        self.used
    }
}

/// Sleep before retrying a maxlag refusal.
///
/// Negative, non-finite or out-of-range `Retry-After` values fall back to
/// `default`.
pub fn lag_backoff(retry_after: Option<f64>, default: Duration) -> Duration {
    retry_after
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(default)
}
