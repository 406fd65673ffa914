//! Environment variable handling.

use crate::types::{LoginConfig, WikiApiConfig};
use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    // Site
    pub const WIKIAPI_URL: &str = "WIKIAPI_URL";
    pub const WIKIAPI_USER: &str = "WIKIAPI_USER";
    pub const WIKIAPI_PASSWORD: &str = "WIKIAPI_PASSWORD";
    pub const WIKIAPI_MAXLAG: &str = "WIKIAPI_MAXLAG";

    // Configuration
    pub const WIKIAPI_CONFIG_PATH: &str = "WIKIAPI_CONFIG_PATH";
    pub const WIKIAPI_ENV: &str = "WIKIAPI_ENV";

    // Development
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Environment configuration.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from .env files.
    pub fn init() -> Result<Self, EnvError> {
        // Later files override earlier ones
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(env) = env::var(vars::WIKIAPI_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", env));
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var)
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Get an integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: "expected integer".to_string(),
            }),
            Err(_) => Ok(None),
        }
    }
}

/// Overlay `WIKIAPI_*` variables onto a loaded configuration.
///
/// `WIKIAPI_USER` and `WIKIAPI_PASSWORD` replace the login section only when
/// both are set. `WIKIAPI_MAXLAG=0` disables the maxlag parameter.
pub fn apply_env_overrides(config: &mut WikiApiConfig) -> Result<(), EnvError> {
    if let Some(url) = Environment::get(vars::WIKIAPI_URL) {
        config.site.url = url;
    }

    if let Some(maxlag) = Environment::get_int::<u32>(vars::WIKIAPI_MAXLAG)? {
        config.site.maxlag = (maxlag > 0).then_some(maxlag);
    }

    if let (Some(user), Some(password)) = (
        Environment::get(vars::WIKIAPI_USER),
        Environment::get(vars::WIKIAPI_PASSWORD),
    ) {
        let on_demand = config.site.login.as_ref().map_or(true, |l| l.on_demand);
        config.site.login = Some(LoginConfig {
            user,
            password,
            on_demand,
        });
    }

    Ok(())
}
