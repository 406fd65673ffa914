//! Configuration file loading and parsing.

use crate::types::WikiApiConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding the config file, relative to the project directory.
pub const CONFIG_DIR: &str = ".wikiapi";
/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the config file this loader reads.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load `.wikiapi/config.yaml`, falling back to defaults when absent.
    pub fn load(&self) -> Result<WikiApiConfig, ConfigError> {
        let config_path = self.config_path();

        if !config_path.exists() {
            return Ok(WikiApiConfig::default());
        }

        self.load_from(&config_path)
    }

    /// Load an explicit config file. A missing file is an error.
    pub fn load_from(&self, path: impl AsRef<Path>) -> Result<WikiApiConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let expanded = self.expand_env_vars(&contents)?;

        let config: WikiApiConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        self.validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").map_err(|e| {
            ConfigError::ParseError {
                line: None,
                message: e.to_string(),
            }
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    /// Validate configuration values.
    pub fn validate(&self, config: &WikiApiConfig) -> Result<(), ConfigError> {
        let url = config.site.url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                message: format!("site.url must start with http:// or https://, got '{url}'"),
            });
        }

        if config.site.auto_post_min_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "site.auto_post_min_size must be greater than 0".to_string(),
            });
        }

        for (name, value) in [
            ("retry.connection_delay_secs", config.retry.connection_delay_secs),
            ("retry.pre_request_delay_secs", config.retry.pre_request_delay_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError {
                    message: format!("{name} must be a non-negative number of seconds"),
                });
            }
        }

        if let Some(login) = &config.site.login {
            if login.user.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "site.login.user must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Save configuration to `.wikiapi/config.yaml`.
    pub fn save(&self, config: &WikiApiConfig) -> Result<(), ConfigError> {
        let config_dir = self.base_path.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(config_dir.join(CONFIG_FILE), yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LoginConfig, RetryPolicy};
    use std::fs;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) {
        let config_dir = dir.join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn test_load_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config, WikiApiConfig::default());
        assert_eq!(config.site.maxlag, Some(30));
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
site:
  url: https://en.wikipedia.org/w/api.php
  maxlag: 5
  login:
    user: ExampleBot
    password: hunter2
retry:
  connection: never
  lag: unbounded
  connection_delay_secs: 1.5
http:
  request_timeout_secs: ~
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();

        assert_eq!(config.site.url, "https://en.wikipedia.org/w/api.php");
        assert_eq!(config.site.maxlag, Some(5));
        let login = config.site.login.unwrap();
        assert_eq!(login.user, "ExampleBot");
        assert!(login.on_demand);
        assert_eq!(config.retry.connection, RetryPolicy::Never);
        assert_eq!(config.retry.lag, RetryPolicy::Unbounded);
        assert_eq!(config.retry.connection_delay_secs, 1.5);
        assert_eq!(config.http.request_timeout_secs, None);

        // Unspecified values keep their defaults
        assert_eq!(config.site.auto_post_min_size, 2000);
        assert_eq!(config.retry.pre_request_delay_secs, 0.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_missing_path() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let result = loader.load_from(dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("WIKIAPI_TEST_EXPAND", "test_value");
        let loader = ConfigLoader::new(".");
        let result = loader.expand_env_vars("key: ${WIKIAPI_TEST_EXPAND}").unwrap();
        assert_eq!(result, "key: test_value");
        std::env::remove_var("WIKIAPI_TEST_EXPAND");
    }

    #[test]
    fn test_env_var_default() {
        let loader = ConfigLoader::new(".");
        let result = loader
            .expand_env_vars("key: ${WIKIAPI_NONEXISTENT:-default}")
            .unwrap();
        assert_eq!(result, "key: default");
    }

    #[test]
    fn test_env_var_missing_error() {
        let loader = ConfigLoader::new(".");
        match loader.expand_env_vars("key: ${WIKIAPI_MISSING_VAR}") {
            Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "WIKIAPI_MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_var_expansion_in_config() {
        std::env::set_var("WIKIAPI_TEST_BOT_PASSWORD", "s3cret");

        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
site:
  url: ${WIKIAPI_TEST_SITE:-https://test.example/w/api.php}
  login:
    user: Bot
    password: ${WIKIAPI_TEST_BOT_PASSWORD}
    on_demand: false
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.site.url, "https://test.example/w/api.php");
        let login = config.site.login.unwrap();
        assert_eq!(login.password, "s3cret");
        assert!(!login.on_demand);

        std::env::remove_var("WIKIAPI_TEST_BOT_PASSWORD");
    }

    #[test]
    fn test_validation_errors() {
        let loader = ConfigLoader::new(".");

        let mut config = WikiApiConfig::default();
        config.site.url = "ftp://w.example/api.php".to_string();
        match loader.validate(&config) {
            Err(ConfigError::ValidationError { message }) => assert!(message.contains("site.url")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        let mut config = WikiApiConfig::default();
        config.retry.connection_delay_secs = -1.0;
        match loader.validate(&config) {
            Err(ConfigError::ValidationError { message }) => {
                assert!(message.contains("connection_delay_secs"))
            }
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        let mut config = WikiApiConfig::default();
        config.retry.pre_request_delay_secs = f64::NAN;
        assert!(loader.validate(&config).is_err());

        let mut config = WikiApiConfig::default();
        config.site.auto_post_min_size = 0;
        assert!(loader.validate(&config).is_err());

        let mut config = WikiApiConfig::default();
        config.site.login = Some(LoginConfig {
            user: String::new(),
            password: "x".to_string(),
            on_demand: true,
        });
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_invalid_retry_policy_word() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), "retry:\n  lag: sometimes\n");
        let result = ConfigLoader::new(dir.path()).load();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
site:
  url: https://w.example/api.php
  invalid_yaml: [unclosed
"#,
        );

        match ConfigLoader::new(dir.path()).load() {
            Err(ConfigError::ParseError { line, .. }) => assert!(line.is_some()),
            other => panic!("Expected ParseError with line number, got {other:?}"),
        }
    }

    #[test]
    fn test_save_config() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());

        let mut config = WikiApiConfig::default();
        config.site.url = "https://w.example/api.php".to_string();
        config.retry.lag = RetryPolicy::Unbounded;
        config.retry.connection = RetryPolicy::Never;

        loader.save(&config).unwrap();
        assert!(loader.config_path().exists());

        let loaded = loader.load().unwrap();
        assert_eq!(loaded, config);
    }
}
