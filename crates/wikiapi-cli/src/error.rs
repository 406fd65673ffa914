//! CLI error type and exit code mapping.

use thiserror::Error;
use wikiapi_client::WikiError;
use wikiapi_common_config::{ConfigError, EnvError};
use wikiapi_common_log::LogError;

use crate::Exit;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("invalid argument: {0}")]
    Usage(String),

    #[error(transparent)]
    Wiki(#[from] WikiError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> Exit {
        match self {
            Self::Config(_) | Self::Env(_) | Self::Log(_) => Exit::ConfigError,
            Self::Usage(_) => Exit::ValidationError,
            Self::Output(_) | Self::Encode(_) => Exit::IoError,
            Self::Wiki(e) => match e {
                WikiError::Transport(_) => Exit::NetworkError,
                WikiError::Authentication { .. } => Exit::AuthError,
                WikiError::Config(_) => Exit::ConfigError,
                WikiError::InvalidParam { .. } | WikiError::UnknownDirective(_) => {
                    Exit::ValidationError
                }
                _ => Exit::GeneralError,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wikiapi_common_http::HttpError;

    fn code(error: CliError) -> u8 {
        error.exit_code() as u8
    }

    #[test]
    fn test_exit_codes_by_class() {
        assert_eq!(code(CliError::Usage("x".into())), 5);
        assert_eq!(
            code(CliError::Wiki(WikiError::Transport(HttpError::Timeout))),
            4
        );
        assert_eq!(
            code(CliError::Wiki(WikiError::Authentication {
                payload: json!({"result": "Failed"})
            })),
            6
        );
        assert_eq!(
            code(CliError::Wiki(WikiError::PagesModified { ids: vec![1] })),
            1
        );
        assert_eq!(
            code(CliError::Config(ConfigError::ValidationError {
                message: "bad".into()
            })),
            2
        );
    }
}
