//! CLI argument definitions using clap derive macros.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde_json::Value;
use wikiapi_client::{Directives, Extras, Site, DEFAULT_TOKEN_TYPE};
use wikiapi_common_config::{apply_env_overrides, ConfigLoader, Environment, WikiApiConfig};
use wikiapi_common_http::header::{HeaderMap, HeaderName, HeaderValue};
use wikiapi_common_log::{LogConfig, LogLevel};

use crate::args::{parse_duration_secs, parse_key_value, to_params};
use crate::error::CliError;

/// wikiapi - talk to MediaWiki-style APIs
///
/// Results are printed as JSON on stdout. Iterating commands print one JSON
/// document per line.
#[derive(Debug, Parser)]
#[command(
    name = "wikiapi",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "WIKIAPI_CONFIG_PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config: Option<PathBuf>,

    /// API endpoint URL, overriding the configuration
    #[arg(long, global = true, value_hint = ValueHint::Url)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Make a single API call and print the response
    Call(CallCommand),

    /// Follow `action=query` continuation, printing each `query` object
    Query(QueryCommand),

    /// Follow `action=query` continuation, printing each complete page
    Pages(QueryCommand),

    /// Fetch and print a token
    Token(TokenCommand),
}

/// Switches applied to the call rather than sent as parameters.
#[derive(Debug, Default, Args)]
pub struct DirectiveArgs {
    /// Always send the request as POST
    #[arg(long)]
    pub post: bool,

    /// Send the request over https regardless of the endpoint scheme
    #[arg(long)]
    pub https: bool,

    /// Don't perform a pending login before this call
    #[arg(long)]
    pub no_login: bool,

    /// Request timeout in seconds for this call
    #[arg(long, value_parser = parse_duration_secs)]
    pub timeout: Option<Duration>,

    /// Extra request header (name=value), repeatable
    #[arg(long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,
}

impl DirectiveArgs {
    pub fn to_directives(&self) -> Result<Directives, CliError> {
        let mut directives = Directives::new();
        directives.force_post = self.post;
        directives.force_ssl = self.https;
        directives.no_login = self.no_login;

        if self.timeout.is_some() || !self.headers.is_empty() {
            let mut headers = HeaderMap::new();
            for (name, value) in &self.headers {
                let name = HeaderName::try_from(name.as_str())
                    .map_err(|e| CliError::Usage(format!("header name '{name}': {e}")))?;
                let value = HeaderValue::try_from(value.as_str())
                    .map_err(|e| CliError::Usage(format!("header {name}: {e}")))?;
                headers.insert(name, value);
            }
            directives = directives.extras(Extras {
                headers,
                timeout: self.timeout,
            });
        }
        Ok(directives)
    }
}

#[derive(Debug, Args)]
pub struct CallCommand {
    /// API action, e.g. `query` or `parse`
    pub action: String,

    /// Parameters as name=value
    #[arg(value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    #[command(flatten)]
    pub directives: DirectiveArgs,
}

#[derive(Debug, Args)]
pub struct QueryCommand {
    /// Parameters as name=value
    #[arg(value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Stop after this many results
    #[arg(long)]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub directives: DirectiveArgs,
}

#[derive(Debug, Args)]
pub struct TokenCommand {
    /// Token type
    #[arg(long = "type", default_value = DEFAULT_TOKEN_TYPE)]
    pub token_type: String,
}

impl Cli {
    /// Load configuration from `--config`, or `.wikiapi/config.yaml` in the
    /// current directory, then apply environment and flag overrides.
    pub fn load_config(&self) -> Result<WikiApiConfig, CliError> {
        Environment::init()?;

        let loader = ConfigLoader::default();
        let mut config = match &self.config {
            Some(path) => loader.load_from(path)?,
            None => loader.load()?,
        };

        apply_env_overrides(&mut config)?;
        if let Some(url) = &self.url {
            config.site.url = url.clone();
        }
        Ok(config)
    }

    /// Logging settings from the config, adjusted by `-v` and `-q`.
    pub fn log_config(&self, config: &WikiApiConfig) -> LogConfig {
        let mut log = LogConfig::from_settings(&config.logging).with_env_overrides();
        if self.quiet {
            log.level = LogLevel::Error;
        }
        for _ in 0..self.verbose {
            log.level = log.level.more_verbose();
        }
        log
    }

    /// Execute the selected command
    pub async fn execute(self, config: WikiApiConfig) -> Result<(), CliError> {
        let mut site = Site::from_config(&config).await?;
        tracing::debug!(site = %site, "site ready");

        let stdout = io::stdout();
        let mut out = stdout.lock();

        match self.command {
            Command::Call(cmd) => {
                let directives = cmd.directives.to_directives()?;
                let result = site
                    .call_with(&cmd.action, to_params(&cmd.params), &directives)
                    .await?;
                print_pretty(&mut out, &result)?;
            }
            Command::Query(cmd) => {
                let directives = cmd.directives.to_directives()?;
                let mut results = site.iterate_with("query", to_params(&cmd.params), directives)?;
                let mut printed = 0;
                while cmd.limit.map_or(true, |limit| printed < limit) {
                    let Some(result) = results.next().await else {
                        break;
                    };
                    print_line(&mut out, &result?)?;
                    printed += 1;
                }
            }
            Command::Pages(cmd) => {
                let directives = cmd.directives.to_directives()?;
                let mut pages = site.query_pages_with(to_params(&cmd.params), directives)?;
                let mut printed = 0;
                while cmd.limit.map_or(true, |limit| printed < limit) {
                    let Some(page) = pages.next().await else {
                        break;
                    };
                    print_line(&mut out, &page?)?;
                    printed += 1;
                }
            }
            Command::Token(cmd) => {
                let token = site.token(&cmd.token_type).await?;
                writeln!(out, "{token}")?;
            }
        }
        Ok(())
    }
}

fn print_pretty(out: &mut impl Write, value: &Value) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn print_line(out: &mut impl Write, value: &Value) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
