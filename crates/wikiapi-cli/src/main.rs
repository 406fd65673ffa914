//! wikiapi CLI
//!
//! Main entry point for the `wikiapi` binary.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod args;
mod cli;
mod error;

use cli::Cli;
use error::CliError;

/// Application exit codes
#[repr(u8)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    IoError = 3,
    NetworkError = 4,
    ValidationError = 5,
    AuthError = 6,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to create Tokio runtime: {e}");
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            // Logging may not be up yet when config loading fails
            if tracing::dispatcher::has_been_set() {
                error!("{e}");
            } else {
                eprintln!("error: {e}");
            }
            e.exit_code().into()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.load_config()?;
    wikiapi_common_log::init(cli.log_config(&config))?;

    cli.execute(config).await
}
