use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use tfstate_bootstrap::cli::{self, Cli};
use tfstate_bootstrap::{BootstrapError, Invocation};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return Ok(cli::report_parse_error(err)),
    };

    let default_level = if cli.verbose { "tfstate_bootstrap=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = match Invocation::from_flags(cli.mode_flags()) {
        Ok(Invocation::Run(mode)) => mode,
        Ok(Invocation::Usage) => {
            println!("{}", cli::usage());
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => {
            eprintln!("error: {}\n", err);
            eprintln!("{}", cli::usage());
            return Ok(ExitCode::FAILURE);
        }
    };

    match cli::run(&cli, mode).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(BootstrapError::UserAbort) => {
            tracing::info!("aborted; nothing was changed");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}
