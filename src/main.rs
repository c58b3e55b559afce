//! autolab - command-line client for the Autolab autograding service
//!
#![doc = "Main entry point for the autolab CLI."]

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autolab::auth::open_token_store;
use autolab::cli::Cli;
use autolab::client::{AutolabClient, ClientOptions};
use autolab::commands;
use autolab::config::Config;
use autolab::error::AutolabError;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("{}", commands::error_message(&e).red());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load and validate configuration
    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    let store = open_token_store(config.auth.token_store)?;
    let mut client = AutolabClient::new(ClientOptions::from_config(&config), store)?;

    let cwd = std::env::current_dir().map_err(|e| AutolabError::file_system(".", e))?;
    commands::execute(&mut client, &config, cli.command, &cwd).await
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` takes precedence; otherwise only warnings are shown unless
/// `--verbose` is given. Logs go to stderr so they never mix with command
/// output.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "autolab=debug" } else { "autolab=warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
