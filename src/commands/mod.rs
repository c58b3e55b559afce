/*!
Command handlers for the CLI

Each subcommand maps to one handler that drives the [`AutolabClient`] and
prints its results:

- `setup`       (authorize this client)
- [`assessment`] (status, download, submit)
- [`listing`]    (courses, assessments, problems)
- [`scores`]     (scores and feedback)

Every command except `setup` requires tokens from a previous setup.
*/

use std::path::Path;

use crate::cli::{Commands, SubmitTarget};
use crate::client::AutolabClient;
use crate::config::Config;
use crate::context;
use crate::error::{kind_of, AutolabError, Result};

pub mod assessment;
pub mod listing;
pub mod scores;

/// Runs `command` against `client`
///
/// # Arguments
///
/// * `client` - Client built from `config`; tokens are loaded here
/// * `config` - Loaded configuration
/// * `command` - Parsed subcommand
/// * `cwd` - Directory used to look up the assessment context
pub async fn execute(
    client: &mut AutolabClient,
    config: &Config,
    command: Commands,
    cwd: &Path,
) -> Result<()> {
    if let Commands::Setup { force } = command {
        tracing::info!(force, "Starting setup");
        return setup::run_setup(client, config, force).await;
    }

    if !client.load_tokens()? {
        return Err(AutolabError::NotSetUp.into());
    }

    match command {
        Commands::Setup { .. } => Ok(()),
        Commands::Status => assessment::show_status(client, cwd).await,
        Commands::Download { target } => {
            let ctx = context::AssessmentContext::parse(&target)?;
            assessment::download(client, &ctx, cwd).await
        }
        Commands::Submit {
            first,
            second,
            force,
        } => {
            let submit = SubmitTarget::from_args(&first, second.as_ref());
            let ctx = context::resolve_checked(submit.target.as_deref(), force, cwd)?;
            assessment::submit(client, &ctx, &submit.file).await
        }
        Commands::Courses => listing::list_courses(client, cwd).await,
        Commands::Assessments { course } => listing::list_assessments(client, &course, cwd).await,
        Commands::Problems { target } => {
            let ctx = context::resolve(target.as_deref(), cwd)?;
            listing::list_problems(client, &ctx).await
        }
        Commands::Scores { target, all } => {
            let ctx = context::resolve(target.as_deref(), cwd)?;
            scores::show_scores(client, &ctx, all).await
        }
        Commands::Feedback {
            target,
            problem,
            version,
        } => {
            let ctx = context::resolve(target.as_deref(), cwd)?;
            scores::show_feedback(client, &ctx, problem.as_deref(), version).await
        }
    }
}

/// User-facing message for a failed command
pub fn error_message(err: &anyhow::Error) -> String {
    match kind_of(err) {
        Some(AutolabError::InvalidToken) => "Failed to authenticate with Autolab.\n\
             Your authorization may have expired or been revoked.\n\
             Please run 'autolab setup' to re-authorize this client."
            .to_string(),
        Some(AutolabError::NotSetUp) => "No user set up on this client yet.\n\
             Please run 'autolab setup' to authorize this client."
            .to_string(),
        Some(AutolabError::Transport(e)) => {
            format!("Unable to reach the Autolab server: {}", e)
        }
        Some(AutolabError::Protocol(msg)) => {
            format!("Received an unexpected response from the server: {}", msg)
        }
        Some(AutolabError::Api { message, .. }) => format!("Error: {}", message),
        _ => format!("Error: {:#}", err),
    }
}

/// Device authorization
pub mod setup {
    use colored::Colorize;

    use crate::auth::AuthorizationOutcome;
    use crate::client::AutolabClient;
    use crate::config::Config;
    use crate::error::{is_invalid_token, AutolabError, Result};

    /// Authorizes this client through the device flow
    ///
    /// Without `force`, an existing setup whose tokens still work is kept.
    pub async fn run_setup(client: &mut AutolabClient, config: &Config, force: bool) -> Result<()> {
        if !force && client.load_tokens()? {
            match client.get_user_info().await {
                Ok(user) => {
                    println!(
                        "User {} is already set up on this client.",
                        user.first_name.green()
                    );
                    println!("Use 'autolab setup -f' to set up a different user.");
                    return Ok(());
                }
                Err(e) if is_invalid_token(&e) => {
                    tracing::info!("Stored authorization is no longer valid, re-authorizing");
                }
                Err(e) => return Err(e),
            }
        }

        let session = client.initiate_device_flow().await?;
        println!("Please visit {}", session.verification_uri.cyan());
        println!("and enter the code: {}", session.user_code.cyan().bold());
        println!("Waiting for authorization...");

        let timeout = config.auth.authorize_timeout();
        match client.await_authorization(timeout).await? {
            AuthorizationOutcome::Granted => {
                let user = client.get_user_info().await?;
                println!(
                    "{}",
                    format!("Setup successful. Welcome, {}!", user.first_name).green()
                );
                Ok(())
            }
            AuthorizationOutcome::Denied(reason) => {
                println!("{}", "Authorization was denied.".red());
                Err(AutolabError::Authorization(reason).into())
            }
            AuthorizationOutcome::TimedOut => {
                println!("{}", "Timed out waiting for authorization.".yellow());
                Err(AutolabError::Authorization(format!(
                    "no response within {} seconds",
                    timeout.as_secs()
                ))
                .into())
            }
        }
    }
}
