//! Command executor for dispatching CLI commands
//!
//! Entry point for executing a CLI command after parsing and configuration
//! loading.

use super::handlers::{MigrateCommandHandler, RunCommandHandler, ScheduleCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::Environment;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::services::ScheduleMailRequest;

/// Execute a CLI command with the given settings
///
/// No subcommand means `run`.
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings, environment: Environment) -> AppResult<()> {
    validate_command_args(cli)?;

    match cli.command_or_default() {
        Commands::Run { dry_run, .. } => {
            RunCommandHandler::new(settings, environment)
                .execute(dry_run)
                .await
        }
        Commands::Schedule {
            name,
            email,
            message,
            at,
        } => {
            let request = ScheduleMailRequest::new(name, email, message, at);
            ScheduleCommandHandler::new(settings).execute(request).await?;
            Ok(())
        }
        Commands::Migrate { dry_run, rollback } => {
            MigrateCommandHandler::new(settings)
                .execute(dry_run, rollback)
                .await
        }
    }
}

/// Validate command arguments before execution
fn validate_command_args(cli: &Cli) -> AppResult<()> {
    cli.validate()
        .map_err(|msg| AppError::validation("cli_arguments", msg))?;

    if let Some(Commands::Migrate {
        rollback: Some(steps),
        ..
    }) = cli.command
    {
        if steps > 50 {
            eprintln!(
                "Warning: Rolling back {} migrations is a large operation. Consider using smaller steps.",
                steps
            );
        }
    }

    Ok(())
}
