//! CLI module for mailsched-rs
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing with clap
//! - Configuration merging (CLI args + config files)
//! - Command execution and validation
//! - Command handlers for run, schedule and migrate

pub mod config_merger;
pub mod executor;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use executor::execute_command;
pub use parser::{Cli, Commands, Environment, LogLevel};

use crate::config::Environment as AppEnvironment;
use crate::config::settings::Settings;
use crate::logger::init_logger;
use anyhow::Context;

/// Load the layered configuration and apply CLI overrides
///
/// Returns the merged settings and the environment they were loaded for.
///
/// # Errors
/// Returns error if configuration loading, merging, or validation fails
pub fn load_and_merge_config(cli: &Cli) -> anyhow::Result<(Settings, AppEnvironment)> {
    let merger = ConfigurationMerger::from_cli(cli).context("Configuration error")?;
    let settings = merger
        .merge_cli_args(cli)
        .context("Configuration merge error")?;

    Ok((settings, merger.environment()))
}

/// Initialize logger from settings
///
/// # Errors
/// Returns error if the logger section is invalid or the subscriber cannot be installed
pub fn init_logger_from_settings(settings: &Settings) -> anyhow::Result<()> {
    let logger_config = settings
        .logger
        .clone()
        .into_logger_config()
        .context("Logger configuration error")?;

    init_logger(logger_config).context("Logger initialization error")
}
