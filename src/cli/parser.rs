//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::build;

/// Polls PostgreSQL for due mail and delivers it over SMTP
#[derive(Parser, Debug)]
#[command(name = "mailsched-rs")]
#[command(about = "Polls PostgreSQL for due mail and delivers it over SMTP")]
#[command(long_about = "
mailsched-rs stores \"send this email at time T\" jobs in PostgreSQL and
delivers them through an SMTP relay once they are due. Each job moves from
PENDING to SENT or FAILED exactly once.

EXAMPLES:
    # Start polling with the default configuration
    mailsched-rs run

    # Poll every 10 seconds with 8 concurrent deliveries
    mailsched-rs run --poll-interval 10 --workers 8

    # Use a custom configuration file
    mailsched-rs --config /path/to/config.toml run

    # Check configuration without starting the scheduler
    mailsched-rs run --dry-run

    # Schedule a message
    mailsched-rs schedule --name Ada --email ada@example.com \\
        --message \"Happy birthday\" --at \"2025-12-24 09:00\"

    # Apply pending migrations, or preview them
    mailsched-rs migrate
    mailsched-rs migrate --dry-run
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load a single TOML file instead of the layered `config/` directory.
    /// The file must exist and be readable.
    ///
    /// Example: --config /etc/mailsched/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `config/{env}.toml` layer is loaded.
    ///
    /// Available values: development (dev), staging, production (prod), test
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the scheduler (default)
    ///
    /// Connects to the mail store, runs one poll cycle immediately and then
    /// keeps polling until Ctrl+C or SIGTERM. In-flight deliveries get the
    /// configured grace period to finish on shutdown.
    ///
    /// Examples:
    ///   mailsched-rs run
    ///   mailsched-rs run --poll-interval 30 --workers 10
    ///   mailsched-rs run --dry-run
    Run {
        /// Seconds between poll cycles
        #[arg(long, value_name = "SECS", value_parser = super::validation::validate_poll_interval)]
        poll_interval: Option<u64>,

        /// Maximum number of concurrent deliveries
        #[arg(short, long, value_name = "N", value_parser = super::validation::validate_workers)]
        workers: Option<usize>,

        /// Log level override for this run
        ///
        /// Takes precedence over --verbose and --quiet.
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Schedule a message for later delivery
    ///
    /// Prints the id of the stored job.
    ///
    /// Example:
    ///   mailsched-rs schedule --name Ada --email ada@example.com --message Hi --at "2025-12-24 09:00"
    Schedule {
        /// Recipient name, used in the subject line
        #[arg(long)]
        name: String,

        /// Recipient address
        #[arg(long)]
        email: String,

        /// Message body
        #[arg(long)]
        message: String,

        /// Local send time, `YYYY-MM-DD HH:MM[:SS]`
        #[arg(long, value_name = "DATETIME", value_parser = super::validation::parse_send_at)]
        at: NaiveDateTime,
    },
    /// Database migration operations
    ///
    /// Examples:
    ///   mailsched-rs migrate                    # Apply all pending migrations
    ///   mailsched-rs migrate --dry-run          # Show pending migrations without applying
    ///   mailsched-rs migrate --rollback 1       # Roll back the last migration
    Migrate {
        /// Show pending migrations without applying
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to roll back (1-100)
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = super::validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },
}

impl Commands {
    /// `run` with nothing overridden, used when no subcommand is given
    pub fn default_run() -> Self {
        Commands::Run {
            poll_interval: None,
            workers: None,
            log_level: None,
            dry_run: false,
        }
    }
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "staging")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Migrate { dry_run, rollback }) = &self.command {
            if *dry_run && rollback.is_some() {
                return Err("Cannot use --dry-run and --rollback together".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }

    /// The command to execute, `run` when none was given
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or_else(Commands::default_run)
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}
