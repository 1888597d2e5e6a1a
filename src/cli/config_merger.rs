//! Configuration merger for CLI arguments and config files
//!
//! CLI arguments override file and environment configuration.

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, settings::Settings};
use std::path::Path;

/// Applies CLI overrides on top of the loaded configuration
pub struct ConfigurationMerger {
    base_config: Settings,
    environment: Environment,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings, environment: Environment) -> Self {
        Self {
            base_config,
            environment,
        }
    }

    /// Load the base configuration honoring `--config` and `--env`
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut loader = ConfigLoader::new()?;

        if let Some(env) = cli.env {
            loader = loader.with_environment(env.into());
        }

        if let Some(path) = cli.config.as_deref() {
            Self::validate_config_file_access(path)?;
            loader = loader.with_file(path);
        }

        let environment = loader.environment();
        let config = loader.load()?;

        Ok(Self::new(config, environment))
    }

    /// The file may have disappeared between argument parsing and loading
    fn validate_config_file_access(path: &Path) -> Result<(), ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::invalid(
                "config_file",
                format!("Configuration file does not exist: '{}'", path.display()),
            ));
        }

        std::fs::File::open(path)
            .map(|_| ())
            .map_err(|e| {
                ConfigError::invalid(
                    "config_file",
                    format!("Cannot read configuration file '{}': {}", path.display(), e),
                )
            })
    }

    /// Merge CLI arguments with the base configuration
    ///
    /// Command-specific overrides win over the global `--verbose`/`--quiet`
    /// flags; the merged result is validated again.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        self.apply_global_overrides(&mut config, cli);

        if let Some(ref command) = cli.command {
            self.apply_command_overrides(&mut config, command);
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_global_overrides(&self, config: &mut Settings, cli: &Cli) {
        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }
    }

    fn apply_command_overrides(&self, config: &mut Settings, command: &Commands) {
        match command {
            Commands::Run {
                poll_interval,
                workers,
                log_level,
                dry_run: _,
            } => {
                if let Some(secs) = poll_interval {
                    config.scheduler.poll_interval_secs = *secs;
                }

                if let Some(workers) = workers {
                    config.scheduler.workers = *workers;
                }

                if let Some(level) = log_level {
                    config.logger.level = (*level).into();
                }
            }
            Commands::Schedule { .. } | Commands::Migrate { .. } => {}
        }
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }

    /// Environment the configuration was loaded for
    pub fn environment(&self) -> Environment {
        self.environment
    }
}
