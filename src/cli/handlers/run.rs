//! Run command handler
//!
//! Handles the run command including dry-run validation and daemon startup.

use crate::config::Environment;
use crate::config::settings::Settings;
use crate::daemon::Daemon;
use crate::error::AppResult;

/// Handler for the run command
pub struct RunCommandHandler {
    config: Settings,
    environment: Environment,
}

impl RunCommandHandler {
    pub fn new(config: Settings, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    /// Start the scheduler, or only validate configuration when `dry_run` is set
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Daemon startup errors (if not dry-run)
    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            return self.validate_only();
        }

        Daemon::new(self.config.clone(), self.environment).run().await?;
        Ok(())
    }

    /// Validate configuration without connecting to anything
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;

        let scheduler = &self.config.scheduler;
        let smtp = &self.config.smtp;

        println!("✓ Configuration is valid");
        println!("✓ Environment: {}", self.environment);
        println!(
            "✓ Polling every {}s with {} worker(s), {}s shutdown grace",
            scheduler.poll_interval_secs, scheduler.workers, scheduler.shutdown_grace_secs
        );
        println!(
            "✓ Mail relay: {}:{} ({:?}), sender {}",
            smtp.host,
            smtp.port,
            smtp.tls,
            smtp.sender()
        );
        println!("✓ Database URL is configured");
        println!("Dry run completed successfully - configuration is ready for deployment");

        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
