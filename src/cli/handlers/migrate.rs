//! Migrate command handler
//!
//! Handles database migration operations including dry-run and rollback.

use crate::config::settings::Settings;
use crate::db::{pending_migrations, revert_migrations, run_pending_migrations};
use crate::error::{AppError, AppResult};

/// Handler for the migrate command
pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Execute the migrate command with dry-run and rollback support
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Database connection errors
    /// - Migration execution errors
    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> AppResult<()> {
        self.config.database.validate()?;

        if dry_run {
            return self.show_pending_migrations().await;
        }

        match rollback {
            Some(steps) => self.rollback_migrations(steps).await,
            None => self.run_migrations().await,
        }
    }

    async fn show_pending_migrations(&self) -> AppResult<()> {
        println!("Checking for pending migrations...");

        let pending = pending_migrations(&self.config.database.url).await?;

        if pending.is_empty() {
            println!("✓ No pending migrations found - database is up to date");
        } else {
            println!("Found {} pending migration(s):", pending.len());
            for migration in &pending {
                println!("  - {}", migration);
            }
            println!("\nRun without --dry-run to apply these migrations");
        }

        Ok(())
    }

    async fn run_migrations(&self) -> AppResult<()> {
        println!("Running database migrations...");

        let applied = run_pending_migrations(&self.config.database.url).await?;

        if applied.is_empty() {
            println!("✓ No migrations to apply - database is already up to date");
        } else {
            println!("✓ Applied {} migration(s):", applied.len());
            for migration in &applied {
                println!("  - {}", migration);
            }
        }

        Ok(())
    }

    async fn rollback_migrations(&self, steps: u32) -> AppResult<()> {
        if steps == 0 {
            return Err(AppError::validation(
                "rollback_steps",
                "Number of rollback steps must be greater than 0",
            ));
        }

        println!("Rolling back {} migration(s)...", steps);

        let reverted = revert_migrations(&self.config.database.url, steps).await?;

        for migration in &reverted {
            println!("  - {}", migration);
        }
        if reverted.len() < steps as usize {
            println!(
                "Only {} applied migration(s) were available to roll back",
                reverted.len()
            );
        }
        println!("✓ Rolled back {} migration(s)", reverted.len());

        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/mailsched_test".to_string();
        config
    }

    #[test]
    fn test_migrate_handler_new() {
        let config = create_valid_config();
        let handler = MigrateCommandHandler::new(config.clone());
        assert_eq!(handler.config(), &config);
    }

    #[tokio::test]
    async fn test_migrate_handler_zero_rollback_steps() {
        let handler = MigrateCommandHandler::new(create_valid_config());

        match handler.execute(false, Some(0)).await {
            Err(AppError::Validation { field, reason }) => {
                assert_eq!(field, "rollback_steps");
                assert!(reason.contains("must be greater than 0"));
            }
            other => panic!("Expected validation error for zero rollback steps, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_migrate_handler_rejects_non_postgres_url() {
        let mut config = create_valid_config();
        config.database.url = "mysql://localhost/mailsched".to_string();
        let handler = MigrateCommandHandler::new(config);

        assert!(matches!(
            handler.execute(true, None).await,
            Err(AppError::Configuration { .. })
        ));
    }
}
