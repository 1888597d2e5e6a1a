//! Daemon wiring for the `run` command.
//!
//! Builds the PostgreSQL repository and the SMTP transport from settings, then
//! hands both to the [`LifecycleController`] until a shutdown signal arrives.

use std::sync::Arc;

use crate::config::{Environment, settings::Settings};
use crate::db::{establish_async_connection_pool, run_pending_migrations};
use crate::lifecycle::{LifecycleController, shutdown_signal};
use crate::repositories::{MailStore, ScheduledMailRepository};
use crate::services::mailer::{DeliveryTransport, SmtpMailer};

/// Long-running scheduler process
pub struct Daemon {
    settings: Settings,
    environment: Environment,
}

impl Daemon {
    pub fn new(settings: Settings, environment: Environment) -> Self {
        Self {
            settings,
            environment,
        }
    }

    /// Runs until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    /// - Repository connection failures (the only fatal startup path)
    /// - Startup migration failures when `auto_migrate` is enabled
    /// - SMTP transport construction errors
    pub async fn run(self) -> anyhow::Result<()> {
        self.log_startup();

        if self.settings.database.auto_migrate {
            tracing::info!("Applying pending migrations...");
            let applied = run_pending_migrations(&self.settings.database.url).await?;
            tracing::info!(count = applied.len(), "Migrations applied");
        }

        tracing::info!("Initializing database connection pool...");
        let pool = establish_async_connection_pool(&self.settings.database)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to the mail store");
                anyhow::anyhow!("Failed to connect to the mail store: {}", e)
            })?;
        tracing::info!("Database connection pool initialized");

        let store: Arc<dyn MailStore> = Arc::new(ScheduledMailRepository::new(pool));
        let transport: Arc<dyn DeliveryTransport> = Arc::new(SmtpMailer::new(&self.settings.smtp)?);

        let controller = LifecycleController::new(store, transport, self.settings.scheduler.clone());
        let report = controller.run_until(shutdown_signal()).await?;

        tracing::info!(
            drained = report.drained,
            abandoned = report.abandoned,
            "Scheduler shutdown complete"
        );

        Ok(())
    }

    fn log_startup(&self) {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %self.environment.as_str(),
            "Application starting"
        );

        // Connection URL is left out, it may carry credentials
        tracing::info!(
            max_connections = %self.settings.database.max_connections,
            min_connections = %self.settings.database.min_connections,
            connection_timeout = %self.settings.database.connection_timeout,
            auto_migrate = %self.settings.database.auto_migrate,
            "Database configuration loaded"
        );

        tracing::info!(
            host = %self.settings.smtp.host,
            port = %self.settings.smtp.port,
            tls = ?self.settings.smtp.tls,
            sender = %self.settings.smtp.sender(),
            credentials_configured = %(!self.settings.smtp.password.is_empty()),
            "SMTP configuration loaded"
        );

        tracing::info!(
            poll_interval_secs = %self.settings.scheduler.poll_interval_secs,
            workers = %self.settings.scheduler.workers,
            shutdown_grace_secs = %self.settings.scheduler.shutdown_grace_secs,
            max_queue_depth = %self.settings.scheduler.max_queue_depth,
            "Scheduler configuration loaded"
        );

        tracing::info!(
            level = %self.settings.logger.level,
            console_enabled = %self.settings.logger.console.enabled,
            file_enabled = %self.settings.logger.file.enabled,
            "Logger configuration loaded"
        );
    }
}
