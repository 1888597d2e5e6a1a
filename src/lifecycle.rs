//! Start/stop orchestration for the poll loop.
//!
//! The controller owns the repository handle. Shutdown stops new cycles,
//! drains in-flight deliveries for the configured grace period and only then
//! releases the repository.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;

use crate::config::SchedulerConfig;
use crate::error::AppResult;
use crate::jobs::{MailScheduler, SchedulerState, ShutdownReport};
use crate::repositories::MailStore;
use crate::services::mailer::DeliveryTransport;

pub struct LifecycleController {
    store: Arc<dyn MailStore>,
    scheduler: MailScheduler,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn MailStore>,
        transport: Arc<dyn DeliveryTransport>,
        config: SchedulerConfig,
    ) -> Self {
        let scheduler = MailScheduler::new(Arc::clone(&store), transport, config);
        Self { store, scheduler }
    }

    pub fn scheduler(&self) -> &MailScheduler {
        &self.scheduler
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Starts polling; the first cycle has run by the time this returns.
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler.start().await?;
        Ok(())
    }

    /// Stops the poll loop, drains the executor and closes the store.
    pub async fn shutdown(&self) -> ShutdownReport {
        let report = self.scheduler.stop().await;

        if report.drained {
            tracing::info!("All in-flight deliveries finished");
        } else {
            tracing::warn!(
                abandoned = report.abandoned,
                "Shutdown grace elapsed, remaining deliveries aborted"
            );
        }

        self.store.close().await;
        tracing::info!(store = self.store.name(), "Mail store released");

        report
    }

    /// Starts, waits for `signal`, then shuts down.
    ///
    /// If start fails the store is still released before the error returns.
    pub async fn run_until<F>(&self, signal: F) -> AppResult<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        if let Err(e) = self.start().await {
            tracing::error!(error = %e, "Failed to start mail scheduler");
            self.store.close().await;
            return Err(e);
        }

        signal.await;

        Ok(self.shutdown().await)
    }
}

/// Waits for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
