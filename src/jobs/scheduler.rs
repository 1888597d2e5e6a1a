use std::sync::{Arc, Mutex, RwLock};

use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};

use crate::config::SchedulerConfig;
use crate::error::StorageError;
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::executor::{DispatchExecutor, ShutdownReport};
use crate::jobs::types::SchedulerState;
use crate::repositories::MailStore;
use crate::services::mailer::DeliveryTransport;

/// Counts for one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Due mails returned by the store
    pub fetched: usize,
    /// Mails handed to the executor
    pub submitted: usize,
    /// Mails left for a later cycle (queue full or executor not running)
    pub rejected: usize,
}

struct PollContext {
    store: Arc<dyn MailStore>,
    transport: Arc<dyn DeliveryTransport>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    executor: RwLock<Option<Arc<DispatchExecutor>>>,
    /// Held for the duration of a cycle so ticks never overlap
    cycle_lock: tokio::sync::Mutex<()>,
}

impl PollContext {
    fn state(&self) -> SchedulerState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: SchedulerState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn executor(&self) -> Option<Arc<DispatchExecutor>> {
        match self.executor.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_executor(&self, next: Option<Arc<DispatchExecutor>>) -> Option<Arc<DispatchExecutor>> {
        match self.executor.write() {
            Ok(mut slot) => std::mem::replace(&mut *slot, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }

    /// Recurring trigger body. Errors end the cycle, never the loop.
    async fn tick(&self) {
        let Ok(_cycle) = self.cycle_lock.try_lock() else {
            tracing::debug!("Previous poll cycle still running, skipping tick");
            return;
        };

        if self.state() != SchedulerState::Running {
            return;
        }

        if let Err(e) = self.cycle(Local::now().naive_local()).await {
            tracing::error!(
                store = self.store.name(),
                error = %e,
                "Poll cycle failed, retrying on next tick"
            );
        }
    }

    async fn cycle(&self, now: NaiveDateTime) -> Result<CycleReport, StorageError> {
        let due = self.store.fetch_due(now).await?;
        let mut report = CycleReport {
            fetched: due.len(),
            ..Default::default()
        };

        if due.is_empty() {
            tracing::info!("No emails due");
            return Ok(report);
        }

        tracing::info!(count = due.len(), "Found {} email(s) due", due.len());

        let executor = self.executor();
        let mut last_rejection = None;

        for mail in due {
            let id = mail.id;
            let submitted = match executor.as_deref() {
                Some(executor) => executor.submit(mail),
                None => Err(JobError::ExecutorClosed),
            };

            match submitted {
                Ok(()) => report.submitted += 1,
                Err(e) => {
                    tracing::debug!(mail_id = id, error = %e, "Mail not queued this cycle");
                    report.rejected += 1;
                    last_rejection = Some(e);
                }
            }
        }

        if let Some(e) = last_rejection {
            tracing::warn!(
                rejected = report.rejected,
                error = %e,
                "Some due mail was not queued and stays pending for a later cycle"
            );
        }

        Ok(report)
    }
}

/// Recurring poll loop.
///
/// Every `poll_interval` the store is asked for due mail, and each mail is
/// submitted to a [`DispatchExecutor`] without waiting for delivery.
///
/// There is no claim step between fetching and delivering. A mail whose
/// status write has not landed when the next cycle fetches (still queued, or
/// a delivery slower than the interval) is dispatched a second time.
pub struct MailScheduler {
    context: Arc<PollContext>,
    cron: tokio::sync::Mutex<Option<TokioCronScheduler>>,
}

impl MailScheduler {
    pub fn new(
        store: Arc<dyn MailStore>,
        transport: Arc<dyn DeliveryTransport>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            context: Arc::new(PollContext {
                store,
                transport,
                config,
                state: Mutex::new(SchedulerState::Stopped),
                executor: RwLock::new(None),
                cycle_lock: tokio::sync::Mutex::new(()),
            }),
            cron: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.context.state()
    }

    /// `Stopped → Running`: runs the first cycle before returning, then
    /// repeats every `poll_interval`.
    ///
    /// # Errors
    ///
    /// `JobError::InvalidState` when not stopped, `JobError::Scheduler` when
    /// the recurring trigger cannot be created.
    pub async fn start(&self) -> JobResult<()> {
        let mut cron_slot = self.cron.lock().await;

        {
            let mut state = self
                .context
                .state
                .lock()
                .map_err(|_| JobError::Scheduler("scheduler state poisoned".to_string()))?;
            if *state != SchedulerState::Stopped {
                return Err(JobError::InvalidState(*state));
            }
            *state = SchedulerState::Running;
        }

        let cron = match self.build_trigger().await {
            Ok(cron) => cron,
            Err(e) => {
                self.context.set_state(SchedulerState::Stopped);
                return Err(e);
            }
        };

        let config = &self.context.config;
        let executor = DispatchExecutor::start(
            self.context.store.clone(),
            self.context.transport.clone(),
            config.workers,
            config.max_queue_depth,
        );
        self.context.replace_executor(Some(Arc::new(executor)));

        tracing::info!(
            poll_interval_secs = config.poll_interval_secs,
            workers = config.workers,
            store = self.context.store.name(),
            transport = self.context.transport.name(),
            "Mail scheduler started"
        );

        self.context.tick().await;

        if let Err(e) = cron.start().await {
            drop(cron_slot);
            self.stop().await;
            return Err(e.into());
        }
        *cron_slot = Some(cron);

        Ok(())
    }

    async fn build_trigger(&self) -> JobResult<TokioCronScheduler> {
        let cron = TokioCronScheduler::new().await?;
        let context = Arc::clone(&self.context);

        let job = Job::new_repeated_async(self.context.config.poll_interval(), move |_uuid, _lock| {
            let context = Arc::clone(&context);
            Box::pin(async move {
                context.tick().await;
            })
        })?;

        cron.add(job).await?;
        Ok(cron)
    }

    /// Runs one cycle now, regardless of the trigger.
    pub async fn run_cycle(&self) -> Result<CycleReport, StorageError> {
        self.run_cycle_at(Local::now().naive_local()).await
    }

    /// Runs one cycle as if the clock read `now`.
    ///
    /// While stopped every fetched mail is counted as rejected.
    pub async fn run_cycle_at(&self, now: NaiveDateTime) -> Result<CycleReport, StorageError> {
        let _cycle = self.context.cycle_lock.lock().await;
        self.context.cycle(now).await
    }

    /// `Running → Stopping → Stopped`.
    ///
    /// New cycles are suppressed, then a running cycle and in-flight
    /// deliveries share one `shutdown_grace` window before the rest is
    /// aborted. Stopping a stopped
    /// scheduler does nothing.
    pub async fn stop(&self) -> ShutdownReport {
        {
            let Ok(mut state) = self.context.state.lock() else {
                return ShutdownReport {
                    drained: false,
                    abandoned: 0,
                };
            };
            if *state != SchedulerState::Running {
                return ShutdownReport {
                    drained: true,
                    abandoned: 0,
                };
            }
            *state = SchedulerState::Stopping;
        }

        tracing::info!("Stopping mail scheduler");
        let deadline = Instant::now() + self.context.config.shutdown_grace();

        if let Some(mut cron) = self.cron.lock().await.take() {
            if let Err(e) = cron.shutdown().await {
                tracing::warn!(error = %e, "Failed to shut down poll trigger");
            }
        }

        // Let a cycle that is mid-submission finish before the queue closes
        if tokio::time::timeout_at(deadline, self.context.cycle_lock.lock())
            .await
            .is_err()
        {
            tracing::warn!("Poll cycle still running at shutdown");
        }

        // One grace period covers both waits
        let remaining = deadline.saturating_duration_since(Instant::now());
        let report = match self.context.replace_executor(None) {
            Some(executor) => executor.shutdown(remaining).await,
            None => ShutdownReport {
                drained: true,
                abandoned: 0,
            },
        };

        self.context.set_state(SchedulerState::Stopped);
        tracing::info!(
            drained = report.drained,
            abandoned = report.abandoned,
            "Mail scheduler stopped"
        );

        report
    }
}
