use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::models::ScheduledMail;
use crate::jobs::types::{DispatchOutcome, MailStatus};
use crate::repositories::MailStore;
use crate::services::mailer::DeliveryTransport;

/// What happened to queued and in-flight deliveries during shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every submitted mail finished within the grace period
    pub drained: bool,
    /// Tasks aborted plus mails still queued when the grace period ran out
    pub abandoned: usize,
}

/// Delivers one mail and records the outcome. Shared by every task.
struct DispatchContext {
    store: Arc<dyn MailStore>,
    transport: Arc<dyn DeliveryTransport>,
}

impl DispatchContext {
    async fn dispatch(&self, mail: ScheduledMail) -> DispatchOutcome {
        let subject = mail.subject();

        match self
            .transport
            .send(&mail.email, &subject, &mail.message)
            .await
        {
            Ok(()) => {
                tracing::info!(mail_id = mail.id, recipient = %mail.email, "Email sent");
                self.record(mail.id, MailStatus::Sent, None).await
            }
            Err(e) => {
                tracing::warn!(
                    mail_id = mail.id,
                    recipient = %mail.email,
                    transport = self.transport.name(),
                    error = %e,
                    "Email delivery failed"
                );
                self.record(mail.id, MailStatus::Failed, Some(e.to_string()))
                    .await
            }
        }
    }

    /// A failed status write leaves the row `PENDING`; it is picked up again
    /// by a later cycle.
    async fn record(&self, id: i32, status: MailStatus, error: Option<String>) -> DispatchOutcome {
        match self.store.update_status(id, status).await {
            Ok(()) => {
                tracing::debug!(mail_id = id, status = %status, "Status recorded");
                match error {
                    None => DispatchOutcome::Sent { id },
                    Some(error) => DispatchOutcome::Failed { id, error },
                }
            }
            Err(e) => {
                tracing::error!(
                    mail_id = id,
                    status = %status,
                    store = self.store.name(),
                    error = %e,
                    "Failed to record mail status"
                );
                DispatchOutcome::StatusNotRecorded {
                    id,
                    attempted: status,
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Bounded pool running one delivery task per submitted mail.
///
/// Submission never waits: mails go through an in-memory queue to a dispatch
/// loop that starts at most `workers` tasks at a time. A failing or panicking
/// task affects only its own mail.
pub struct DispatchExecutor {
    sender: Mutex<Option<mpsc::UnboundedSender<ScheduledMail>>>,
    queued: Arc<AtomicUsize>,
    max_queue_depth: usize,
    cancel: CancellationToken,
    handle: tokio::sync::Mutex<Option<JoinHandle<usize>>>,
}

impl DispatchExecutor {
    /// Spawns the dispatch loop on the current runtime.
    ///
    /// `max_queue_depth == 0` means the queue is unbounded.
    pub fn start(
        store: Arc<dyn MailStore>,
        transport: Arc<dyn DeliveryTransport>,
        workers: usize,
        max_queue_depth: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let context = Arc::new(DispatchContext { store, transport });
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));

        let handle = tokio::spawn(dispatch_loop(
            receiver,
            context,
            semaphore,
            queued.clone(),
            cancel.clone(),
        ));

        Self {
            sender: Mutex::new(Some(sender)),
            queued,
            max_queue_depth,
            cancel,
            handle: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// Queue `mail` for delivery without waiting for it to run.
    pub fn submit(&self, mail: ScheduledMail) -> JobResult<()> {
        let guard = self.sender.lock().map_err(|_| JobError::ExecutorClosed)?;
        let sender = guard.as_ref().ok_or(JobError::ExecutorClosed)?;

        if self.max_queue_depth > 0 && self.queued.load(Ordering::SeqCst) >= self.max_queue_depth
        {
            return Err(JobError::QueueFull(self.max_queue_depth));
        }

        self.queued.fetch_add(1, Ordering::SeqCst);
        sender.send(mail).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            JobError::ExecutorClosed
        })
    }

    /// Mails accepted but not yet handed to a worker
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Stop accepting mail, wait up to `grace` for queued and running
    /// deliveries, then abort whatever is left.
    ///
    /// Aborted deliveries may or may not have reached the relay; their rows
    /// stay `PENDING`.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        match self.sender.lock() {
            Ok(mut sender) => drop(sender.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }

        let Some(mut handle) = self.handle.lock().await.take() else {
            return ShutdownReport {
                drained: true,
                abandoned: 0,
            };
        };

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => ShutdownReport {
                drained: true,
                abandoned: self.join_result(joined),
            },
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Grace period elapsed, aborting in-flight deliveries"
                );
                self.cancel.cancel();
                let joined = handle.await;
                ShutdownReport {
                    drained: false,
                    abandoned: self.join_result(joined),
                }
            }
        }
    }

    fn join_result(&self, joined: Result<usize, JoinError>) -> usize {
        joined.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Dispatch loop terminated abnormally");
            self.queued()
        })
    }
}

impl Drop for DispatchExecutor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::UnboundedReceiver<ScheduledMail>,
    context: Arc<DispatchContext>,
    semaphore: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    cancel: CancellationToken,
) -> usize {
    let mut tasks: JoinSet<DispatchOutcome> = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_completion(joined),
            next = receiver.recv() => {
                let Some(mail) = next else {
                    // Every sender is gone and the queue is empty
                    break;
                };

                let permit = tokio::select! {
                    biased;
                    // `mail` is still counted in `queued` and reported as abandoned
                    _ = cancel.cancelled() => break,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                queued.fetch_sub(1, Ordering::SeqCst);
                let context = context.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    context.dispatch(mail).await
                });
            }
        }
    }

    let aborted = drain(&mut tasks, &cancel).await;
    receiver.close();
    let still_queued = queued.swap(0, Ordering::SeqCst);

    if aborted + still_queued > 0 {
        tracing::warn!(
            aborted,
            queued = still_queued,
            "Deliveries abandoned at shutdown; affected mail stays pending"
        );
    }

    aborted + still_queued
}

/// Waits for every task; on cancellation aborts the rest and returns how many
/// were aborted.
async fn drain(tasks: &mut JoinSet<DispatchOutcome>, cancel: &CancellationToken) -> usize {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = tasks.join_next() => match next {
                Some(joined) => log_completion(joined),
                None => return 0,
            },
        }
    }

    tasks.abort_all();
    let mut aborted = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Err(e) if e.is_cancelled() => aborted += 1,
            other => log_completion(other),
        }
    }
    aborted
}

fn log_completion(joined: Result<DispatchOutcome, JoinError>) {
    match joined {
        Ok(DispatchOutcome::Sent { id }) => {
            tracing::debug!(mail_id = id, "Dispatch finished: sent");
        }
        Ok(DispatchOutcome::Failed { id, error }) => {
            tracing::debug!(mail_id = id, error = %error, "Dispatch finished: failed");
        }
        Ok(DispatchOutcome::StatusNotRecorded {
            id,
            attempted,
            error,
        }) => {
            tracing::warn!(
                mail_id = id,
                attempted = %attempted,
                error = %error,
                "Dispatch finished without a recorded status"
            );
        }
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "Dispatch task panicked");
        }
        Err(e) => {
            tracing::debug!(error = %e, "Dispatch task cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::models::NewScheduledMail;
    use crate::repositories::InMemoryMailStore;
    use crate::services::mailer::DeliveryError;
    use async_trait::async_trait;
    use chrono::{Local, NaiveDateTime};
    use std::time::Instant;

    #[derive(Default)]
    struct StubTransport {
        delay: Duration,
        fail: bool,
        panic_for: Option<String>,
        active: AtomicUsize,
        peak: AtomicUsize,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeliveryTransport for StubTransport {
        async fn send(&self, recipient: &str, _subject: &str, _body: &str) -> Result<(), DeliveryError> {
            if self.panic_for.as_deref() == Some(recipient) {
                panic!("transport exploded for {}", recipient);
            }

            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            self.sent.lock().unwrap().push(recipient.to_string());
            if self.fail {
                Err(DeliveryError::Rejected("550 mailbox unavailable".to_string()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    /// Takes the store offline while delivering, so the status write fails
    struct OutageTransport {
        store: Arc<InMemoryMailStore>,
    }

    #[async_trait]
    impl DeliveryTransport for OutageTransport {
        async fn send(&self, _recipient: &str, _subject: &str, _body: &str) -> Result<(), DeliveryError> {
            self.store.set_available(false);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "outage"
        }
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn seed(store: &InMemoryMailStore, emails: &[&str]) -> Vec<ScheduledMail> {
        let mut mails = Vec::new();
        for email in emails {
            let id = store
                .insert(NewScheduledMail::new("Ada", *email, "hello", now()))
                .await
                .unwrap();
            mails.push(store.get(id).unwrap());
        }
        mails
    }

    #[tokio::test]
    async fn test_successful_delivery_is_recorded_as_sent() {
        let store = Arc::new(InMemoryMailStore::new());
        let transport = Arc::new(StubTransport::default());
        let executor = DispatchExecutor::start(store.clone(), transport.clone(), 2, 0);

        let mails = seed(&store, &["ada@example.com"]).await;
        executor.submit(mails[0].clone()).unwrap();

        let report = executor.shutdown(Duration::from_secs(5)).await;
        assert_eq!(
            report,
            ShutdownReport {
                drained: true,
                abandoned: 0
            }
        );
        assert_eq!(store.status(mails[0].id), Some(MailStatus::Sent));
        assert_eq!(*transport.sent.lock().unwrap(), vec!["ada@example.com"]);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_recorded_as_failed() {
        let store = Arc::new(InMemoryMailStore::new());
        let transport = Arc::new(StubTransport {
            fail: true,
            ..Default::default()
        });
        let executor = DispatchExecutor::start(store.clone(), transport, 2, 0);

        let mails = seed(&store, &["ada@example.com"]).await;
        executor.submit(mails[0].clone()).unwrap();
        executor.shutdown(Duration::from_secs(5)).await;

        assert_eq!(store.status(mails[0].id), Some(MailStatus::Failed));
    }

    #[tokio::test]
    async fn test_status_write_failure_leaves_mail_pending() {
        let store = Arc::new(InMemoryMailStore::new());
        let transport = Arc::new(OutageTransport {
            store: store.clone(),
        });
        let executor = DispatchExecutor::start(store.clone(), transport, 1, 0);

        let mails = seed(&store, &["ada@example.com"]).await;
        executor.submit(mails[0].clone()).unwrap();
        let report = executor.shutdown(Duration::from_secs(5)).await;

        assert!(report.drained);
        assert_eq!(store.status(mails[0].id), Some(MailStatus::Pending));
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_affect_siblings() {
        let store = Arc::new(InMemoryMailStore::new());
        let transport = Arc::new(StubTransport {
            panic_for: Some("boom@example.com".to_string()),
            ..Default::default()
        });
        let executor = DispatchExecutor::start(store.clone(), transport, 2, 0);

        let mails = seed(&store, &["boom@example.com", "ada@example.com"]).await;
        for mail in &mails {
            executor.submit(mail.clone()).unwrap();
        }
        let report = executor.shutdown(Duration::from_secs(5)).await;

        assert!(report.drained);
        assert_eq!(store.status(mails[0].id), Some(MailStatus::Pending));
        assert_eq!(store.status(mails[1].id), Some(MailStatus::Sent));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded_by_workers() {
        let store = Arc::new(InMemoryMailStore::new());
        let transport = Arc::new(StubTransport {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let executor = DispatchExecutor::start(store.clone(), transport.clone(), 2, 0);

        let emails: Vec<String> = (0..6).map(|i| format!("user{}@example.com", i)).collect();
        let refs: Vec<&str> = emails.iter().map(String::as_str).collect();
        for mail in seed(&store, &refs).await {
            executor.submit(mail).unwrap();
        }
        executor.shutdown(Duration::from_secs(5)).await;

        assert_eq!(transport.sent.lock().unwrap().len(), 6);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_submit_rejects_when_queue_is_full() {
        let store = Arc::new(InMemoryMailStore::new());
        let transport = Arc::new(StubTransport::default());
        let executor = DispatchExecutor::start(store.clone(), transport, 1, 1);

        let mails = seed(&store, &["a@example.com", "b@example.com"]).await;
        // Nothing yields between the two calls, so the first is still queued
        executor.submit(mails[0].clone()).unwrap();
        assert!(matches!(
            executor.submit(mails[1].clone()),
            Err(JobError::QueueFull(1))
        ));

        executor.shutdown(Duration::from_secs(5)).await;
        assert_eq!(store.status(mails[0].id), Some(MailStatus::Sent));
        assert_eq!(store.status(mails[1].id), Some(MailStatus::Pending));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_after_grace_period() {
        let store = Arc::new(InMemoryMailStore::new());
        let transport = Arc::new(StubTransport {
            delay: Duration::from_secs(30),
            ..Default::default()
        });
        let executor = DispatchExecutor::start(store.clone(), transport, 1, 0);

        let mails = seed(&store, &["a@example.com", "b@example.com"]).await;
        for mail in &mails {
            executor.submit(mail.clone()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        let report = executor.shutdown(Duration::from_millis(100)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!report.drained);
        assert_eq!(report.abandoned, 2);
        assert!(mails
            .iter()
            .all(|m| store.status(m.id) == Some(MailStatus::Pending)));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let store = Arc::new(InMemoryMailStore::new());
        let executor =
            DispatchExecutor::start(store.clone(), Arc::new(StubTransport::default()), 1, 0);
        executor.shutdown(Duration::from_secs(1)).await;

        let mails = seed(&store, &["a@example.com"]).await;
        assert!(matches!(
            executor.submit(mails[0].clone()),
            Err(JobError::ExecutorClosed)
        ));

        let again = executor.shutdown(Duration::from_secs(1)).await;
        assert!(again.drained);
    }
}
