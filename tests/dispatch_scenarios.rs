//! End-to-end dispatch scenarios against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};

use mailsched_rs::LifecycleController;
use mailsched_rs::config::SchedulerConfig;
use mailsched_rs::jobs::{MailScheduler, MailStatus, NewScheduledMail, SchedulerState};
use mailsched_rs::repositories::{InMemoryMailStore, MailStore};
use mailsched_rs::services::mailer::{DeliveryError, DeliveryTransport};

/// Transport that sleeps, records every call and optionally fails
struct StubTransport {
    latency: Duration,
    fail: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    recipients: std::sync::Mutex<Vec<String>>,
}

impl StubTransport {
    fn new(latency: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            latency,
            fail,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            recipients: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn ok() -> Arc<Self> {
        Self::new(Duration::ZERO, false)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryTransport for StubTransport {
    async fn send(&self, recipient: &str, _subject: &str, _body: &str) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recipients.lock().unwrap().push(recipient.to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

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

fn config(workers: usize, grace_secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval_secs: 3600,
        workers,
        shutdown_grace_secs: grace_secs,
        max_queue_depth: 0,
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

async fn seed(store: &InMemoryMailStore, email: &str, send_at: NaiveDateTime) -> i32 {
    store
        .insert(NewScheduledMail::new("Ada", email, "Hello from the past", send_at))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn due_mail_is_sent_once_and_marked_sent() {
    let store = Arc::new(InMemoryMailStore::new());
    let id = seed(&store, "ada@example.com", now() - ChronoDuration::minutes(5)).await;
    let transport = StubTransport::ok();
    let scheduler = MailScheduler::new(store.clone(), transport.clone(), config(5, 5));

    scheduler.start().await.unwrap();
    let report = scheduler.stop().await;

    assert!(report.drained);
    assert_eq!(transport.calls(), 1);
    assert_eq!(store.status(id), Some(MailStatus::Sent));
    assert_eq!(
        transport.recipients.lock().unwrap().as_slice(),
        ["ada@example.com".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_transport_marks_mail_failed() {
    let store = Arc::new(InMemoryMailStore::new());
    let id = seed(&store, "ada@example.com", now() - ChronoDuration::minutes(5)).await;
    let transport = StubTransport::new(Duration::ZERO, true);
    let scheduler = MailScheduler::new(store.clone(), transport.clone(), config(5, 5));

    scheduler.start().await.unwrap();
    scheduler.stop().await;

    assert_eq!(transport.calls(), 1);
    assert_eq!(store.status(id), Some(MailStatus::Failed));

    // Terminal rows are never picked up again
    assert!(store.fetch_due(now()).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blank_email_is_never_sent() {
    let store = Arc::new(InMemoryMailStore::new());
    let id = seed(&store, "   ", now() - ChronoDuration::minutes(5)).await;
    let transport = StubTransport::ok();
    let scheduler = MailScheduler::new(store.clone(), transport.clone(), config(5, 5));

    scheduler.start().await.unwrap();
    let report = scheduler.run_cycle().await.unwrap();
    scheduler.stop().await;

    assert_eq!(report.fetched, 0);
    assert_eq!(transport.calls(), 0);
    assert_eq!(store.status(id), Some(MailStatus::Pending));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn future_mail_is_not_fetched() {
    let store = Arc::new(InMemoryMailStore::new());
    let id = seed(&store, "ada@example.com", now() + ChronoDuration::hours(1)).await;
    let transport = StubTransport::ok();
    let scheduler = MailScheduler::new(store.clone(), transport.clone(), config(5, 5));

    scheduler.start().await.unwrap();
    let report = scheduler.run_cycle().await.unwrap();
    scheduler.stop().await;

    assert_eq!(report.fetched, 0);
    assert_eq!(transport.calls(), 0);
    assert_eq!(store.status(id), Some(MailStatus::Pending));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn due_mail_is_dispatched_concurrently() {
    let store = Arc::new(InMemoryMailStore::new());
    let first = seed(&store, "ada@example.com", now() - ChronoDuration::minutes(2)).await;
    let second = seed(&store, "grace@example.com", now() - ChronoDuration::minutes(1)).await;
    let latency = Duration::from_millis(400);
    let transport = StubTransport::new(latency, false);
    let scheduler = MailScheduler::new(store.clone(), transport.clone(), config(5, 5));

    let started = Instant::now();
    scheduler.start().await.unwrap();
    let report = scheduler.stop().await;
    let elapsed = started.elapsed();

    assert!(report.drained);
    assert!(
        elapsed < latency * 2 - Duration::from_millis(100),
        "deliveries ran sequentially: {elapsed:?}"
    );
    assert_eq!(transport.peak.load(Ordering::SeqCst), 2);
    assert_eq!(store.status(first), Some(MailStatus::Sent));
    assert_eq!(store.status(second), Some(MailStatus::Sent));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_during_slow_send_returns_within_grace() {
    let store = Arc::new(InMemoryMailStore::new());
    let id = seed(&store, "ada@example.com", now() - ChronoDuration::minutes(5)).await;
    let transport = StubTransport::new(Duration::from_secs(60), false);
    let controller = LifecycleController::new(store.clone(), transport.clone(), config(5, 1));

    controller.start().await.unwrap();

    let started = Instant::now();
    let report = controller.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!report.drained);
    assert_eq!(report.abandoned, 1);
    assert_eq!(controller.state(), SchedulerState::Stopped);
    assert_eq!(transport.calls(), 1);
    assert_eq!(store.status(id), Some(MailStatus::Pending));
    assert!(store.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn storage_outage_does_not_stop_polling() {
    let store = Arc::new(InMemoryMailStore::new());
    let id = seed(&store, "ada@example.com", now() - ChronoDuration::minutes(5)).await;
    let transport = StubTransport::ok();
    let scheduler = MailScheduler::new(store.clone(), transport.clone(), config(5, 5));

    store.set_available(false);
    scheduler.start().await.unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);
    assert!(scheduler.run_cycle().await.is_err());

    store.set_available(true);
    let report = scheduler.run_cycle().await.unwrap();
    scheduler.stop().await;

    assert_eq!(report.submitted, 1);
    assert_eq!(store.status(id), Some(MailStatus::Sent));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stopped_scheduler_can_be_restarted() {
    let store = Arc::new(InMemoryMailStore::new());
    let transport = StubTransport::ok();
    let scheduler = MailScheduler::new(store.clone(), transport.clone(), config(2, 5));

    scheduler.start().await.unwrap();
    scheduler.stop().await;
    scheduler.stop().await;
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    let id = seed(&store, "ada@example.com", now() - ChronoDuration::seconds(1)).await;
    scheduler.start().await.unwrap();
    scheduler.stop().await;

    assert_eq!(store.status(id), Some(MailStatus::Sent));
}
