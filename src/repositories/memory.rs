use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};

use crate::error::StorageError;
use crate::jobs::models::{NewScheduledMail, ScheduledMail};
use crate::jobs::types::MailStatus;
use crate::repositories::mail_store::{MailStore, retain_deliverable};

/// Process-local [`MailStore`] with the same semantics as the PostgreSQL one.
///
/// `set_available(false)` makes every call fail with
/// [`StorageError::Unavailable`] until it is switched back on.
pub struct InMemoryMailStore {
    rows: Mutex<Rows>,
    available: AtomicBool,
    closed: AtomicBool,
}

#[derive(Default)]
struct Rows {
    next_id: i32,
    by_id: BTreeMap<i32, ScheduledMail>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Rows::default()),
            available: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current row for `id`, regardless of availability
    pub fn get(&self, id: i32) -> Option<ScheduledMail> {
        self.lock().ok()?.by_id.get(&id).cloned()
    }

    pub fn status(&self, id: i32) -> Option<MailStatus> {
        self.get(id).map(|mail| mail.status)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|rows| rows.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Rows>, StorageError> {
        self.rows
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store closed".to_string()));
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailStore for InMemoryMailStore {
    async fn insert(&self, mail: NewScheduledMail) -> Result<i32, StorageError> {
        self.check_available()?;
        let mut rows = self.lock()?;

        rows.next_id += 1;
        let id = rows.next_id;
        rows.by_id.insert(
            id,
            ScheduledMail {
                id,
                name: mail.name,
                email: mail.email,
                message: mail.message,
                send_date: mail.send_date,
                send_time: mail.send_time,
                status: mail.status,
                created_at: Local::now().naive_local(),
            },
        );

        Ok(id)
    }

    async fn fetch_due(&self, now: NaiveDateTime) -> Result<Vec<ScheduledMail>, StorageError> {
        self.check_available()?;

        let mut due: Vec<ScheduledMail> = self
            .lock()?
            .by_id
            .values()
            .filter(|mail| mail.is_due(now) && !mail.email.trim().is_empty())
            .cloned()
            .collect();
        due.sort_by_key(|mail| (mail.send_at(), mail.id));

        Ok(retain_deliverable(due))
    }

    async fn update_status(&self, id: i32, status: MailStatus) -> Result<(), StorageError> {
        self.check_available()?;
        let mut rows = self.lock()?;

        match rows.by_id.get_mut(&id) {
            Some(mail) if mail.status.can_transition_to(status) => mail.status = status,
            Some(mail) => {
                tracing::debug!(mail_id = id, current = %mail.status, requested = %status, "Ignoring status write on terminal row");
            }
            None => tracing::debug!(mail_id = id, "Ignoring status write for unknown id"),
        }

        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(rows = self.len(), "Closing in-memory mail store");
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
