use async_trait::async_trait;
use chrono::NaiveDateTime;
use validator::ValidateEmail;

use crate::error::StorageError;
use crate::jobs::models::{NewScheduledMail, ScheduledMail};
use crate::jobs::types::MailStatus;

/// Durable storage of scheduled mail.
///
/// `fetch_due` is a plain snapshot: nothing is claimed, so a job whose status
/// write has not landed yet is returned again by the next call. The poll loop
/// relies on the interval being much longer than a delivery to keep that
/// window small.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Persist a new job as `PENDING` and return its id
    async fn insert(&self, mail: NewScheduledMail) -> Result<i32, StorageError>;

    /// All `PENDING` jobs with `send_at <= now`, oldest first (ties by id).
    ///
    /// Rows with a blank email are excluded and rows with a malformed address
    /// are skipped with a warning.
    async fn fetch_due(&self, now: NaiveDateTime) -> Result<Vec<ScheduledMail>, StorageError>;

    /// Move a job out of `PENDING`.
    ///
    /// Unknown ids, rows already in `status` and rows in another terminal
    /// status are left untouched without error.
    async fn update_status(&self, id: i32, status: MailStatus) -> Result<(), StorageError>;

    /// Release the underlying connections. Later calls fail with
    /// `StorageError::Unavailable`.
    async fn close(&self) {}

    fn name(&self) -> &'static str;
}

/// Drops rows whose address does not parse, logging each one.
pub(crate) fn retain_deliverable(rows: Vec<ScheduledMail>) -> Vec<ScheduledMail> {
    rows.into_iter()
        .filter(|mail| {
            let valid = mail.email.validate_email();
            if !valid {
                tracing::warn!(
                    mail_id = mail.id,
                    recipient = %mail.email,
                    "Skipping scheduled mail with invalid recipient address"
                );
            }
            valid
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(id: i32, email: &str) -> ScheduledMail {
        let send_at = NaiveDateTime::parse_from_str("2025-01-01 08:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        ScheduledMail {
            id,
            name: "Ada".to_string(),
            email: email.to_string(),
            message: "hello".to_string(),
            send_date: send_at.date(),
            send_time: send_at.time(),
            status: MailStatus::Pending,
            created_at: send_at,
        }
    }

    #[test]
    fn test_retain_deliverable_skips_malformed_addresses() {
        let rows = vec![
            mail(1, "ada@example.com"),
            mail(2, "not-an-address"),
            mail(3, "bob@example.org"),
            mail(4, "@example.com"),
        ];

        let ids: Vec<i32> = retain_deliverable(rows).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
