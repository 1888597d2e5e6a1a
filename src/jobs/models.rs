use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;

use crate::jobs::types::MailStatus;
use crate::schema::scheduled_mail;

// ============================================================================
// ScheduledMail Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = scheduled_mail)]
pub struct ScheduledMail {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub message: String,
    pub send_date: NaiveDate,
    pub send_time: NaiveTime,
    pub status: MailStatus,
    pub created_at: NaiveDateTime,
}

impl ScheduledMail {
    /// The point in time at which this mail becomes eligible for dispatch
    pub fn send_at(&self) -> NaiveDateTime {
        self.send_date.and_time(self.send_time)
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.status == MailStatus::Pending && self.send_at() <= now
    }

    pub fn subject(&self) -> String {
        format!("Scheduled Message for {}", self.name)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scheduled_mail)]
pub struct NewScheduledMail {
    pub name: String,
    pub email: String,
    pub message: String,
    pub send_date: NaiveDate,
    pub send_time: NaiveTime,
    pub status: MailStatus,
}

impl NewScheduledMail {
    /// Builds a `PENDING` row, splitting `send_at` into the stored date and time columns.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        message: impl Into<String>,
        send_at: NaiveDateTime,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            message: message.into(),
            send_date: send_at.date(),
            send_time: send_at.time(),
            status: MailStatus::Pending,
        }
    }

    pub fn send_at(&self) -> NaiveDateTime {
        self.send_date.and_time(self.send_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_new_mail_splits_send_at() {
        let mail = NewScheduledMail::new("Ada", "ada@example.com", "hi", at("2025-03-04 05:06:07"));
        assert_eq!(mail.send_date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(mail.send_time, NaiveTime::from_hms_opt(5, 6, 7).unwrap());
        assert_eq!(mail.status, MailStatus::Pending);
        assert_eq!(mail.send_at(), at("2025-03-04 05:06:07"));
    }

    #[test]
    fn test_is_due() {
        let send_at = at("2025-03-04 05:06:07");
        let mail = ScheduledMail {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            message: "hi".to_string(),
            send_date: send_at.date(),
            send_time: send_at.time(),
            status: MailStatus::Pending,
            created_at: send_at,
        };

        assert!(mail.is_due(send_at));
        assert!(mail.is_due(send_at + Duration::seconds(1)));
        assert!(!mail.is_due(send_at - Duration::seconds(1)));

        let sent = ScheduledMail {
            status: MailStatus::Sent,
            ..mail.clone()
        };
        assert!(!sent.is_due(send_at + Duration::days(1)));
        assert_eq!(mail.subject(), "Scheduled Message for Ada");
    }
}
