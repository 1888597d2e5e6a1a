//! Job-creation boundary.
//!
//! Validates scheduling requests and turns them into `PENDING` rows. Nothing
//! that fails validation here ever reaches the store.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::jobs::NewScheduledMail;
use crate::repositories::MailStore;

/// Request to send `message` to `email` at `send_at` (naive local time)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScheduleMailRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,

    pub send_at: NaiveDateTime,
}

impl ScheduleMailRequest {
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
            send_at,
        }
    }

    /// Surrounding whitespace is not part of any field
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            message: self.message.trim().to_string(),
            send_at: self.send_at,
        }
    }
}

#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn MailStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn MailStore>) -> Self {
        Self { store }
    }

    /// Validates and stores `request` against the local clock.
    pub async fn schedule(&self, request: ScheduleMailRequest) -> AppResult<i32> {
        self.schedule_at(request, Local::now().naive_local()).await
    }

    /// Validates and stores `request`, treating `now` as the caller's clock.
    ///
    /// # Errors
    /// - `AppError::Validation` for a blank name or message, an invalid
    ///   address, or a `send_at` earlier than `now`
    /// - `AppError::Storage` when the insert fails
    pub async fn schedule_at(&self, request: ScheduleMailRequest, now: NaiveDateTime) -> AppResult<i32> {
        let request = request.trimmed();
        request.validate()?;

        if request.send_at < now {
            return Err(AppError::validation(
                "send_at",
                format!("{} is in the past", request.send_at),
            ));
        }

        let mail = NewScheduledMail::new(request.name, request.email, request.message, request.send_at);
        let id = self.store.insert(mail).await?;

        tracing::info!(
            mail_id = id,
            send_at = %request.send_at,
            store = self.store.name(),
            "Mail scheduled"
        );

        Ok(id)
    }
}
