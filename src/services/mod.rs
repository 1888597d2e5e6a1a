//! Service layer.
//!
//! `mailer` holds the delivery transports; `ScheduleService` is the
//! job-creation boundary in front of the mail store.

pub mod mailer;
mod schedule_service;

pub use schedule_service::{ScheduleMailRequest, ScheduleService};
