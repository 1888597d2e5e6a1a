//! Repository layer for scheduled mail.
//!
//! [`MailStore`] is the seam the scheduler depends on; the PostgreSQL
//! repository is used in production and the in-memory store in tests.

mod mail_store;
mod memory;
mod scheduled_mail_repo;

pub use mail_store::MailStore;
pub use memory::InMemoryMailStore;
pub use scheduled_mail_repo::ScheduledMailRepository;
