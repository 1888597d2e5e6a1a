pub mod error;
pub mod executor;
pub mod models;
pub mod scheduler;
pub mod types;

pub use error::{JobError, JobResult};
pub use executor::{DispatchExecutor, ShutdownReport};
pub use models::{NewScheduledMail, ScheduledMail};
pub use scheduler::{CycleReport, MailScheduler};
pub use types::{DispatchOutcome, MailStatus, SchedulerState};
