use thiserror::Error;

use crate::jobs::types::SchedulerState;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Dispatch queue is full ({0} mail(s) waiting)")]
    QueueFull(usize),

    #[error("Dispatch executor is shut down")]
    ExecutorClosed,

    #[error("Scheduler cannot start while {0}")]
    InvalidState(SchedulerState),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<tokio_cron_scheduler::JobSchedulerError> for JobError {
    fn from(error: tokio_cron_scheduler::JobSchedulerError) -> Self {
        JobError::Scheduler(error.to_string())
    }
}

pub type JobResult<T> = Result<T, JobError>;
