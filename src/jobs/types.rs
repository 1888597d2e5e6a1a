use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};

/// Delivery status of a scheduled mail
///
/// `Pending` is the only state eligible for dispatch. `Sent` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::MailStatus")]
#[serde(rename_all = "UPPERCASE")]
pub enum MailStatus {
    Pending,
    Sent,
    Failed,
}

impl MailStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MailStatus::Sent | MailStatus::Failed)
    }

    /// Whether a row currently in `self` may be moved to `next`.
    ///
    /// Rewriting the same status is accepted so status writes stay idempotent.
    pub fn can_transition_to(&self, next: MailStatus) -> bool {
        *self == next || (*self == MailStatus::Pending && next.is_terminal())
    }
}

impl std::fmt::Display for MailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailStatus::Pending => write!(f, "PENDING"),
            MailStatus::Sent => write!(f, "SENT"),
            MailStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of a single dispatch task.
///
/// Every task produces one of these instead of propagating an error, so a
/// failing delivery never unwinds into sibling tasks or the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered and recorded as `SENT`
    Sent { id: i32 },
    /// Delivery failed and the job was recorded as `FAILED`
    Failed { id: i32, error: String },
    /// The status write after the attempt failed; the row is still `PENDING`
    StatusNotRecorded {
        id: i32,
        attempted: MailStatus,
        error: String,
    },
}

impl DispatchOutcome {
    pub fn id(&self) -> i32 {
        match self {
            DispatchOutcome::Sent { id }
            | DispatchOutcome::Failed { id, .. }
            | DispatchOutcome::StatusNotRecorded { id, .. } => *id,
        }
    }
}

/// Poll loop lifecycle: `Stopped → Running → Stopping → Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Stopped => write!(f, "stopped"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Stopping => write!(f, "stopping"),
        }
    }
}
