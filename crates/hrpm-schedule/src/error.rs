// error.rs - Error types for availability and meeting scheduling.

use std::path::PathBuf;

use chrono::NaiveDate;
use hrpm_events::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("schedule store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("meeting not found: {0}")]
    MeetingNotFound(Uuid),

    #[error("availability rule not found: {0}")]
    RuleNotFound(Uuid),

    #[error("unavailability exception not found: {0}")]
    ExceptionNotFound(Uuid),

    /// A record with this ID already exists.
    #[error("record {0} already exists")]
    AlreadyExists(Uuid),

    /// A clock time is not a valid `HH:MM` between 00:00 and 24:00.
    #[error("invalid clock time '{value}': {reason}")]
    InvalidClockTime { value: String, reason: &'static str },

    /// Interval end is not after its start.
    #[error("invalid interval {start}-{end}: end must be after start")]
    InvalidInterval { start: String, end: String },

    #[error("invalid day of week {0}: expected 0 (Sunday) to 6 (Saturday)")]
    InvalidDayOfWeek(u8),

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// A meeting was requested for a time that has already started.
    #[error("meeting time {date} {start} is in the past")]
    MeetingInPast { date: NaiveDate, start: String },

    /// The requested time is not inside the approver's bookable slots.
    #[error("{owner_id} is not available on {date} during {interval}")]
    SlotUnavailable {
        owner_id: String,
        date: NaiveDate,
        interval: String,
    },

    /// The interval was taken by another booking or blackout in the meantime.
    #[error("{interval} on {date} is already blocked by exception {exception_id}")]
    SlotConflict {
        date: NaiveDate,
        interval: String,
        exception_id: Uuid,
    },

    /// Illegal meeting state transition.
    #[error("meeting {meeting_id} is {from} and cannot become {to}")]
    InvalidTransition {
        meeting_id: Uuid,
        from: String,
        to: &'static str,
    },

    /// Exceptions created by an approval are released by cancelling the meeting.
    #[error("exception {exception_id} reserves meeting {meeting_id}; cancel the meeting instead")]
    ExceptionOwnedByMeeting { exception_id: Uuid, meeting_id: Uuid },

    #[error("meeting {meeting_id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        meeting_id: Uuid,
        expected: u64,
        found: u64,
    },
}

impl ScheduleError {
    /// Classify this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::IoError { .. }
            | ScheduleError::SerializationError(_)
            | ScheduleError::StoreUnavailable(_) => ErrorKind::Collaborator,
            ScheduleError::MeetingNotFound(_)
            | ScheduleError::RuleNotFound(_)
            | ScheduleError::ExceptionNotFound(_) => ErrorKind::NotFound,
            ScheduleError::AlreadyExists(_)
            | ScheduleError::SlotConflict { .. }
            | ScheduleError::VersionConflict { .. } => ErrorKind::Conflict,
            ScheduleError::InvalidClockTime { .. }
            | ScheduleError::InvalidInterval { .. }
            | ScheduleError::InvalidDayOfWeek(_)
            | ScheduleError::InvalidInput { .. }
            | ScheduleError::MeetingInPast { .. } => ErrorKind::Validation,
            ScheduleError::SlotUnavailable { .. }
            | ScheduleError::InvalidTransition { .. }
            | ScheduleError::ExceptionOwnedByMeeting { .. } => ErrorKind::Precondition,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ScheduleError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
