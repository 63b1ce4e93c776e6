// error.rs - Error types for the goal lifecycle.
//
// Every precondition gets its own variant so the caller can tell the user
// exactly which rule blocked the operation.

use std::path::PathBuf;

use chrono::NaiveDate;
use hrpm_events::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during goal lifecycle operations.
#[derive(Debug, Error)]
pub enum GoalError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize goal data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The store backend failed for a reason other than I/O.
    #[error("goal store unavailable: {0}")]
    StoreUnavailable(String),

    /// The requested goal was not found.
    #[error("goal not found: {0}")]
    NotFound(Uuid),

    /// A goal with this ID already exists.
    #[error("goal {0} already exists")]
    AlreadyExists(Uuid),

    /// An input value was rejected before anything changed.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// A requested extension deadline is not in the future.
    #[error("requested deadline {deadline} for goal {goal_id} must be after today")]
    DeadlineNotInFuture { goal_id: Uuid, deadline: NaiveDate },

    /// Completed and cancelled goals accept no further changes.
    #[error("goal {goal_id} is {status} and can no longer be changed")]
    GoalClosed { goal_id: Uuid, status: String },

    /// Only not-started or in-progress goals can be marked overdue.
    #[error("goal {goal_id} is {status}; only not_started or in_progress goals can become overdue")]
    NotEligibleForOverdue { goal_id: Uuid, status: String },

    /// The goal's deadline has not passed yet.
    #[error("goal {goal_id} is not past its deadline of {end_date}")]
    NotYetDue { goal_id: Uuid, end_date: NaiveDate },

    /// Only overdue goals have a day count to refresh.
    #[error("goal {goal_id} is {status}, not overdue")]
    NotOverdue { goal_id: Uuid, status: String },

    /// Extensions can only be requested on overdue goals.
    #[error("goal {goal_id} is {status}; an extension can only be requested once it is overdue")]
    ExtensionRequiresOverdue { goal_id: Uuid, status: String },

    /// An earlier request is still waiting for a decision.
    #[error("cannot request another extension for goal {goal_id} until the current one is decided")]
    ExtensionAlreadyPending { goal_id: Uuid },

    /// There is no undecided extension request to decide on.
    #[error("goal {goal_id} has no extension request awaiting a decision")]
    NoPendingExtension { goal_id: Uuid },

    /// There is no decided extension request to acknowledge.
    #[error("goal {goal_id} has no extension decision to acknowledge")]
    NoDecisionToAcknowledge { goal_id: Uuid },

    /// The latest extension decision was already acknowledged.
    #[error("the extension decision on goal {goal_id} was already acknowledged")]
    DecisionAlreadyAcknowledged { goal_id: Uuid },

    /// Someone else updated the goal since it was read.
    #[error("goal {goal_id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        goal_id: Uuid,
        expected: u64,
        found: u64,
    },
}

impl GoalError {
    /// Classify this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GoalError::IoError { .. }
            | GoalError::SerializationError(_)
            | GoalError::StoreUnavailable(_) => ErrorKind::Collaborator,
            GoalError::NotFound(_) => ErrorKind::NotFound,
            GoalError::AlreadyExists(_) | GoalError::VersionConflict { .. } => ErrorKind::Conflict,
            GoalError::InvalidInput { .. } | GoalError::DeadlineNotInFuture { .. } => {
                ErrorKind::Validation
            }
            GoalError::GoalClosed { .. }
            | GoalError::NotEligibleForOverdue { .. }
            | GoalError::NotYetDue { .. }
            | GoalError::NotOverdue { .. }
            | GoalError::ExtensionRequiresOverdue { .. }
            | GoalError::ExtensionAlreadyPending { .. }
            | GoalError::NoPendingExtension { .. }
            | GoalError::NoDecisionToAcknowledge { .. }
            | GoalError::DecisionAlreadyAcknowledged { .. } => ErrorKind::Precondition,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        GoalError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
