// kind.rs - Failure taxonomy shared by every state machine.
//
// Each crate keeps its own error enum, but all of them classify into these
// buckets so callers can decide uniformly whether to retry, re-prompt the
// user, or surface a degraded side effect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of an operation failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The record is not in a state that allows the operation. State unchanged.
    Precondition,
    /// The input was rejected before any state was touched.
    Validation,
    /// A concurrent writer got there first; re-read and retry.
    Conflict,
    /// The referenced record does not exist.
    NotFound,
    /// Persistence (or another collaborator) failed; the transition did not happen.
    Collaborator,
}

impl ErrorKind {
    /// Whether retrying the same request later could succeed without user input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::Collaborator)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Precondition => write!(f, "precondition"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Collaborator => write!(f, "collaborator"),
        }
    }
}
