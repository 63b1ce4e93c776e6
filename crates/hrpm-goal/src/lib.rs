//! # hrpm-goal
//!
//! Lifecycle engine for employee performance goals.
//!
//! A [`PerformanceGoal`] moves through
//! `not_started → in_progress → {overdue, completed, cancelled}`, with
//! `overdue → in_progress` only via an approved deadline extension.
//! Completion is never set directly: it is detected when a progress update
//! reaches the target.
//!
//! ## Key components
//!
//! - [`PerformanceGoal`]: the record and its transition methods
//! - [`GoalStore`]: persistence boundary with compare-and-swap writes,
//!   atomic batches and live subscriptions ([`MemoryGoalStore`],
//!   [`JsonGoalStore`])
//! - [`OverdueSweep`]: debounced batch job that marks past-deadline goals overdue
//! - [`GoalService`]: one request/response call per operation, emitting a
//!   [`hrpm_events::TransitionEvent`] for every committed transition
//!
//! All calendar dates are UTC; a date used as an instant means midnight UTC.

pub mod error;
pub mod goal;
pub mod service;
pub mod store;
pub mod summary;
pub mod sweep;

pub use error::GoalError;
pub use goal::{
    ceil_days, date_start, Completion, ExtensionDecision, ExtensionRequest, ExtensionVerdict,
    GoalStatus, GoalUnit, NewGoal, PerformanceGoal,
};
pub use service::{GoalService, ProgressOutcome};
pub use store::{
    BatchOutcome, ConditionalWrite, GoalFilter, GoalStore, JsonGoalStore, MemoryGoalStore,
};
pub use summary::GoalSummary;
pub use sweep::{OverdueSweep, SweepReport, SweepScope, DEFAULT_SWEEP_COOLDOWN_SECS};
