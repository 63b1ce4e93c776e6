// goal.rs - PerformanceGoal and its lifecycle transitions.
//
// The state machine:
//   not_started → in_progress → {overdue, completed, cancelled}
//   overdue → {in_progress (extension approved), completed, cancelled}
//   completed, cancelled: terminal
//
// Every transition method validates first and mutates second, so a failed
// call leaves the goal exactly as it was. All methods take `now` explicitly;
// nothing in here reads the clock.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;

const MS_PER_DAY: i64 = 86_400_000;

/// Ceiling of a signed millisecond span expressed in days.
///
/// `ceil_days(-3.4 days) == -3`, `ceil_days(3.4 days) == 4`.
pub fn ceil_days(ms: i64) -> i64 {
    -(-ms).div_euclid(MS_PER_DAY)
}

/// Midnight UTC at the start of `date`.
pub fn date_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// What the target is measured in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalUnit {
    Percentage,
    Count,
    Hours,
}

impl fmt::Display for GoalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalUnit::Percentage => write!(f, "percentage"),
            GoalUnit::Count => write!(f, "count"),
            GoalUnit::Hours => write!(f, "hours"),
        }
    }
}

impl std::str::FromStr for GoalUnit {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" | "percent" | "%" => Ok(GoalUnit::Percentage),
            "count" => Ok(GoalUnit::Count),
            "hours" => Ok(GoalUnit::Hours),
            other => Err(GoalError::invalid(
                "unit",
                format!("'{other}' is not one of percentage, count, hours"),
            )),
        }
    }
}

/// Lifecycle status of a goal.
///
/// `days_overdue` lives inside the `Overdue` variant, so it exists exactly
/// when the goal is overdue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Overdue { days_overdue: i64 },
    Completed,
    Cancelled,
}

impl GoalStatus {
    /// Stable name used in filters, events and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            GoalStatus::NotStarted => "not_started",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Overdue { .. } => "overdue",
            GoalStatus::Completed => "completed",
            GoalStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled goals never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Cancelled)
    }

    /// Statuses the overdue sweep is allowed to act on.
    pub fn is_sweep_eligible(&self) -> bool {
        matches!(self, GoalStatus::NotStarted | GoalStatus::InProgress)
    }

    pub fn days_overdue(&self) -> Option<i64> {
        match self {
            GoalStatus::Overdue { days_overdue } => Some(*days_overdue),
            _ => None,
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of an extension request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtensionDecision {
    /// Nobody has decided yet.
    Unset,
    Approved {
        approved_by: String,
        approved_date: DateTime<Utc>,
    },
    Rejected {
        rejected_by: String,
        rejection_reason: String,
        decided_date: DateTime<Utc>,
    },
}

impl ExtensionDecision {
    pub fn is_unset(&self) -> bool {
        matches!(self, ExtensionDecision::Unset)
    }
}

/// The latest deadline-extension request on a goal.
///
/// Present once the first request is made and kept afterwards so the
/// employee can see the outcome. A new request replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionRequest {
    pub requested_new_deadline: NaiveDate,
    pub request_reason: String,
    pub request_date: DateTime<Utc>,
    pub requested_by: String,
    pub decision: ExtensionDecision,
    /// Set once the employee has seen the decision.
    pub decision_acknowledged: bool,
}

impl ExtensionRequest {
    /// State name used in transition events.
    pub fn state_name(&self) -> &'static str {
        match (&self.decision, self.decision_acknowledged) {
            (ExtensionDecision::Unset, _) => "pending",
            (ExtensionDecision::Approved { .. }, false) => "approved",
            (ExtensionDecision::Rejected { .. }, false) => "rejected",
            (_, true) => "acknowledged",
        }
    }
}

/// What the approver decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionVerdict {
    Approve { approver_id: String },
    Reject { approver_id: String, reason: String },
}

impl ExtensionVerdict {
    pub fn approver_id(&self) -> &str {
        match self {
            ExtensionVerdict::Approve { approver_id } => approver_id,
            ExtensionVerdict::Reject { approver_id, .. } => approver_id,
        }
    }
}

/// Set once, when the goal is completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Completion {
    pub completed_date: DateTime<Utc>,
    pub days_to_complete: i64,
    /// Positive = finished early, negative = finished late.
    pub days_early_or_late: i64,
    pub completed_early: bool,
}

/// Input for creating a goal.
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub employee_id: String,
    pub title: String,
    pub description: String,
    pub unit: GoalUnit,
    pub target_value: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_by: String,
}

/// One tracked employee objective.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceGoal {
    pub goal_id: Uuid,
    pub employee_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,

    pub unit: GoalUnit,
    pub target_value: f64,
    pub current_value: f64,
    /// Derived from current/target; never set directly.
    pub progress: f64,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    pub status: GoalStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<ExtensionRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bumped by the store on every write; used for compare-and-swap.
    #[serde(default)]
    pub version: u64,
}

fn check_value(field: &'static str, value: f64) -> Result<(), GoalError> {
    if !value.is_finite() {
        return Err(GoalError::invalid(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(GoalError::invalid(field, "must not be negative"));
    }
    Ok(())
}

fn check_target(value: f64) -> Result<(), GoalError> {
    check_value("target_value", value)?;
    if value == 0.0 {
        return Err(GoalError::invalid("target_value", "must be greater than zero"));
    }
    Ok(())
}

fn non_empty(field: &'static str, value: &str) -> Result<String, GoalError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GoalError::invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

impl PerformanceGoal {
    /// Create a goal in `not_started` with no progress.
    pub fn new(input: NewGoal, now: DateTime<Utc>) -> Result<Self, GoalError> {
        check_target(input.target_value)?;
        let employee_id = non_empty("employee_id", &input.employee_id)?;
        let title = non_empty("title", &input.title)?;
        if input.end_date < input.start_date {
            return Err(GoalError::invalid(
                "end_date",
                format!(
                    "{} is before the start date {}",
                    input.end_date, input.start_date
                ),
            ));
        }

        Ok(Self {
            goal_id: Uuid::new_v4(),
            employee_id,
            title,
            description: input.description,
            unit: input.unit,
            target_value: input.target_value,
            current_value: 0.0,
            progress: 0.0,
            start_date: input.start_date,
            end_date: input.end_date,
            status: GoalStatus::NotStarted,
            extension: None,
            completion: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// The deadline as an instant (midnight UTC of `end_date`).
    pub fn deadline(&self) -> DateTime<Utc> {
        date_start(self.end_date)
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline()
    }

    /// An extension request exists and nobody has decided it yet.
    pub fn has_pending_extension(&self) -> bool {
        self.extension
            .as_ref()
            .is_some_and(|ext| ext.decision.is_unset())
    }

    /// A decision exists that the employee has not acknowledged.
    pub fn needs_acknowledgment(&self) -> bool {
        self.extension
            .as_ref()
            .is_some_and(|ext| !ext.decision.is_unset() && !ext.decision_acknowledged)
    }

    fn closed_error(&self) -> GoalError {
        GoalError::GoalClosed {
            goal_id: self.goal_id,
            status: self.status.to_string(),
        }
    }

    /// Record a progress update and detect completion.
    ///
    /// Returns `true` when this call completed the goal. Completion wins over
    /// `overdue`: a late but finished goal ends up `completed` with a
    /// negative `days_early_or_late`.
    pub fn apply_progress(
        &mut self,
        new_current_value: f64,
        new_target_value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<bool, GoalError> {
        if self.status.is_terminal() {
            return Err(self.closed_error());
        }
        check_value("current_value", new_current_value)?;
        let target = match new_target_value {
            Some(target) => {
                check_target(target)?;
                target
            }
            None => self.target_value,
        };

        let progress = new_current_value / target * 100.0;

        self.current_value = new_current_value;
        self.target_value = target;
        self.updated_at = now;

        if progress >= 100.0 {
            let days_early_or_late = ceil_days((self.deadline() - now).num_milliseconds());
            self.progress = 100.0;
            self.status = GoalStatus::Completed;
            self.completion = Some(Completion {
                completed_date: now,
                days_to_complete: ceil_days((now - date_start(self.start_date)).num_milliseconds()),
                days_early_or_late,
                completed_early: days_early_or_late > 0,
            });
            return Ok(true);
        }

        self.progress = progress;
        if self.status == GoalStatus::NotStarted && new_current_value > 0.0 {
            self.status = GoalStatus::InProgress;
        }
        Ok(false)
    }

    /// Move a past-deadline goal to `overdue`. Returns the computed days overdue.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<i64, GoalError> {
        if !self.status.is_sweep_eligible() {
            return Err(GoalError::NotEligibleForOverdue {
                goal_id: self.goal_id,
                status: self.status.to_string(),
            });
        }
        if !self.is_past_deadline(now) {
            return Err(GoalError::NotYetDue {
                goal_id: self.goal_id,
                end_date: self.end_date,
            });
        }

        let days_overdue = ceil_days((now - self.deadline()).num_milliseconds().abs());
        self.status = GoalStatus::Overdue { days_overdue };
        self.updated_at = now;
        Ok(days_overdue)
    }

    /// Recount `days_overdue` on a goal that is already overdue.
    ///
    /// Returns `true` if the count grew. The count never goes down, so a
    /// clock that lags the last sweep leaves the goal untouched.
    pub fn refresh_overdue(&mut self, now: DateTime<Utc>) -> Result<bool, GoalError> {
        let GoalStatus::Overdue { days_overdue } = self.status else {
            return Err(GoalError::NotOverdue {
                goal_id: self.goal_id,
                status: self.status.to_string(),
            });
        };
        if !self.is_past_deadline(now) {
            return Ok(false);
        }
        let recounted = ceil_days((now - self.deadline()).num_milliseconds());
        if recounted <= days_overdue {
            return Ok(false);
        }
        self.status = GoalStatus::Overdue {
            days_overdue: recounted,
        };
        self.updated_at = now;
        Ok(true)
    }

    /// Ask for a new deadline on an overdue goal.
    ///
    /// Any earlier decision is discarded: the new request starts undecided
    /// and unacknowledged.
    pub fn request_extension(
        &mut self,
        new_deadline: NaiveDate,
        reason: &str,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GoalError> {
        if !matches!(self.status, GoalStatus::Overdue { .. }) {
            return Err(GoalError::ExtensionRequiresOverdue {
                goal_id: self.goal_id,
                status: self.status.to_string(),
            });
        }
        if self.has_pending_extension() {
            return Err(GoalError::ExtensionAlreadyPending {
                goal_id: self.goal_id,
            });
        }
        if date_start(new_deadline) <= now {
            return Err(GoalError::DeadlineNotInFuture {
                goal_id: self.goal_id,
                deadline: new_deadline,
            });
        }
        let reason = non_empty("reason", reason)?;
        let requested_by = non_empty("requested_by", requested_by)?;

        self.extension = Some(ExtensionRequest {
            requested_new_deadline: new_deadline,
            request_reason: reason,
            request_date: now,
            requested_by,
            decision: ExtensionDecision::Unset,
            decision_acknowledged: false,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Approve or reject the pending extension request.
    ///
    /// Approval moves the deadline and returns the goal to `in_progress`.
    /// Rejection leaves it `overdue` with its days-overdue count untouched.
    pub fn decide_extension(
        &mut self,
        verdict: ExtensionVerdict,
        now: DateTime<Utc>,
    ) -> Result<(), GoalError> {
        if self.status.is_terminal() {
            return Err(self.closed_error());
        }
        let goal_id = self.goal_id;
        let Some(ext) = self.extension.as_mut().filter(|ext| ext.decision.is_unset()) else {
            return Err(GoalError::NoPendingExtension { goal_id });
        };

        match verdict {
            ExtensionVerdict::Approve { approver_id } => {
                let approver_id = non_empty("approver_id", &approver_id)?;
                ext.decision = ExtensionDecision::Approved {
                    approved_by: approver_id,
                    approved_date: now,
                };
                self.end_date = ext.requested_new_deadline;
                self.status = GoalStatus::InProgress;
            }
            ExtensionVerdict::Reject {
                approver_id,
                reason,
            } => {
                let approver_id = non_empty("approver_id", &approver_id)?;
                let reason = non_empty("rejection_reason", &reason)?;
                ext.decision = ExtensionDecision::Rejected {
                    rejected_by: approver_id,
                    rejection_reason: reason,
                    decided_date: now,
                };
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// Latch that the employee has seen the extension decision.
    pub fn acknowledge_decision(&mut self, now: DateTime<Utc>) -> Result<(), GoalError> {
        let goal_id = self.goal_id;
        let ext = match self.extension.as_mut() {
            Some(ext) if !ext.decision.is_unset() => ext,
            _ => return Err(GoalError::NoDecisionToAcknowledge { goal_id }),
        };
        if ext.decision_acknowledged {
            return Err(GoalError::DecisionAlreadyAcknowledged { goal_id });
        }
        ext.decision_acknowledged = true;
        self.updated_at = now;
        Ok(())
    }

    /// Cancel the goal. Returns `false` if it was already cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<bool, GoalError> {
        match self.status {
            GoalStatus::Cancelled => Ok(false),
            GoalStatus::Completed => Err(self.closed_error()),
            _ => {
                self.status = GoalStatus::Cancelled;
                self.updated_at = now;
                Ok(true)
            }
        }
    }
}
