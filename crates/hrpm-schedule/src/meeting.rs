// meeting.rs - Meeting record and its approval state machine.
//
//   pending → approved → {cancelled, completed}
//   pending → {rejected, cancelled}
//
// Transitions here only touch the Meeting itself. Reserving and releasing
// the approver's availability happens in `booking.rs`, in the same store
// write as the status change.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::interval::{ClockTime, TimeInterval};

/// Default lead time before the start during which the join link opens.
pub const DEFAULT_JOIN_LEAD_MINUTES: i64 = 15;

/// Meeting lifecycle state. Review details live on the variant that needs them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MeetingStatus {
    Pending,
    Approved {
        reviewed_by: String,
        reviewed_at: DateTime<Utc>,
    },
    Rejected {
        reviewed_by: String,
        reviewed_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rejection_reason: Option<String>,
    },
    Cancelled {
        cancelled_by: String,
        cancelled_at: DateTime<Utc>,
    },
    Completed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
        completed_at: DateTime<Utc>,
    },
}

impl MeetingStatus {
    pub fn name(&self) -> &'static str {
        match self {
            MeetingStatus::Pending => "pending",
            MeetingStatus::Approved { .. } => "approved",
            MeetingStatus::Rejected { .. } => "rejected",
            MeetingStatus::Cancelled { .. } => "cancelled",
            MeetingStatus::Completed { .. } => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MeetingStatus::Rejected { .. }
                | MeetingStatus::Cancelled { .. }
                | MeetingStatus::Completed { .. }
        )
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a caller should show in place of the meeting link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "join", rename_all = "snake_case")]
pub enum JoinStatus {
    /// The meeting is not (or no longer) approved.
    NotApproved,
    /// Approved but nobody attached a link.
    NoLink,
    NotYetAvailable { opens_at: DateTime<Utc> },
    Joinable { link: String },
    Ended,
}

/// Input for requesting a meeting.
#[derive(Debug, Clone)]
pub struct MeetingRequest {
    pub employee_id: String,
    pub approver_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub start: ClockTime,
    pub duration_minutes: u32,
    pub link: Option<String>,
    pub requested_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meeting {
    pub meeting_id: Uuid,
    pub employee_id: String,
    /// Whose availability the meeting books.
    pub approver_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub interval: TimeInterval,
    #[serde(flatten)]
    pub status: MeetingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

fn required(field: &'static str, value: &str) -> Result<String, ScheduleError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ScheduleError::invalid(field, "must not be empty"));
    }
    Ok(value.to_string())
}

impl Meeting {
    /// Build a pending meeting from a request. Availability is checked by the caller.
    pub fn new(request: MeetingRequest, now: DateTime<Utc>) -> Result<Self, ScheduleError> {
        let interval = TimeInterval::starting_at(request.start, request.duration_minutes)?;
        if request.start.on(request.date) <= now {
            return Err(ScheduleError::MeetingInPast {
                date: request.date,
                start: request.start.to_string(),
            });
        }
        Ok(Self {
            meeting_id: Uuid::new_v4(),
            employee_id: required("employee_id", &request.employee_id)?,
            approver_id: required("approver_id", &request.approver_id)?,
            title: required("title", &request.title)?,
            date: request.date,
            interval,
            status: MeetingStatus::Pending,
            link: request.link.filter(|l| !l.trim().is_empty()),
            requested_by: required("requested_by", &request.requested_by)?,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.interval.start.on(self.date)
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.interval.end.on(self.date)
    }

    pub fn duration_minutes(&self) -> u32 {
        self.interval.duration_minutes()
    }

    fn illegal(&self, to: &'static str) -> ScheduleError {
        ScheduleError::InvalidTransition {
            meeting_id: self.meeting_id,
            from: self.status.name().to_string(),
            to,
        }
    }

    pub fn approve(&mut self, approver_id: &str, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        if self.status != MeetingStatus::Pending {
            return Err(self.illegal("approved"));
        }
        self.status = MeetingStatus::Approved {
            reviewed_by: required("approver_id", approver_id)?,
            reviewed_at: now,
        };
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(
        &mut self,
        approver_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        if self.status != MeetingStatus::Pending {
            return Err(self.illegal("rejected"));
        }
        self.status = MeetingStatus::Rejected {
            reviewed_by: required("approver_id", approver_id)?,
            reviewed_at: now,
            rejection_reason: reason.filter(|r| !r.trim().is_empty()),
        };
        self.updated_at = now;
        Ok(())
    }

    /// Cancel a pending or approved meeting. Returns `true` if it had been
    /// approved, meaning its reserved interval must be released.
    pub fn cancel(&mut self, actor_id: &str, now: DateTime<Utc>) -> Result<bool, ScheduleError> {
        let was_approved = match self.status {
            MeetingStatus::Pending => false,
            MeetingStatus::Approved { .. } => true,
            _ => return Err(self.illegal("cancelled")),
        };
        self.status = MeetingStatus::Cancelled {
            cancelled_by: required("actor_id", actor_id)?,
            cancelled_at: now,
        };
        self.updated_at = now;
        Ok(was_approved)
    }

    pub fn complete(&mut self, notes: Option<String>, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        if !matches!(self.status, MeetingStatus::Approved { .. }) {
            return Err(self.illegal("completed"));
        }
        self.status = MeetingStatus::Completed {
            notes: notes.filter(|n| !n.trim().is_empty()),
            completed_at: now,
        };
        self.updated_at = now;
        Ok(())
    }

    /// The link is actionable in `[start - lead, end]`.
    pub fn join_status(&self, now: DateTime<Utc>, lead: Duration) -> JoinStatus {
        match self.status {
            MeetingStatus::Approved { .. } => {}
            MeetingStatus::Completed { .. } => return JoinStatus::Ended,
            _ => return JoinStatus::NotApproved,
        }
        let Some(link) = &self.link else {
            return JoinStatus::NoLink;
        };
        let opens_at = self.scheduled_at() - lead;
        if now < opens_at {
            JoinStatus::NotYetAvailable { opens_at }
        } else if now > self.ends_at() {
            JoinStatus::Ended
        } else {
            JoinStatus::Joinable { link: link.clone() }
        }
    }
}
