// booking.rs - SchedulingService: meeting use cases that span availability.
//
// Approving a meeting reserves its interval, and cancelling an approved
// meeting releases it. Both are a single store commit together with the
// status change, so no caller has to remember the second step.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use hrpm_events::{EntityType, EventDispatcher, TransitionEvent};
use uuid::Uuid;

use crate::availability::{AvailabilityEngine, UnavailabilityException};
use crate::error::ScheduleError;
use crate::interval::{covers, TimeInterval};
use crate::meeting::{JoinStatus, Meeting, MeetingRequest, MeetingStatus, DEFAULT_JOIN_LEAD_MINUTES};
use crate::store::{ScheduleBatch, ScheduleStore};

/// Filter for listing meetings. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingFilter {
    pub employee_id: Option<String>,
    pub approver_id: Option<String>,
    pub statuses: Vec<String>,
}

impl MeetingFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_employee(employee_id: impl Into<String>) -> Self {
        Self {
            employee_id: Some(employee_id.into()),
            ..Self::default()
        }
    }

    pub fn for_approver(approver_id: impl Into<String>) -> Self {
        Self {
            approver_id: Some(approver_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.statuses.push(status.into());
        self
    }

    pub fn matches(&self, meeting: &Meeting) -> bool {
        self.employee_id
            .as_ref()
            .map_or(true, |id| &meeting.employee_id == id)
            && self
                .approver_id
                .as_ref()
                .map_or(true, |id| &meeting.approver_id == id)
            && (self.statuses.is_empty()
                || self.statuses.iter().any(|s| s == meeting.status.name()))
    }
}

/// Request/response entry point for meetings and availability.
pub struct SchedulingService<S: ScheduleStore + ?Sized> {
    store: Arc<S>,
    availability: AvailabilityEngine<S>,
    dispatcher: EventDispatcher,
    join_lead: Duration,
}

impl<S: ScheduleStore + ?Sized> SchedulingService<S> {
    pub fn new(store: Arc<S>, dispatcher: EventDispatcher) -> Self {
        Self {
            availability: AvailabilityEngine::new(store.clone()),
            store,
            dispatcher,
            join_lead: Duration::minutes(DEFAULT_JOIN_LEAD_MINUTES),
        }
    }

    /// Override how early the join link opens.
    pub fn with_join_lead(mut self, lead: Duration) -> Self {
        self.join_lead = lead;
        self
    }

    /// Rule and blackout management.
    pub fn availability(&self) -> &AvailabilityEngine<S> {
        &self.availability
    }

    /// Current bookable slots for `owner_id` on `date`.
    pub fn slots(&self, owner_id: &str, date: NaiveDate) -> Result<Vec<TimeInterval>, ScheduleError> {
        self.availability.slots_for(owner_id, date)
    }

    pub fn get_meeting(&self, meeting_id: Uuid) -> Result<Meeting, ScheduleError> {
        self.store
            .load()?
            .meeting(meeting_id)
            .cloned()
            .ok_or(ScheduleError::MeetingNotFound(meeting_id))
    }

    /// Meetings matching `filter`, earliest first.
    pub fn list_meetings(&self, filter: &MeetingFilter) -> Result<Vec<Meeting>, ScheduleError> {
        let mut meetings: Vec<Meeting> = self
            .store
            .load()?
            .meetings
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        meetings.sort_by(|a, b| {
            (a.date, a.interval.start, a.created_at).cmp(&(b.date, b.interval.start, b.created_at))
        });
        Ok(meetings)
    }

    /// Create a pending meeting inside the approver's current free slots.
    pub fn request_meeting(
        &self,
        request: MeetingRequest,
        now: DateTime<Utc>,
    ) -> Result<Meeting, ScheduleError> {
        let meeting = Meeting::new(request, now)?;
        let doc = self.store.load()?;
        let slots = doc.slots_for(&meeting.approver_id, meeting.date);
        if !covers(&slots, &meeting.interval) {
            return Err(ScheduleError::SlotUnavailable {
                owner_id: meeting.approver_id.clone(),
                date: meeting.date,
                interval: meeting.interval.to_string(),
            });
        }

        self.store
            .commit(ScheduleBatch::new().insert_meeting(meeting.clone()))?;
        tracing::info!(
            meeting_id = %meeting.meeting_id,
            employee = %meeting.employee_id,
            approver = %meeting.approver_id,
            date = %meeting.date,
            interval = %meeting.interval,
            "meeting requested"
        );
        self.get_meeting(meeting.meeting_id)
    }

    /// Load, transition, commit with any extra ops, notify.
    fn transition(
        &self,
        meeting_id: Uuid,
        actor_id: &str,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut Meeting) -> Result<ScheduleBatch, ScheduleError>,
    ) -> Result<Meeting, ScheduleError> {
        let before = self.get_meeting(meeting_id)?;
        let mut meeting = before.clone();
        let extra = op(&mut meeting)?;

        self.store.commit(
            ScheduleBatch::new()
                .update_meeting(meeting, before.version)
                .append(extra),
        )?;

        let after = self.get_meeting(meeting_id)?;
        let event = TransitionEvent::new(
            EntityType::Meeting,
            meeting_id,
            before.status.name(),
            after.status.name(),
            actor_id,
            now,
        );
        tracing::info!(meeting_id = %meeting_id, actor = actor_id, "{}", event.label());
        self.dispatcher.dispatch(&event);
        Ok(after)
    }

    /// Approve a pending meeting and reserve its interval.
    ///
    /// Fails with `SlotConflict` if another reservation or blackout now
    /// overlaps the interval; the meeting then stays pending.
    pub fn approve(
        &self,
        meeting_id: Uuid,
        approver_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Meeting, ScheduleError> {
        self.transition(meeting_id, approver_id, now, |meeting| {
            meeting.approve(approver_id, now)?;
            let mut reservation = UnavailabilityException::new(
                &meeting.approver_id,
                meeting.date,
                meeting.interval,
                Some(format!("meeting: {}", meeting.title)),
                now,
            );
            reservation.meeting_id = Some(meeting.meeting_id);
            Ok(ScheduleBatch::new().reserve(reservation))
        })
    }

    pub fn reject(
        &self,
        meeting_id: Uuid,
        approver_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Meeting, ScheduleError> {
        self.transition(meeting_id, approver_id, now, |meeting| {
            meeting.reject(approver_id, reason, now)?;
            Ok(ScheduleBatch::new())
        })
    }

    /// Cancel a pending or approved meeting, releasing any reservation.
    pub fn cancel(
        &self,
        meeting_id: Uuid,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Meeting, ScheduleError> {
        self.transition(meeting_id, actor_id, now, |meeting| {
            let batch = ScheduleBatch::new();
            if meeting.cancel(actor_id, now)? {
                Ok(batch.release_meeting(meeting.meeting_id))
            } else {
                Ok(batch)
            }
        })
    }

    pub fn complete(
        &self,
        meeting_id: Uuid,
        actor_id: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Meeting, ScheduleError> {
        self.transition(meeting_id, actor_id, now, |meeting| {
            meeting.complete(notes, now)?;
            Ok(ScheduleBatch::new())
        })
    }

    pub fn join_status(&self, meeting_id: Uuid, now: DateTime<Utc>) -> Result<JoinStatus, ScheduleError> {
        Ok(self.get_meeting(meeting_id)?.join_status(now, self.join_lead))
    }

    /// Approved meetings for an approver on `date`.
    pub fn agenda(&self, approver_id: &str, date: NaiveDate) -> Result<Vec<Meeting>, ScheduleError> {
        Ok(self
            .list_meetings(&MeetingFilter::for_approver(approver_id))?
            .into_iter()
            .filter(|m| m.date == date && matches!(m.status, MeetingStatus::Approved { .. }))
            .collect())
    }
}
