// availability.rs - Recurring weekly availability minus dated exceptions.
//
// `compute_slots` is the pure core. `AvailabilityEngine` wraps it with the
// rule/exception CRUD an approver needs, persisting through a ScheduleStore.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::interval::{generate_slots, TimeInterval, SLOT_MINUTES};
use crate::store::{ScheduleBatch, ScheduleStore};

/// 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// One recurring weekly window during which `owner_id` is bookable.
///
/// Immutable once created; edits are delete + recreate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityRule {
    pub rule_id: Uuid,
    pub owner_id: String,
    pub day_of_week: u8,
    pub interval: TimeInterval,
    pub created_at: DateTime<Utc>,
}

impl AvailabilityRule {
    pub fn new(
        owner_id: &str,
        day_of_week: u8,
        interval: TimeInterval,
        now: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        if day_of_week > 6 {
            return Err(ScheduleError::InvalidDayOfWeek(day_of_week));
        }
        if owner_id.trim().is_empty() {
            return Err(ScheduleError::invalid("owner_id", "must not be empty"));
        }
        Ok(Self {
            rule_id: Uuid::new_v4(),
            owner_id: owner_id.trim().to_string(),
            day_of_week,
            interval,
            created_at: now,
        })
    }
}

/// A date-bound block carved out of the owner's availability.
///
/// Created by hand (vacation, blackout) or by approving a meeting, in which
/// case `meeting_id` links it back so cancellation can release it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnavailabilityException {
    pub exception_id: Uuid,
    pub owner_id: String,
    pub date: NaiveDate,
    pub interval: TimeInterval,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl UnavailabilityException {
    pub fn new(
        owner_id: &str,
        date: NaiveDate,
        interval: TimeInterval,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            exception_id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            date,
            interval,
            reason: reason.filter(|r| !r.trim().is_empty()),
            meeting_id: None,
            created_at: now,
        }
    }

    /// Whether this exception blocks `interval` on `date` for the same owner.
    pub fn blocks(&self, owner_id: &str, date: NaiveDate, interval: &TimeInterval) -> bool {
        self.owner_id == owner_id && self.date == date && self.interval.overlaps(interval)
    }
}

/// Bookable slots on `date`, start-ascending.
///
/// Only rules for the date's weekday contribute. Candidates that overlap any
/// exception on that date are dropped; identical slots from overlapping rules
/// appear once. The caller passes rules and exceptions of a single owner.
pub fn compute_slots(
    rules: &[AvailabilityRule],
    exceptions: &[UnavailabilityException],
    date: NaiveDate,
) -> Vec<TimeInterval> {
    let weekday = day_of_week(date);
    let blocked: Vec<&TimeInterval> = exceptions
        .iter()
        .filter(|e| e.date == date)
        .map(|e| &e.interval)
        .collect();

    let mut slots: Vec<TimeInterval> = rules
        .iter()
        .filter(|r| r.day_of_week == weekday)
        .flat_map(|r| generate_slots(&r.interval, SLOT_MINUTES))
        .filter(|slot| !blocked.iter().any(|b| slot.overlaps(b)))
        .collect();
    slots.sort();
    slots.dedup();
    slots
}

/// Rule and exception management for approvers.
pub struct AvailabilityEngine<S: ScheduleStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ScheduleStore + ?Sized> AvailabilityEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Add a recurring rule. Rules on the same day are additive.
    pub fn add_rule(
        &self,
        owner_id: &str,
        day_of_week: u8,
        interval: TimeInterval,
        now: DateTime<Utc>,
    ) -> Result<AvailabilityRule, ScheduleError> {
        let rule = AvailabilityRule::new(owner_id, day_of_week, interval, now)?;
        self.store.commit(ScheduleBatch::new().put_rule(rule.clone()))?;
        tracing::info!(rule_id = %rule.rule_id, owner = %rule.owner_id, day = day_of_week, interval = %interval, "availability rule added");
        Ok(rule)
    }

    pub fn remove_rule(&self, rule_id: Uuid) -> Result<(), ScheduleError> {
        self.store.commit(ScheduleBatch::new().delete_rule(rule_id))?;
        tracing::info!(rule_id = %rule_id, "availability rule removed");
        Ok(())
    }

    /// Record a manual blackout on `date`.
    pub fn block_exception(
        &self,
        owner_id: &str,
        date: NaiveDate,
        interval: TimeInterval,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<UnavailabilityException, ScheduleError> {
        if owner_id.trim().is_empty() {
            return Err(ScheduleError::invalid("owner_id", "must not be empty"));
        }
        let exception = UnavailabilityException::new(owner_id.trim(), date, interval, reason, now);
        self.store
            .commit(ScheduleBatch::new().put_exception(exception.clone()))?;
        tracing::info!(exception_id = %exception.exception_id, owner = %exception.owner_id, %date, interval = %interval, "availability blocked");
        Ok(exception)
    }

    /// Remove a manual blackout. Meeting reservations are released by
    /// cancelling the meeting instead.
    pub fn remove_exception(&self, exception_id: Uuid) -> Result<(), ScheduleError> {
        let doc = self.store.load()?;
        let exception = doc
            .exceptions
            .iter()
            .find(|e| e.exception_id == exception_id)
            .ok_or(ScheduleError::ExceptionNotFound(exception_id))?;
        if let Some(meeting_id) = exception.meeting_id {
            return Err(ScheduleError::ExceptionOwnedByMeeting {
                exception_id,
                meeting_id,
            });
        }
        self.store
            .commit(ScheduleBatch::new().delete_exception(exception_id))?;
        tracing::info!(exception_id = %exception_id, "availability exception removed");
        Ok(())
    }

    pub fn rules(&self, owner_id: &str) -> Result<Vec<AvailabilityRule>, ScheduleError> {
        let mut rules: Vec<AvailabilityRule> = self
            .store
            .load()?
            .rules
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect();
        rules.sort_by_key(|r| (r.day_of_week, r.interval));
        Ok(rules)
    }

    pub fn exceptions(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<UnavailabilityException>, ScheduleError> {
        let mut exceptions: Vec<UnavailabilityException> = self
            .store
            .load()?
            .exceptions
            .into_iter()
            .filter(|e| e.owner_id == owner_id && e.date == date)
            .collect();
        exceptions.sort_by_key(|e| e.interval);
        Ok(exceptions)
    }

    /// Current bookable slots for `owner_id` on `date`.
    pub fn slots_for(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeInterval>, ScheduleError> {
        let doc = self.store.load()?;
        Ok(doc.slots_for(owner_id, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryScheduleStore;
    use chrono::TimeZone;

    fn iv(start: &str, end: &str) -> TimeInterval {
        TimeInterval::new(start.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    fn rule(day: u8, start: &str, end: &str) -> AvailabilityRule {
        AvailabilityRule::new("mgr-1", day, iv(start, end), now()).unwrap()
    }

    fn exception(date: NaiveDate, start: &str, end: &str) -> UnavailabilityException {
        UnavailabilityException::new("mgr-1", date, iv(start, end), None, now())
    }

    #[test]
    fn sunday_is_zero() {
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()), 0);
        assert_eq!(day_of_week(monday()), 1);
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 1, 11).unwrap()), 6);
    }

    #[test]
    fn monday_hour_yields_two_slots() {
        let slots = compute_slots(&[rule(1, "09:00", "10:00")], &[], monday());
        assert_eq!(slots, vec![iv("09:00", "09:30"), iv("09:30", "10:00")]);
    }

    #[test]
    fn exception_straddling_both_slots_removes_both() {
        let slots = compute_slots(
            &[rule(1, "09:00", "10:00")],
            &[exception(monday(), "09:15", "09:45")],
            monday(),
        );
        assert!(slots.is_empty());
    }

    #[test]
    fn exceptions_on_other_dates_are_ignored() {
        let slots = compute_slots(
            &[rule(1, "09:00", "10:00")],
            &[exception(monday() + chrono::Duration::days(7), "09:00", "10:00")],
            monday(),
        );
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn other_weekdays_and_no_rules_yield_nothing() {
        assert!(compute_slots(&[rule(2, "09:00", "10:00")], &[], monday()).is_empty());
        assert!(compute_slots(&[], &[], monday()).is_empty());
    }

    #[test]
    fn overlapping_rules_are_additive_and_deduplicated() {
        let slots = compute_slots(
            &[rule(1, "10:00", "11:00"), rule(1, "09:00", "10:30"), rule(1, "09:00", "09:30")],
            &[],
            monday(),
        );
        assert_eq!(
            slots,
            vec![
                iv("09:00", "09:30"),
                iv("09:30", "10:00"),
                iv("10:00", "10:30"),
                iv("10:30", "11:00"),
            ]
        );
    }

    #[test]
    fn compute_slots_is_repeatable() {
        let rules = [rule(1, "08:00", "12:00")];
        let exceptions = [exception(monday(), "10:00", "10:30")];
        let first = compute_slots(&rules, &exceptions, monday());
        assert_eq!(first, compute_slots(&rules, &exceptions, monday()));
        assert_eq!(first.len(), 7);
        assert!(!first.contains(&iv("10:00", "10:30")));
        assert!(first.contains(&iv("10:30", "11:00")));
    }

    #[test]
    fn invalid_weekday_is_rejected() {
        let err = AvailabilityRule::new("mgr-1", 7, iv("09:00", "10:00"), now()).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidDayOfWeek(7)));
    }

    #[test]
    fn engine_manages_rules_and_blackouts() {
        let engine = AvailabilityEngine::new(Arc::new(MemoryScheduleStore::new()));
        let r = engine.add_rule("mgr-1", 1, iv("09:00", "11:00"), now()).unwrap();
        engine.add_rule("mgr-2", 1, iv("09:00", "11:00"), now()).unwrap();
        assert_eq!(engine.slots_for("mgr-1", monday()).unwrap().len(), 4);

        let blackout = engine
            .block_exception("mgr-1", monday(), iv("09:00", "10:00"), Some("dentist".into()), now())
            .unwrap();
        assert_eq!(engine.slots_for("mgr-1", monday()).unwrap().len(), 2);
        assert_eq!(engine.slots_for("mgr-2", monday()).unwrap().len(), 4);
        assert_eq!(engine.exceptions("mgr-1", monday()).unwrap().len(), 1);

        engine.remove_exception(blackout.exception_id).unwrap();
        assert_eq!(engine.slots_for("mgr-1", monday()).unwrap().len(), 4);

        engine.remove_rule(r.rule_id).unwrap();
        assert!(engine.slots_for("mgr-1", monday()).unwrap().is_empty());
        assert!(matches!(
            engine.remove_rule(r.rule_id),
            Err(ScheduleError::RuleNotFound(_))
        ));
    }
}
