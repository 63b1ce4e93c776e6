// service.rs - GoalService: one call per goal operation.
//
// Each mutating call follows the same path:
//   load → apply the transition on a copy → compare-and-swap write →
//   emit one event per transition that actually happened
// Events go out only after the write succeeded, and a failing sink never
// turns a committed transition into an error. The overdue sweep writes
// through the same transition methods, so there is one code path for every
// status change.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use hrpm_events::{EntityType, EventDispatcher, TransitionEvent};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::{ExtensionVerdict, NewGoal, PerformanceGoal};
use crate::store::{GoalFilter, GoalStore};
use crate::summary::GoalSummary;
use crate::sweep::{OverdueSweep, SweepReport, SweepScope};

/// Result of a progress update.
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub goal: PerformanceGoal,
    /// True if this update completed the goal (callers celebrate/notify).
    pub completed_now: bool,
}

/// Request/response entry point for goal operations.
pub struct GoalService<S: GoalStore + ?Sized> {
    store: Arc<S>,
    dispatcher: EventDispatcher,
    sweep: OverdueSweep,
}

/// Events describing what changed between two versions of the same goal.
fn transition_events(
    before: &PerformanceGoal,
    after: &PerformanceGoal,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let ext_before = before.extension.as_ref().map(|e| e.state_name()).unwrap_or("none");
    let ext_after = after.extension.as_ref().map(|e| e.state_name()).unwrap_or("none");
    let new_request = match (&before.extension, &after.extension) {
        (Some(b), Some(a)) => b.request_date != a.request_date,
        _ => false,
    };
    if ext_before != ext_after || new_request {
        events.push(TransitionEvent::new(
            EntityType::GoalExtension,
            after.goal_id,
            ext_before,
            ext_after,
            actor_id,
            now,
        ));
    }

    if before.status.name() != after.status.name() {
        events.push(TransitionEvent::new(
            EntityType::Goal,
            after.goal_id,
            before.status.name(),
            after.status.name(),
            actor_id,
            now,
        ));
    }
    events
}

impl<S: GoalStore + ?Sized> GoalService<S> {
    pub fn new(store: Arc<S>, dispatcher: EventDispatcher, sweep: OverdueSweep) -> Self {
        Self {
            store,
            dispatcher,
            sweep,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Load, transform, conditionally save, notify.
    fn mutate<T>(
        &self,
        goal_id: Uuid,
        actor_id: &str,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut PerformanceGoal) -> Result<T, GoalError>,
    ) -> Result<(PerformanceGoal, T), GoalError> {
        let before = self
            .store
            .get(goal_id)?
            .ok_or(GoalError::NotFound(goal_id))?;

        let mut goal = before.clone();
        let value = op(&mut goal)?;
        if goal == before {
            return Ok((before, value));
        }

        let saved = self.store.save_if_version(&goal, before.version)?;
        for event in transition_events(&before, &saved, actor_id, now) {
            tracing::info!(goal_id = %goal_id, actor = actor_id, "{}", event.label());
            self.dispatcher.dispatch(&event);
        }
        Ok((saved, value))
    }

    /// Create a new goal for an employee.
    pub fn create_goal(
        &self,
        input: NewGoal,
        now: DateTime<Utc>,
    ) -> Result<PerformanceGoal, GoalError> {
        let goal = PerformanceGoal::new(input, now)?;
        let stored = self.store.insert(&goal)?;
        tracing::info!(goal_id = %stored.goal_id, employee = %stored.employee_id, "goal created");
        Ok(stored)
    }

    pub fn get_goal(&self, goal_id: Uuid) -> Result<PerformanceGoal, GoalError> {
        self.store.get(goal_id)?.ok_or(GoalError::NotFound(goal_id))
    }

    pub fn list_goals(&self, filter: &GoalFilter) -> Result<Vec<PerformanceGoal>, GoalError> {
        self.store.list(filter)
    }

    /// Goals with an extension request nobody has decided yet.
    pub fn pending_extensions(
        &self,
        filter: &GoalFilter,
    ) -> Result<Vec<PerformanceGoal>, GoalError> {
        Ok(self
            .store
            .list(filter)?
            .into_iter()
            .filter(|g| g.has_pending_extension())
            .collect())
    }

    pub fn summary(&self, filter: &GoalFilter) -> Result<GoalSummary, GoalError> {
        Ok(GoalSummary::from_goals(&self.store.list(filter)?))
    }

    /// Record new progress (and optionally a new target).
    pub fn apply_progress(
        &self,
        goal_id: Uuid,
        current_value: f64,
        target_value: Option<f64>,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProgressOutcome, GoalError> {
        let (goal, completed_now) = self.mutate(goal_id, actor_id, now, |goal| {
            goal.apply_progress(current_value, target_value, now)
        })?;
        if completed_now {
            tracing::info!(goal_id = %goal_id, "goal completed");
        }
        Ok(ProgressOutcome {
            goal,
            completed_now,
        })
    }

    /// Mark a single goal overdue (the sweep does this in bulk).
    pub fn mark_overdue(
        &self,
        goal_id: Uuid,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PerformanceGoal, GoalError> {
        self.mutate(goal_id, actor_id, now, |goal| goal.mark_overdue(now))
            .map(|(goal, _)| goal)
    }

    pub fn request_extension(
        &self,
        goal_id: Uuid,
        new_deadline: NaiveDate,
        reason: &str,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<PerformanceGoal, GoalError> {
        self.mutate(goal_id, requested_by, now, |goal| {
            goal.request_extension(new_deadline, reason, requested_by, now)
        })
        .map(|(goal, _)| goal)
    }

    pub fn decide_extension(
        &self,
        goal_id: Uuid,
        verdict: ExtensionVerdict,
        now: DateTime<Utc>,
    ) -> Result<PerformanceGoal, GoalError> {
        let actor = verdict.approver_id().to_string();
        self.mutate(goal_id, &actor, now, |goal| goal.decide_extension(verdict, now))
            .map(|(goal, _)| goal)
    }

    pub fn acknowledge_decision(
        &self,
        goal_id: Uuid,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PerformanceGoal, GoalError> {
        self.mutate(goal_id, actor_id, now, |goal| goal.acknowledge_decision(now))
            .map(|(goal, _)| goal)
    }

    /// Cancel a goal. Cancelling an already-cancelled goal is a no-op.
    pub fn cancel_goal(
        &self,
        goal_id: Uuid,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PerformanceGoal, GoalError> {
        self.mutate(goal_id, actor_id, now, |goal| goal.cancel(now))
            .map(|(goal, _)| goal)
    }

    /// Run the overdue sweep and notify for every goal it moved.
    pub fn run_sweep(
        &self,
        scope: &SweepScope,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, GoalError> {
        let report = self.sweep.run(self.store.as_ref(), scope, now)?;
        self.dispatcher.dispatch_all(&report.events);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::tests::{now, today};
    use crate::goal::{GoalStatus, GoalUnit};
    use crate::store::MemoryGoalStore;
    use chrono::Duration;
    use hrpm_events::{EventError, NotificationSink};
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<TransitionEvent>>>);

    impl NotificationSink for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn send(&self, event: &TransitionEvent) -> Result<(), EventError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Broken;

    impl NotificationSink for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn send(&self, _event: &TransitionEvent) -> Result<(), EventError> {
            Err(EventError::DeliveryFailed("smtp down".to_string()))
        }
    }

    fn service() -> (GoalService<MemoryGoalStore>, Arc<Mutex<Vec<TransitionEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new()
            .with_sink(Box::new(Broken))
            .with_sink(Box::new(Recorder(seen.clone())));
        let service = GoalService::new(
            Arc::new(MemoryGoalStore::new()),
            dispatcher,
            OverdueSweep::default(),
        );
        (service, seen)
    }

    fn new_goal(start: NaiveDate, end: NaiveDate) -> NewGoal {
        NewGoal {
            employee_id: "emp-1".to_string(),
            title: "Ship onboarding guide".to_string(),
            description: "Write and publish".to_string(),
            unit: GoalUnit::Count,
            target_value: 100.0,
            start_date: start,
            end_date: end,
            created_by: "hr-1".to_string(),
        }
    }

    #[test]
    fn completion_emits_one_goal_event_despite_broken_sink() {
        let (service, seen) = service();
        let goal = service
            .create_goal(
                new_goal(today() - Duration::days(10), today() - Duration::days(3)),
                now(),
            )
            .unwrap();

        let outcome = service
            .apply_progress(goal.goal_id, 100.0, None, "emp-1", now())
            .unwrap();

        assert!(outcome.completed_now);
        assert_eq!(outcome.goal.status, GoalStatus::Completed);
        assert_eq!(outcome.goal.completion.as_ref().unwrap().days_early_or_late, -3);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].from_state, "not_started");
        assert_eq!(seen[0].to_state, "completed");
        assert_eq!(seen[0].actor_id, "emp-1");
    }

    #[test]
    fn failed_precondition_leaves_store_and_events_untouched() {
        let (service, seen) = service();
        let goal = service
            .create_goal(new_goal(today(), today() + Duration::days(5)), now())
            .unwrap();

        let result = service.request_extension(
            goal.goal_id,
            today() + Duration::days(9),
            "need time",
            "emp-1",
            now(),
        );
        assert!(matches!(result, Err(GoalError::ExtensionRequiresOverdue { .. })));
        assert_eq!(service.get_goal(goal.goal_id).unwrap(), goal);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn extension_negotiation_emits_extension_and_status_events() {
        let (service, seen) = service();
        let goal = service
            .create_goal(
                new_goal(today() - Duration::days(10), today() - Duration::days(1)),
                now(),
            )
            .unwrap();
        service.mark_overdue(goal.goal_id, "system", now()).unwrap();
        service
            .request_extension(goal.goal_id, today() + Duration::days(5), "illness", "emp-1", now())
            .unwrap();
        assert_eq!(service.pending_extensions(&GoalFilter::all()).unwrap().len(), 1);

        let decided = service
            .decide_extension(
                goal.goal_id,
                ExtensionVerdict::Approve {
                    approver_id: "mgr-1".to_string(),
                },
                now(),
            )
            .unwrap();
        assert_eq!(decided.status, GoalStatus::InProgress);
        service.acknowledge_decision(goal.goal_id, "emp-1", now()).unwrap();

        let labels: Vec<String> = seen.lock().unwrap().iter().map(|e| e.label()).collect();
        assert_eq!(
            labels,
            vec![
                "goal:not_started->overdue",
                "goal_extension:none->pending",
                "goal_extension:pending->approved",
                "goal:overdue->in_progress",
                "goal_extension:approved->acknowledged",
            ]
        );
    }

    #[test]
    fn re_request_after_rejection_emits_new_pending_event() {
        let (service, seen) = service();
        let goal = service
            .create_goal(
                new_goal(today() - Duration::days(10), today() - Duration::days(1)),
                now(),
            )
            .unwrap();
        service.mark_overdue(goal.goal_id, "system", now()).unwrap();
        service
            .request_extension(goal.goal_id, today() + Duration::days(5), "first", "emp-1", now())
            .unwrap();
        service
            .decide_extension(
                goal.goal_id,
                ExtensionVerdict::Reject {
                    approver_id: "mgr-1".to_string(),
                    reason: "needs more detail".to_string(),
                },
                now(),
            )
            .unwrap();
        let later = now() + Duration::hours(1);
        let goal = service
            .request_extension(goal.goal_id, today() + Duration::days(6), "second", "emp-1", later)
            .unwrap();

        assert!(goal.has_pending_extension());
        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.label(), "goal_extension:rejected->pending");
    }

    #[test]
    fn cancelling_twice_emits_once() {
        let (service, seen) = service();
        let goal = service
            .create_goal(new_goal(today(), today() + Duration::days(5)), now())
            .unwrap();
        service.cancel_goal(goal.goal_id, "hr-1", now()).unwrap();
        let again = service.cancel_goal(goal.goal_id, "hr-1", now()).unwrap();
        assert_eq!(again.status, GoalStatus::Cancelled);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_goal_is_not_found() {
        let (service, _) = service();
        let result = service.apply_progress(Uuid::new_v4(), 1.0, None, "emp-1", now());
        assert!(matches!(result, Err(GoalError::NotFound(_))));
    }

    #[test]
    fn run_sweep_dispatches_events() {
        let (service, seen) = service();
        service
            .create_goal(
                new_goal(today() - Duration::days(10), today() - Duration::days(1)),
                now(),
            )
            .unwrap();
        let report = service.run_sweep(&SweepScope::All, now()).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(seen.lock().unwrap()[0].label(), "goal:not_started->overdue");

        let summary = service.summary(&GoalFilter::for_employee("emp-1")).unwrap();
        assert_eq!(summary.overdue, 1);
    }
}
