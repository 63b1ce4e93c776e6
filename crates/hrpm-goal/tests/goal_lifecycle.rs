// goal_lifecycle.rs - End-to-end goal flow against the on-disk store.
//
//   1. Create two goals for one employee in a JSON store (tempdir)
//   2. Run the overdue sweep → the past-deadline goal becomes overdue
//   3. Sweep again inside the cooldown → debounced, nothing written
//   4. Employee requests an extension, manager approves, employee acknowledges
//   5. Progress reaches the target → completed with timing recorded
//
// VERIFY:
//   - Every transition lands in the JSONL event log, in order
//   - A second store instance over the same directory sees the final state
//   - Live subscribers observe the status changes

use std::fs;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tempfile::tempdir;

use hrpm_events::{EventDispatcher, LogSink, TransitionEvent};
use hrpm_goal::{
    ExtensionVerdict, GoalFilter, GoalService, GoalStatus, GoalStore, GoalUnit, JsonGoalStore,
    NewGoal, OverdueSweep, SweepScope,
};

fn new_goal(title: &str, start: NaiveDate, end: NaiveDate) -> NewGoal {
    NewGoal {
        employee_id: "emp-42".to_string(),
        title: title.to_string(),
        description: String::new(),
        unit: GoalUnit::Hours,
        target_value: 20.0,
        start_date: start,
        end_date: end,
        created_by: "hr-7".to_string(),
    }
}

#[test]
fn overdue_extension_and_completion_round_trip_through_disk() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("events.jsonl");
    let store = Arc::new(JsonGoalStore::new(dir.path()).unwrap());
    let service = GoalService::new(
        store.clone(),
        EventDispatcher::new().with_sink(Box::new(LogSink::new(&log_path))),
        OverdueSweep::default(),
    );

    let day = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();

    let late = service
        .create_goal(new_goal("Security training", day - Duration::days(30), day - Duration::days(2)), now)
        .unwrap();
    let on_track = service
        .create_goal(new_goal("Mentoring", day - Duration::days(5), day + Duration::days(20)), now)
        .unwrap();

    let updates = store.subscribe(GoalFilter::for_employee("emp-42")).unwrap();
    let initial = updates.recv().unwrap();
    assert_eq!(initial.len(), 2);

    // Sweep: only the past-deadline goal moves.
    let report = service.run_sweep(&SweepScope::All, now).unwrap();
    assert!(!report.debounced);
    assert_eq!(report.examined, 2);
    assert_eq!(report.updated, 1);
    let late_now = service.get_goal(late.goal_id).unwrap();
    assert_eq!(late_now.status, GoalStatus::Overdue { days_overdue: 3 });
    assert_eq!(service.get_goal(on_track.goal_id).unwrap().status, GoalStatus::NotStarted);

    let after_sweep = updates.recv().unwrap();
    assert!(after_sweep
        .iter()
        .any(|g| g.goal_id == late.goal_id && g.status.name() == "overdue"));

    // Within the cooldown: debounced.
    let again = service
        .run_sweep(&SweepScope::All, now + Duration::seconds(10))
        .unwrap();
    assert!(again.debounced);
    assert_eq!(again.updated, 0);

    // Extension negotiation.
    service
        .request_extension(late.goal_id, day + Duration::days(14), "Course was rescheduled", "emp-42", now)
        .unwrap();
    let approved = service
        .decide_extension(
            late.goal_id,
            ExtensionVerdict::Approve {
                approver_id: "mgr-3".to_string(),
            },
            now + Duration::hours(1),
        )
        .unwrap();
    assert_eq!(approved.status, GoalStatus::InProgress);
    assert_eq!(approved.end_date, day + Duration::days(14));
    service
        .acknowledge_decision(late.goal_id, "emp-42", now + Duration::hours(2))
        .unwrap();

    // Completion four days later, ten days ahead of the new deadline.
    let finish = now + Duration::days(4);
    let outcome = service
        .apply_progress(late.goal_id, 20.0, None, "emp-42", finish)
        .unwrap();
    assert!(outcome.completed_now);
    let completion = outcome.goal.completion.clone().unwrap();
    assert_eq!(completion.days_early_or_late, 10);
    assert!(completion.completed_early);

    // A fresh store over the same directory sees the persisted record.
    let reopened = JsonGoalStore::new(dir.path()).unwrap();
    let persisted = reopened.get(late.goal_id).unwrap().unwrap();
    assert_eq!(persisted.status, GoalStatus::Completed);
    assert_eq!(persisted.version, outcome.goal.version);

    let events: Vec<TransitionEvent> = fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let labels: Vec<String> = events.iter().map(|e| e.label()).collect();
    assert_eq!(
        labels,
        vec![
            "goal:not_started->overdue",
            "goal_extension:none->pending",
            "goal_extension:pending->approved",
            "goal:overdue->in_progress",
            "goal_extension:approved->acknowledged",
            "goal:in_progress->completed",
        ]
    );
    assert_eq!(events[0].actor_id, TransitionEvent::SYSTEM_ACTOR);
    assert_eq!(events[2].actor_id, "mgr-3");
}

#[test]
fn employee_scoped_sweep_leaves_other_employees_alone() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonGoalStore::new(dir.path()).unwrap());
    let service = GoalService::new(store, EventDispatcher::new(), OverdueSweep::default());

    let day = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();

    let mine = service
        .create_goal(new_goal("A", day - Duration::days(9), day - Duration::days(1)), now)
        .unwrap();
    let mut other_input = new_goal("B", day - Duration::days(9), day - Duration::days(1));
    other_input.employee_id = "emp-99".to_string();
    let other = service.create_goal(other_input, now).unwrap();

    let report = service
        .run_sweep(&SweepScope::Employee("emp-42".to_string()), now)
        .unwrap();
    assert_eq!(report.updated, 1);
    assert!(matches!(
        service.get_goal(mine.goal_id).unwrap().status,
        GoalStatus::Overdue { .. }
    ));
    assert_eq!(service.get_goal(other.goal_id).unwrap().status, GoalStatus::NotStarted);

    // A different scope has its own cooldown.
    let all = service.run_sweep(&SweepScope::All, now).unwrap();
    assert!(!all.debounced);
    assert_eq!(all.updated, 1);
}
