// summary.rs - Aggregate counts over a set of goals (dashboards, reviews).

use serde::{Deserialize, Serialize};

use crate::goal::{GoalStatus, PerformanceGoal};

/// Per-status counts and completion timing for a set of goals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalSummary {
    pub total: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub overdue: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub completed_early: usize,
    /// Mean of `days_early_or_late` over completed goals.
    pub average_days_early_or_late: Option<f64>,
    pub pending_extensions: usize,
    pub awaiting_acknowledgment: usize,
}

impl GoalSummary {
    pub fn from_goals<'a>(goals: impl IntoIterator<Item = &'a PerformanceGoal>) -> Self {
        let mut summary = GoalSummary::default();
        let mut early_late_total = 0i64;

        for goal in goals {
            summary.total += 1;
            match goal.status {
                GoalStatus::NotStarted => summary.not_started += 1,
                GoalStatus::InProgress => summary.in_progress += 1,
                GoalStatus::Overdue { .. } => summary.overdue += 1,
                GoalStatus::Completed => summary.completed += 1,
                GoalStatus::Cancelled => summary.cancelled += 1,
            }
            if let Some(completion) = &goal.completion {
                early_late_total += completion.days_early_or_late;
                if completion.completed_early {
                    summary.completed_early += 1;
                }
            }
            if goal.has_pending_extension() {
                summary.pending_extensions += 1;
            }
            if goal.needs_acknowledgment() {
                summary.awaiting_acknowledgment += 1;
            }
        }

        if summary.completed > 0 {
            summary.average_days_early_or_late =
                Some(early_late_total as f64 / summary.completed as f64);
        }
        summary
    }

    /// Share of non-cancelled goals that are completed, 0-100.
    pub fn completion_rate(&self) -> f64 {
        let active = self.total - self.cancelled;
        if active == 0 {
            return 0.0;
        }
        self.completed as f64 / active as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::tests::{goal_between, now, overdue_goal, today};
    use chrono::Duration;

    #[test]
    fn summary_counts_statuses_and_timing() {
        let mut early = goal_between(today() - Duration::days(2), today() + Duration::days(5), 4.0);
        early.apply_progress(4.0, None, now()).unwrap();
        let mut late = goal_between(today() - Duration::days(10), today() - Duration::days(3), 4.0);
        late.apply_progress(4.0, None, now()).unwrap();
        let mut pending = overdue_goal();
        pending
            .request_extension(today() + Duration::days(3), "r", "emp-1", now())
            .unwrap();
        let mut cancelled = goal_between(today(), today() + Duration::days(1), 1.0);
        cancelled.cancel(now()).unwrap();

        let goals = [early, late, pending, cancelled];
        let summary = GoalSummary::from_goals(&goals);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.completed_early, 1);
        assert_eq!(summary.pending_extensions, 1);
        // (+5 + -3) / 2
        assert_eq!(summary.average_days_early_or_late, Some(1.0));
        assert!((summary.completion_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn empty_summary_has_no_average() {
        let summary = GoalSummary::from_goals(Vec::<PerformanceGoal>::new().iter());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_days_early_or_late, None);
        assert_eq!(summary.completion_rate(), 0.0);
    }
}
