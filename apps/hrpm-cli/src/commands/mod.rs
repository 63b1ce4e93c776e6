// mod.rs - Shared wiring for subcommands.

pub mod availability;
pub mod goal;
pub mod meeting;
pub mod sweep;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hrpm_events::{EventDispatcher, LogSink};
use hrpm_goal::{GoalService, JsonGoalStore, OverdueSweep};
use hrpm_schedule::{JsonScheduleStore, SchedulingService};

use crate::config::HrpmConfig;

/// Everything a subcommand needs: config and the instant to act at.
pub struct Context {
    pub config: HrpmConfig,
    pub now: DateTime<Utc>,
}

impl Context {
    pub fn new(config: HrpmConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    fn dispatcher(&self) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        if self.config.settings.events.log_enabled {
            dispatcher.add_sink(Box::new(LogSink::new(&self.config.events_log)));
        }
        dispatcher
    }

    pub fn goal_service(&self) -> anyhow::Result<GoalService<JsonGoalStore>> {
        let store = JsonGoalStore::new(&self.config.goal_store_dir)?;
        let sweep = OverdueSweep::new(Duration::seconds(
            self.config.settings.sweep.cooldown_secs,
        ));
        Ok(GoalService::new(Arc::new(store), self.dispatcher(), sweep))
    }

    pub fn schedule_service(&self) -> anyhow::Result<SchedulingService<JsonScheduleStore>> {
        let store = JsonScheduleStore::new(&self.config.schedule_file)?;
        Ok(SchedulingService::new(Arc::new(store), self.dispatcher()).with_join_lead(
            Duration::minutes(self.config.settings.meetings.join_lead_minutes),
        ))
    }
}

/// Shorten `s` to at most `max` characters for table output.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    /// A context over a fresh project directory at a fixed instant.
    pub(crate) fn context() -> (TempDir, Context) {
        let project = TempDir::new().unwrap();
        let config = HrpmConfig::for_project(project.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap();
        (project, Context::new(config, now))
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Überprüfung der Ziele", 10), "Überprü...");
    }

    #[test]
    fn disabled_event_log_has_no_sinks() {
        let (_project, mut ctx) = context();
        assert_eq!(ctx.dispatcher().sink_count(), 1);
        ctx.config.settings.events.log_enabled = false;
        assert_eq!(ctx.dispatcher().sink_count(), 0);
    }
}
