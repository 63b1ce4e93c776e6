// sweep.rs - Overdue sweep: batch-marks past-deadline goals as overdue and
// recounts the days on goals that already are.
//
// A sweep runs for one employee or for everyone. It is guarded twice:
//   1. a process-local cooldown per scope (cheap, but per instance only)
//   2. the store's shared per-scope marker (`GoalStore::claim_sweep`), which
//      holds across every process using the same store
// Losing either guard makes the call a no-op that reports `debounced`.
//
// Writes go through `GoalStore::commit_batch` with the version each goal was
// read at. A goal completed or cancelled between read and write has a newer
// version, so it is skipped as a conflict instead of being overwritten back
// to overdue; the next sweep re-reads it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use hrpm_events::{EntityType, TransitionEvent};
use uuid::Uuid;

use crate::error::GoalError;
use crate::store::{ConditionalWrite, GoalFilter, GoalStore};

/// Default cooldown between sweeps of the same scope.
pub const DEFAULT_SWEEP_COOLDOWN_SECS: i64 = 60;

/// Which goals a sweep covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SweepScope {
    All,
    Employee(String),
}

impl SweepScope {
    /// Key for the debounce markers.
    pub fn key(&self) -> String {
        match self {
            SweepScope::All => "all".to_string(),
            SweepScope::Employee(id) => format!("employee:{}", id),
        }
    }

    fn eligible_filter(&self) -> GoalFilter {
        let base = match self {
            SweepScope::All => GoalFilter::all(),
            SweepScope::Employee(id) => GoalFilter::for_employee(id.clone()),
        };
        base.with_status("not_started")
            .with_status("in_progress")
            .with_status("overdue")
    }
}

impl fmt::Display for SweepScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// What a sweep did.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub scope: SweepScope,
    pub ran_at: DateTime<Utc>,
    /// True if a cooldown blocked the sweep; nothing was read or written.
    pub debounced: bool,
    /// Open goals (not started, in progress or overdue) looked at.
    pub examined: usize,
    /// Goals moved to overdue.
    pub updated: usize,
    /// Already-overdue goals whose day count grew.
    pub refreshed: usize,
    /// Goals skipped because they changed concurrently.
    pub conflicts: Vec<Uuid>,
    /// One event per goal moved to overdue.
    pub events: Vec<TransitionEvent>,
}

impl SweepReport {
    fn debounced(scope: SweepScope, now: DateTime<Utc>) -> Self {
        Self {
            scope,
            ran_at: now,
            debounced: true,
            examined: 0,
            updated: 0,
            refreshed: 0,
            conflicts: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// The overdue sweep job.
pub struct OverdueSweep {
    cooldown: Duration,
    last_run: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for OverdueSweep {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SWEEP_COOLDOWN_SECS))
    }
}

impl OverdueSweep {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_run: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Take the local cooldown slot for `key`. False if another run is too recent.
    fn claim_local(&self, key: &str, now: DateTime<Utc>) -> Result<bool, GoalError> {
        let mut last_run = self
            .last_run
            .lock()
            .map_err(|_| GoalError::StoreUnavailable("sweep lock poisoned".to_string()))?;
        if let Some(last) = last_run.get(key) {
            if now - *last < self.cooldown {
                return Ok(false);
            }
        }
        last_run.insert(key.to_string(), now);
        Ok(true)
    }

    /// Run one sweep over `scope` as of `now`.
    pub fn run<S: GoalStore + ?Sized>(
        &self,
        store: &S,
        scope: &SweepScope,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, GoalError> {
        let key = scope.key();
        if !self.claim_local(&key, now)? {
            tracing::debug!(scope = %scope, "overdue sweep skipped: local cooldown");
            return Ok(SweepReport::debounced(scope.clone(), now));
        }
        if !store.claim_sweep(&key, now, self.cooldown)? {
            tracing::debug!(scope = %scope, "overdue sweep skipped: another instance swept recently");
            return Ok(SweepReport::debounced(scope.clone(), now));
        }

        let candidates = store.list(&scope.eligible_filter())?;
        let examined = candidates.len();

        let mut from_states = HashMap::new();
        let mut writes = Vec::new();
        for goal in candidates {
            if !goal.is_past_deadline(now) {
                continue;
            }
            let expected_version = goal.version;
            let from = goal.status.name();
            let mut updated = goal;
            let changed = if updated.status.is_sweep_eligible() {
                updated.mark_overdue(now).map(|_| true)
            } else {
                updated.refresh_overdue(now)
            };
            match changed {
                Ok(true) => {
                    from_states.insert(updated.goal_id, from);
                    writes.push(ConditionalWrite {
                        goal: updated,
                        expected_version,
                    });
                }
                Ok(false) => {}
                Err(e) => tracing::debug!(goal_id = %updated.goal_id, "not updating overdue status: {}", e),
            }
        }

        if writes.is_empty() {
            tracing::debug!(scope = %scope, examined, "overdue sweep found nothing to update");
            return Ok(SweepReport {
                scope: scope.clone(),
                ran_at: now,
                debounced: false,
                examined,
                updated: 0,
                refreshed: 0,
                conflicts: Vec::new(),
                events: Vec::new(),
            });
        }

        let outcome = store.commit_batch(writes)?;
        for goal_id in &outcome.conflicts {
            tracing::warn!(goal_id = %goal_id, "goal changed during overdue sweep; retrying next pass");
        }

        // A recount keeps the goal overdue, so only real transitions emit events.
        let events: Vec<TransitionEvent> = outcome
            .committed
            .iter()
            .filter_map(|goal| {
                let from = from_states.get(&goal.goal_id).copied()?;
                (from != goal.status.name()).then(|| {
                    TransitionEvent::new(
                        EntityType::Goal,
                        goal.goal_id,
                        from,
                        goal.status.name(),
                        TransitionEvent::SYSTEM_ACTOR,
                        now,
                    )
                })
            })
            .collect();
        let updated = events.len();
        let refreshed = outcome.committed.len() - updated;

        tracing::info!(
            scope = %scope,
            examined,
            updated,
            refreshed,
            conflicts = outcome.conflicts.len(),
            "overdue sweep complete"
        );

        Ok(SweepReport {
            scope: scope.clone(),
            ran_at: now,
            debounced: false,
            examined,
            updated,
            refreshed,
            conflicts: outcome.conflicts,
            events,
        })
    }
}
