// event.rs - The transition event emitted by every state machine.
//
// One event per successful transition. The payload is deliberately flat
// (`from_state` / `to_state` as strings) so external delivery channels can
// consume it without depending on the goal or meeting crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which kind of record changed state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A performance goal's status changed.
    Goal,
    /// The extension negotiation on a goal moved forward.
    GoalExtension,
    /// A meeting's approval status changed.
    Meeting,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Goal => write!(f, "goal"),
            EntityType::GoalExtension => write!(f, "goal_extension"),
            EntityType::Meeting => write!(f, "meeting"),
        }
    }
}

/// A single state transition, as seen by notification sinks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionEvent {
    /// Unique identifier for this event.
    pub event_id: Uuid,

    /// What kind of record transitioned.
    pub entity_type: EntityType,

    /// ID of the goal or meeting.
    pub entity_id: Uuid,

    /// State before the transition (e.g. "in_progress").
    pub from_state: String,

    /// State after the transition (e.g. "completed").
    pub to_state: String,

    /// Who caused it: an employee/approver id, or "system" for the sweep.
    pub actor_id: String,

    /// When the transition was committed.
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    /// Actor id used for transitions the system makes on its own.
    pub const SYSTEM_ACTOR: &'static str = "system";

    /// Build an event for a transition committed at `timestamp`.
    pub fn new(
        entity_type: EntityType,
        entity_id: Uuid,
        from_state: impl fmt::Display,
        to_state: impl fmt::Display,
        actor_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            entity_type,
            entity_id,
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
            actor_id: actor_id.into(),
            timestamp,
        }
    }

    /// Short "entity:from->to" label, handy for log lines.
    pub fn label(&self) -> String {
        format!("{}:{}->{}", self.entity_type, self.from_state, self.to_state)
    }
}
