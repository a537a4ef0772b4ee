//! Analysis run state machine
//!
//! STARTING → INGESTING → EVALUATING → PERSISTING → COMPLETED, with ABORTING
//! reachable from every non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Starting,
    Ingesting,
    Evaluating,
    Persisting,
    Completed,
    Aborting,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborting)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Starting, Ingesting)
                | (Ingesting, Evaluating)
                | (Evaluating, Persisting)
                | (Persisting, Completed)
                | (Starting | Ingesting | Evaluating | Persisting, Aborting)
        )
    }
}

/// Record of one state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}
