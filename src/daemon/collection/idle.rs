use serde::{Deserialize, Serialize};

use crate::host::protocol::{IdleState, Status};

/// Pause flags. A pause requested by the user and a pause caused by idle detection are kept apart,
/// so coming back from idle never resumes a user who paused explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseState {
    pub user: bool,
    pub idle: bool,
}

impl PauseState {
    pub fn is_paused(self) -> bool {
        self.user || self.idle
    }

    /// Idle and locked states pause only when idle detection is enabled. Becoming active lifts
    /// the idle pause and nothing else.
    pub fn with_idle_state(self, state: IdleState, detection_enabled: bool) -> Self {
        match state {
            IdleState::Idle | IdleState::Locked if detection_enabled => Self { idle: true, ..self },
            IdleState::Idle | IdleState::Locked => self,
            IdleState::Active => Self { idle: false, ..self },
        }
    }

    pub fn paused_by_user(self) -> Self {
        Self { user: true, ..self }
    }

    /// An explicit resume wins over both sources.
    pub fn resumed_by_user(self) -> Self {
        Self::default()
    }

    /// Status to display when moving from `self` to `next`, if the effective state changed.
    pub fn status_change(self, next: Self) -> Option<Status> {
        match (self.is_paused(), next.is_paused()) {
            (false, true) => Some(Status::Paused),
            (true, false) => Some(Status::Ok),
            _ => None,
        }
    }
}
