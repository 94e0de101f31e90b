//! Experiment status state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of an experiment.
///
/// ```text
/// waiting ──> running ──> finished
///    │           │
///    └───────────┴──> stopped
/// ```
///
/// The worker that executes experiments drives this field; the registry only
/// validates and persists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Registered, not yet picked up by a worker.
    #[default]
    Waiting,
    /// Currently executing.
    Running,
    /// Completed.
    Finished,
    /// Stopped by an explicit request.
    Stopped,
}

impl ExperimentStatus {
    /// Get status name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Stopped => "stopped",
        }
    }

    /// True if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Stopped)
    }

    /// Check whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        !self.is_terminal()
            && matches!(
                (self, next),
                (Self::Waiting, Self::Running)
                    | (Self::Running, Self::Finished)
                    | (Self::Waiting | Self::Running, Self::Stopped)
            )
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
