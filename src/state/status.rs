/// Job status definitions for the controller state machine
///
/// This module defines the states a job can be in and which transitions
/// between them are legal.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current status of a harvesting job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// No job, or the job was cleared
    Idle,

    /// The processing loop is scheduling items
    Running,

    /// Scheduling stopped at an item boundary; the cursor is kept
    Paused,

    /// Every identifier was processed
    Completed,
}

impl JobStatus {
    /// Returns true if a transition from `self` to `next` is allowed
    ///
    /// Any status may return to Idle (`clear`). A new job is installed by
    /// moving to Idle and then to Running, so there is no Idle -> Paused or
    /// Completed -> Running edge.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (_, Self::Idle)
                | (Self::Idle, Self::Running)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running, Self::Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 4] {
        [Self::Idle, Self::Running, Self::Paused, Self::Completed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
