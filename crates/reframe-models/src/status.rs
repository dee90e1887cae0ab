//! Task status state machine vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a reformatting task.
///
/// Transitions are forward-only: `Submitted -> Initialized -> Running ->
/// {Success, Stopped}`. The only backward edge is an explicit restart,
/// which returns a terminal task to `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task directory and input file exist, nothing derived yet
    #[default]
    Submitted,
    /// Paths derived, audio extracted, ready to run
    Initialized,
    /// Conversion subprocess is being supervised
    Running,
    /// Conversion and remux finished with exit code 0
    Success,
    /// Conversion failed, timed out, or could not be launched
    Stopped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Submitted => "submitted",
            TaskStatus::Initialized => "initialized",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Stopped => "stopped",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Stopped)
    }

    /// Check if the forward edge `self -> next` is part of the lifecycle
    /// graph. Restart (terminal -> Submitted) counts as legal.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Submitted, Initialized)
                | (Initialized, Running)
                | (Running, Success)
                | (Running, Stopped)
                | (Submitted, Stopped)
                | (Initialized, Stopped)
                | (Success, Submitted)
                | (Stopped, Submitted)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Stopped.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Submitted.is_terminal());
    }

    #[test]
    fn lifecycle_graph() {
        use TaskStatus::*;
        assert!(Submitted.can_transition_to(Initialized));
        assert!(Initialized.can_transition_to(Running));
        assert!(Running.can_transition_to(Success));
        assert!(Running.can_transition_to(Stopped));
        // restart edges
        assert!(Success.can_transition_to(Submitted));
        assert!(Stopped.can_transition_to(Submitted));
        // nothing skips forward or moves out of Running sideways
        assert!(!Submitted.can_transition_to(Running));
        assert!(!Submitted.can_transition_to(Success));
        assert!(!Running.can_transition_to(Submitted));
        assert!(!Success.can_transition_to(Stopped));
    }

    #[test]
    fn serde_wire_format() {
        let json = serde_json::to_string(&TaskStatus::Initialized).unwrap();
        assert_eq!(json, "\"initialized\"");
        let back: TaskStatus = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(back, TaskStatus::Stopped);
    }
}
