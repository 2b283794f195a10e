//! Task status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a tracked operation.
///
/// State transitions:
/// - Waiting -> Running -> Succeeded
/// - Waiting -> Running -> Failed
/// - Waiting -> Succeeded / Failed (work finished before it was marked running)
///
/// `Paused` is reachable through `set_status` but nothing in the engine moves
/// a task into or out of it on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up.
    #[default]
    Waiting,

    /// Being executed.
    Running,

    /// Temporarily stopped.
    Paused,

    /// Finished normally (possibly with isolated per-item errors).
    Succeeded,

    /// Finished with an uncaught failure.
    Failed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::waiting(TaskStatus::Waiting, false)]
    #[case::running(TaskStatus::Running, false)]
    #[case::paused(TaskStatus::Paused, false)]
    #[case::succeeded(TaskStatus::Succeeded, true)]
    #[case::failed(TaskStatus::Failed, true)]
    fn terminal_states(#[case] status: TaskStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn default_is_waiting() {
        assert_eq!(TaskStatus::default(), TaskStatus::Waiting);
    }

    #[test]
    fn serializes_snake_case() {
        let s = serde_json::to_string(&TaskStatus::Succeeded).unwrap();
        assert_eq!(s, "\"succeeded\"");
        assert_eq!(TaskStatus::Running.to_string(), "running");
    }
}
