//! Status - polling views over stored tasks.

use serde::{Deserialize, Serialize};

use crate::domain::{JobId, StoreError, TaskId, TaskRecord, TaskStatus};
use crate::ports::TaskStore;

/// Serializable snapshot of one Task, for whatever polls it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub job_id: Option<JobId>,
    pub name: String,
    pub status: TaskStatus,
    pub percent_complete: f32,
    pub indeterminate: bool,
    pub status_text: Option<String>,
    pub detail: Option<String>,
    pub backtrace: Option<String>,
    pub error_count: u64,
    pub result_ref: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
}

impl From<&TaskRecord> for TaskStatusView {
    fn from(task: &TaskRecord) -> Self {
        Self {
            task_id: task.task_id(),
            job_id: task.job_id(),
            name: task.name().to_string(),
            status: task.status(),
            percent_complete: task.percent_complete(),
            indeterminate: task.indeterminate(),
            status_text: task.status_text().map(str::to_string),
            detail: task.detail().map(str::to_string),
            backtrace: task.backtrace().map(str::to_string),
            error_count: task.error_count(),
            result_ref: task.result_ref().map(str::to_string),
            created_at_ms: task.created_at().timestamp_millis(),
            updated_at_ms: task.updated_at().timestamp_millis(),
            started_at_ms: task.started_at().map(|t| t.timestamp_millis()),
            completed_at_ms: task.completed_at().map(|t| t.timestamp_millis()),
        }
    }
}

/// How many stored tasks sit in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub waiting: usize,
    pub running: usize,
    pub paused: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn from_store(store: &dyn TaskStore) -> Result<Self, StoreError> {
        Ok(store.list()?.iter().map(TaskRecord::status).collect())
    }

    pub fn total(&self) -> usize {
        self.waiting + self.running + self.paused + self.succeeded + self.failed
    }
}

impl FromIterator<TaskStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = TaskStatus>>(iter: I) -> Self {
        let mut counts = Self::default();
        for status in iter {
            match status {
                TaskStatus::Waiting => counts.waiting += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Paused => counts.paused += 1,
                TaskStatus::Succeeded => counts.succeeded += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
