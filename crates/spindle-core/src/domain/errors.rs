//! Error types, one enum per concern.

use thiserror::Error;

use super::ids::{JobId, TaskId};
use super::state::TaskStatus;

/// A transition was attempted on a Task that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task {task_id} is already {status}; terminal tasks cannot change")]
    Finished { task_id: TaskId, status: TaskStatus },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a task already exists for {0}")]
    DuplicateJobId(JobId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task store backend: {0}")]
    Backend(String),
}

/// A write through a shared task handle failed.
#[derive(Debug, Error)]
pub enum TaskUpdateError {
    #[error(transparent)]
    Transition(#[from] TaskError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,

    #[error("job queue: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Error)]
#[error("workload slice at offset {offset} (limit {limit}) failed: {message}")]
pub struct WorkloadError {
    pub offset: usize,
    pub limit: usize,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("record store: {0}")]
    Store(String),

    #[error("search index: {0}")]
    Index(String),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Workload(#[from] WorkloadError),

    #[error("batch worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    #[error("recording batch progress failed: {0}")]
    Task(#[from] TaskUpdateError),
}

#[derive(Debug, Error)]
pub enum ReindexError {
    #[error("reindexing {record_type} failed: {source}")]
    Index {
        record_type: String,
        #[source]
        source: IndexError,
    },

    #[error("reindex worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("no job registered for type {0}")]
    UnknownJobType(String),

    #[error("job {job_type} is already registered")]
    DuplicateJobType { job_type: String },

    #[error("decoding args for {job_type}: {source}")]
    Decode {
        job_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Task(#[from] TaskUpdateError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("job {job_id} failed: {source:#}")]
    Perform {
        job_id: JobId,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    #[error("missing job types: {0:?}. These jobs were expected but not registered.")]
    MissingJobTypes(Vec<String>),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Render a panic payload the way `std` would print it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let p = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "static");

        let n = 7;
        let p = std::panic::catch_unwind(|| panic!("formatted {n}")).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "formatted 7");
    }

    #[test]
    fn perform_error_includes_cause_chain() {
        let source = anyhow::anyhow!("disk full").context("writing export");
        let err = JobError::Perform {
            job_id: JobId::from_ulid(ulid::Ulid::new()),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("writing export"));
        assert!(msg.contains("disk full"));
    }
}
