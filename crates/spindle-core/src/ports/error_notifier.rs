//! ErrorNotifier port - tells someone about a job that failed.

use crate::domain::{JobId, TaskId};

/// What a notifier receives about an uncaught job failure.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub job_type: String,
    pub message: String,
    pub backtrace: Option<String>,
}

pub trait ErrorNotifier: Send + Sync {
    fn notify(&self, failure: &JobFailure);
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ErrorNotifier for NoopNotifier {
    fn notify(&self, _failure: &JobFailure) {}
}

/// Emits each failure as a `tracing` error event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ErrorNotifier for LogNotifier {
    fn notify(&self, failure: &JobFailure) {
        tracing::error!(
            job_id = %failure.job_id,
            task_id = %failure.task_id,
            job_type = %failure.job_type,
            backtrace = failure.backtrace.as_deref().unwrap_or(""),
            "job failed: {}",
            failure.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use ulid::Ulid;

    #[traced_test]
    #[test]
    fn log_notifier_emits_error_event() {
        LogNotifier.notify(&JobFailure {
            job_id: JobId::from_ulid(Ulid::new()),
            task_id: TaskId::from_ulid(Ulid::new()),
            job_type: "export.tsv.v1".into(),
            message: "disk full".into(),
            backtrace: None,
        });
        assert!(logs_contain("job failed: disk full"));
    }
}
