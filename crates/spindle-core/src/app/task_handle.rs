//! TaskHandle - a shared, write-through view of one Task.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{TaskError, TaskId, TaskRecord, TaskStatus, TaskUpdateError};
use crate::ports::{Clock, TaskStore};

/// Shared handle over one Task.
///
/// Job bodies and batch workers on different threads hold clones of the
/// same `Arc<TaskHandle>`. Each mutation applies the transition to the
/// in-memory record and writes it to the `TaskStore` before the lock is
/// released, so stored writes for one task never interleave or regress.
pub struct TaskHandle {
    record: Mutex<TaskRecord>,
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    detail_line_max: usize,
}

impl TaskHandle {
    pub fn new(
        record: TaskRecord,
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        detail_line_max: usize,
    ) -> Self {
        Self {
            record: Mutex::new(record),
            store,
            clock,
            detail_line_max,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.record.lock().task_id()
    }

    pub fn status(&self) -> TaskStatus {
        self.record.lock().status()
    }

    pub fn percent_complete(&self) -> f32 {
        self.record.lock().percent_complete()
    }

    pub fn snapshot(&self) -> TaskRecord {
        self.record.lock().clone()
    }

    fn apply<F>(&self, f: F) -> Result<(), TaskUpdateError>
    where
        F: FnOnce(&mut TaskRecord, chrono::DateTime<chrono::Utc>) -> Result<(), TaskError>,
    {
        let mut record = self.record.lock();
        let mut next = record.clone();
        f(&mut next, self.clock.now())?;
        self.store.update(&next)?;
        *record = next;
        Ok(())
    }

    pub fn set_status(&self, status: TaskStatus) -> Result<(), TaskUpdateError> {
        self.apply(|r, now| r.set_status(status, now))
    }

    pub fn update_progress(&self, fraction: f32) -> Result<(), TaskUpdateError> {
        self.apply(|r, now| r.update_progress(fraction, now))
    }

    pub fn set_status_text(&self, text: impl Into<String>) -> Result<(), TaskUpdateError> {
        let text = text.into();
        self.apply(|r, now| r.set_status_text(text, now))
    }

    pub fn set_indeterminate(&self, indeterminate: bool) -> Result<(), TaskUpdateError> {
        self.apply(|r, now| r.set_indeterminate(indeterminate, now))
    }

    pub fn record_item_error(&self, summary: &str) -> Result<(), TaskUpdateError> {
        let line_max = self.detail_line_max;
        self.apply(|r, now| r.record_item_error(summary, line_max, now))
    }

    /// Count one item failure and move progress in a single write.
    pub(crate) fn record_item(&self, error: Option<&str>, fraction: f32) -> Result<(), TaskUpdateError> {
        let line_max = self.detail_line_max;
        self.apply(|r, now| {
            if let Some(summary) = error {
                r.record_item_error(summary, line_max, now)?;
            }
            r.update_progress(fraction, now)
        })
    }

    /// Set the batch summary line, then succeed, as one write.
    pub(crate) fn finish_batch(&self, summary: Option<String>) -> Result<(), TaskUpdateError> {
        self.apply(|r, now| {
            if let Some(text) = summary {
                r.set_status_text(text, now)?;
            }
            r.succeed(now)
        })
    }

    pub fn succeed(&self) -> Result<(), TaskUpdateError> {
        self.apply(|r, now| r.succeed(now))
    }

    /// Attach the produced artifact, then succeed, as one write.
    pub fn succeed_with_result(&self, key: impl Into<String>) -> Result<(), TaskUpdateError> {
        let key = key.into();
        self.apply(|r, now| {
            r.set_result_ref(key, now)?;
            r.succeed(now)
        })
    }

    pub fn fail(&self, message: &str, backtrace: Option<String>) -> Result<(), TaskUpdateError> {
        self.apply(|r, now| r.fail(message, backtrace, now))
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("record", &*self.record.lock())
            .finish_non_exhaustive()
    }
}
