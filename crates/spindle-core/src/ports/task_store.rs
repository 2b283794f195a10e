//! TaskStore port - where Task records are persisted.
//!
//! Implementations must accept writes from several worker threads at once
//! and must commit them independently of any business transaction the
//! calling job has open, so progress stays visible to external readers
//! while the job is still inside that transaction.

use crate::domain::{JobId, NewTask, StoreError, TaskId, TaskRecord};

pub trait TaskStore: Send + Sync {
    /// Create a task in the Waiting state.
    ///
    /// Returns `StoreError::DuplicateJobId` when `new.job_id` already has a
    /// task; callers on the enqueue path treat that as a no-op.
    fn create(&self, new: NewTask) -> Result<TaskRecord, StoreError>;

    fn get(&self, task_id: TaskId) -> Result<Option<TaskRecord>, StoreError>;

    fn find_by_job_id(&self, job_id: JobId) -> Result<Option<TaskRecord>, StoreError>;

    /// Overwrite the stored copy of `task`.
    fn update(&self, task: &TaskRecord) -> Result<(), StoreError>;

    /// All tasks, oldest first.
    fn list(&self) -> Result<Vec<TaskRecord>, StoreError>;
}
