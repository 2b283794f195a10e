//! Domain model (ids, task status, task record, errors).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use errors::{
    BatchError, ConfigError, IndexError, JobError, QueueError, ReindexError, StoreError,
    TaskError, TaskUpdateError, WorkloadError,
};
pub use envelope::{JobEnvelope, DEFAULT_QUEUE};
pub use ids::{JobId, TaskId};
pub use state::TaskStatus;
pub use task::{NewTask, TaskRecord, COMPLETION_EPSILON, DEFAULT_DETAIL_LINE_MAX};
