//! JobQueue port - where background jobs wait to be performed.

use std::time::Duration;

use crate::domain::{JobEnvelope, JobId, QueueError};

/// Queue of job envelopes.
///
/// The queue owns job identity: `push` assigns the `JobId` the Task is
/// keyed by.
pub trait JobQueue: Send + Sync {
    fn push(&self, envelope: JobEnvelope) -> Result<JobId, QueueError>;

    /// Block up to `timeout` for the next envelope.
    fn pop(&self, timeout: Duration) -> Result<Option<JobEnvelope>, QueueError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
