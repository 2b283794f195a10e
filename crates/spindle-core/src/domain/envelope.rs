//! JobEnvelope: job type + serialized args, as carried by a `JobQueue`.

use serde::{Deserialize, Serialize};

use super::ids::JobId;

/// Queue name used when a job does not pick one.
pub const DEFAULT_QUEUE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Assigned by the queue on push; `None` until then.
    job_id: Option<JobId>,
    job_type: String,
    queue: String,
    args: serde_json::Value,
}

impl JobEnvelope {
    pub fn new(job_type: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            job_id: None,
            job_type: job_type.into(),
            queue: DEFAULT_QUEUE.to_string(),
            args,
        }
    }

    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Called by queue implementations when they accept the envelope.
    pub fn assign_id(&mut self, job_id: JobId) {
        self.job_id = Some(job_id);
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn args(&self) -> &serde_json::Value {
        &self.args
    }
}
