//! InMemoryJobQueue - process-local job queue.
//!
//! - Mutex + Condvar for a blocking pop with timeout
//! - the queue assigns each pushed envelope its `JobId`

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::domain::{JobEnvelope, JobId, QueueError};
use crate::ports::{IdGenerator, JobQueue};

struct State {
    ready: VecDeque<JobEnvelope>,
    closed: bool,
}

/// FIFO queue shared by the enqueuing side and a `WorkerGroup`.
///
/// # Usage
/// ```ignore
/// let queue = InMemoryJobQueue::new(ids);
/// let job_id = queue.push(JobEnvelope::new("reindex.v1", args))?;
/// let next = queue.pop(Duration::from_millis(100))?;
/// ```
pub struct InMemoryJobQueue {
    state: Mutex<State>,
    condvar: Condvar,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryJobQueue {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(State {
                ready: VecDeque::new(),
                closed: false,
            }),
            condvar: Condvar::new(),
            ids,
        }
    }

    /// Refuse further pushes and wake every waiting `pop`.
    ///
    /// Envelopes already queued can still be popped; after that `pop`
    /// returns `QueueError::Closed`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.condvar.notify_all();
    }
}

impl JobQueue for InMemoryJobQueue {
    fn push(&self, mut envelope: JobEnvelope) -> Result<JobId, QueueError> {
        let job_id = self.ids.generate_job_id();
        envelope.assign_id(job_id);
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.ready.push_back(envelope);
        }
        self.condvar.notify_one();
        Ok(job_id)
    }

    fn pop(&self, timeout: Duration) -> Result<Option<JobEnvelope>, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(envelope) = state.ready.pop_front() {
                return Ok(Some(envelope));
            }
            if state.closed {
                return Err(QueueError::Closed);
            }
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                return Ok(state.ready.pop_front());
            }
        }
    }

    fn len(&self) -> usize {
        self.state.lock().ready.len()
    }
}
