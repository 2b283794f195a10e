//! WorkerGroup - background threads that run queued jobs.
//!
//! Each worker pops one envelope at a time with a poll timeout, so a
//! shutdown request is noticed within one poll interval. A closed queue
//! stops the worker once it is drained.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use super::job::JobRunner;
use crate::domain::QueueError;
use crate::domain::errors::panic_message;
use crate::ports::JobQueue;

/// Worker group handle.
/// - `request_shutdown()` stops every worker from taking new jobs
/// - `shutdown_and_join()` also waits for all of them to exit
pub struct WorkerGroup {
    shutdown: Arc<AtomicBool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` worker threads pulling from `queue`.
    pub fn spawn(n: usize, queue: Arc<dyn JobQueue>, runner: Arc<JobRunner>, poll: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let r = Arc::clone(&runner);
            let stop = Arc::clone(&shutdown);

            let spawned = thread::Builder::new()
                .name(format!("spindle-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, q, r, stop, poll));
            match spawned {
                Ok(join) => joins.push(join),
                Err(err) => error!(worker_id, error = %err, "could not spawn worker thread"),
            }
        }

        Self { shutdown, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Request shutdown for all workers.
    /// A job already running is not interrupted; workers just stop taking
    /// new ones after their current poll.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Shutdown and wait for all workers.
    pub fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            // worker_loop contains job panics, so join does not fail
            let _ = j.join();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn JobQueue>,
    runner: Arc<JobRunner>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
) {
    debug!(worker_id, "worker started");
    loop {
        // stop once shutdown was requested
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let envelope = match queue.pop(poll) {
            Ok(Some(envelope)) => envelope,
            // poll timeout: recheck shutdown
            Ok(None) => continue,
            Err(QueueError::Closed) => break,
            Err(err) => {
                warn!(worker_id, error = %err, "queue pop failed");
                thread::sleep(poll);
                continue;
            }
        };

        let job_type = envelope.job_type().to_string();
        // perform_enqueued records a panic on the Task, then resumes it; stop it here so the worker survives
        match panic::catch_unwind(AssertUnwindSafe(|| runner.perform_enqueued(envelope))) {
            Ok(Ok(task)) => debug!(worker_id, task_id = %task.task_id(), job_type, "job done"),
            Ok(Err(err)) => warn!(worker_id, job_type, error = %err, "job did not succeed"),
            Err(payload) => error!(
                worker_id,
                job_type,
                "job panicked: {}",
                panic_message(payload.as_ref())
            ),
        }
    }
    debug!(worker_id, "worker stopped");
}
