//! ParallelBatchProcessor - fan a workload out over worker threads.
//!
//! The workload is split into one contiguous index range per thread
//! (`partition`). Each worker reads its range in chunks of at most
//! `batch_size` elements and applies the work function to every element.
//! A failing (or panicking) element is counted and summarized on the Task,
//! then the worker moves on; one bad element never stops the batch.
//!
//! Static partitioning does not rebalance when element costs vary, and a
//! running batch cannot be cancelled: it ends when every worker has walked
//! its range.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::progress::ProgressReporter;
use super::task_handle::TaskHandle;
use crate::domain::errors::panic_message;
use crate::domain::{BatchError, COMPLETION_EPSILON, TaskUpdateError, WorkloadError};
use crate::ports::{Clock, Workload};

/// Largest chunk a worker fetches from the workload at once.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Highest progress value written before the last element is done.
///
/// Keeps large totals from rounding up to 1.0 in `f32`, which would
/// auto-succeed the Task early.
const ALMOST_DONE: f32 = 1.0 - 2.0 * COMPLETION_EPSILON;

/// Split `[0, total)` into contiguous, disjoint ranges, one per thread.
///
/// Each range holds `ceil(total / threads)` elements except possibly the
/// last. Threads that would get nothing get no range, so fewer than
/// `threads` ranges come back when there are fewer elements than threads.
pub fn partition(total: usize, threads: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let per_thread = total.div_ceil(threads.max(1));
    (0..threads.max(1))
        .map(|i| i * per_thread)
        .take_while(|&start| start < total)
        .map(|start| start..(start + per_thread).min(total))
        .collect()
}

/// What a finished batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
    pub threads: usize,
}

/// Counters shared by all workers of one run.
#[derive(Default)]
struct Tally {
    completed: usize,
    errors: usize,
    /// First Task write the store refused.
    write_error: Option<TaskUpdateError>,
}

struct Run<'a> {
    total: usize,
    task: Option<&'a TaskHandle>,
    print_progress: bool,
    label: String,
    started_at: DateTime<Utc>,
    tally: Mutex<Tally>,
}

pub struct ParallelBatchProcessor {
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl ParallelBatchProcessor {
    pub fn new(clock: Arc<dyn Clock>, batch_size: usize) -> Self {
        Self {
            clock,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Apply `work` to every element of `workload` using up to `threads`
    /// worker threads.
    ///
    /// Per-element errors and panics are isolated: they increment the error
    /// count and append a line to the Task's `detail`. The Task is marked
    /// succeeded once every element was attempted, whatever the error
    /// count; with errors, its `status_text` becomes
    /// `"Processed N items with E errors"` in the same write.
    ///
    /// A failing `workload.slice` is not isolated: it stops that worker, and
    /// the call returns the error after all workers finish. A Task write the
    /// store rejects does not stop the workers either, but the call then
    /// returns `BatchError::Task` instead of succeeding the Task. Both leave
    /// the Task open for the caller to fail.
    pub fn process_in_parallel<T, W, F>(
        &self,
        workload: &W,
        threads: usize,
        task: Option<&TaskHandle>,
        print_progress: bool,
        work: F,
    ) -> Result<BatchReport, BatchError>
    where
        T: Send,
        W: Workload<T> + ?Sized,
        F: Fn(T) -> anyhow::Result<()> + Sync,
    {
        let total = workload.count()?;
        if total == 0 {
            if let Some(task) = task {
                finish(task, 0, 0)?;
            }
            return Ok(BatchReport {
                total: 0,
                processed: 0,
                errors: 0,
                threads: 0,
            });
        }

        let ranges = partition(total, threads);
        let run = Run {
            total,
            task,
            print_progress,
            label: task.map_or_else(|| "Processing".to_string(), |t| t.snapshot().name().to_string()),
            started_at: self.clock.now(),
            tally: Mutex::new(Tally::default()),
        };
        debug!(total, threads = ranges.len(), "starting parallel batch");

        let results: Vec<Result<(), BatchError>> = thread::scope(|s| {
            let handles: Vec<_> = ranges
                .iter()
                .cloned()
                .enumerate()
                .map(|(worker, range)| {
                    let run = &run;
                    let work = &work;
                    (worker, s.spawn(move || self.run_range(worker, range, workload, work, run)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(worker, handle)| match handle.join() {
                    Ok(result) => result.map_err(BatchError::from),
                    Err(payload) => Err(BatchError::WorkerPanicked {
                        worker,
                        message: panic_message(payload.as_ref()),
                    }),
                })
                .collect()
        });

        results.into_iter().collect::<Result<Vec<()>, _>>()?;

        let tally = run.tally.into_inner();
        if let Some(err) = tally.write_error {
            return Err(BatchError::Task(err));
        }
        if let Some(task) = task {
            finish(task, tally.completed, tally.errors)?;
        }
        Ok(BatchReport {
            total,
            processed: tally.completed,
            errors: tally.errors,
            threads: ranges.len(),
        })
    }

    fn run_range<T, W, F>(
        &self,
        worker: usize,
        range: Range<usize>,
        workload: &W,
        work: &F,
        run: &Run<'_>,
    ) -> Result<(), WorkloadError>
    where
        W: Workload<T> + ?Sized,
        F: Fn(T) -> anyhow::Result<()>,
    {
        let mut offset = range.start;
        while offset < range.end {
            let limit = self.batch_size.min(range.end - offset);
            let chunk = workload.slice(offset, limit)?;
            if chunk.is_empty() {
                // The workload shrank since it was counted.
                break;
            }
            let fetched = chunk.len().min(limit);

            for (i, item) in chunk.into_iter().take(limit).enumerate() {
                let index = offset + i;
                let error = match panic::catch_unwind(AssertUnwindSafe(|| work(item))) {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => Some(format!("item {index}: {err:#}")),
                    Err(payload) => Some(format!(
                        "item {index}: panicked: {}",
                        panic_message(payload.as_ref())
                    )),
                };
                if let Some(summary) = &error {
                    warn!(worker, index, "{summary}");
                }
                self.record(run, error.as_deref());
            }
            offset += fetched;
        }
        Ok(())
    }

    /// Per-element bookkeeping, done under the run's lock.
    fn record(&self, run: &Run<'_>, error: Option<&str>) {
        let mut tally = run.tally.lock();
        tally.completed += 1;
        if error.is_some() {
            tally.errors += 1;
        }

        if let Some(task) = run.task {
            let fraction = ((tally.completed as f64 / run.total as f64) as f32).min(ALMOST_DONE);
            match task.record_item(error, fraction) {
                Ok(()) => {}
                Err(TaskUpdateError::Transition(err)) => {
                    debug!(error = %err, "progress write rejected");
                }
                Err(err) => {
                    warn!(error = %err, "progress write failed");
                    if tally.write_error.is_none() {
                        tally.write_error = Some(err);
                    }
                }
            }
        }

        if run.print_progress {
            ProgressReporter::print(
                &run.label,
                tally.completed,
                run.total,
                run.started_at,
                self.clock.now(),
            );
        }
    }
}

/// Succeed the Task once every element was attempted. A Task something
/// else already closed is left as it is.
fn finish(task: &TaskHandle, processed: usize, errors: usize) -> Result<(), BatchError> {
    let summary = (errors > 0).then(|| format!("Processed {processed} items with {errors} errors"));
    match task.finish_batch(summary) {
        Ok(()) => Ok(()),
        Err(TaskUpdateError::Transition(err)) => {
            debug!(error = %err, "batch finished but task was already closed");
            Ok(())
        }
        Err(err) => Err(BatchError::Task(err)),
    }
}
