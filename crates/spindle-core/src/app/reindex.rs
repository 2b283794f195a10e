//! ReindexScheduler - rebuild search documents for every record of a type.
//!
//! Uses the same static partitioning as `ParallelBatchProcessor`, but
//! reports to the console only: there is no Task here, so it can run from
//! a maintenance script as well as from inside a job.

use std::ops::Range;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use super::batch::{DEFAULT_BATCH_SIZE, partition};
use super::progress::ProgressReporter;
use crate::domain::errors::panic_message;
use crate::domain::{IndexError, ReindexError};
use crate::ports::{Clock, RecordStore, RecordType, SearchIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReindexSummary {
    pub total: usize,
    pub indexed: usize,
    pub threads: usize,
}

struct Progress {
    label: String,
    total: usize,
    started_at: DateTime<Utc>,
    indexed: Mutex<usize>,
}

pub struct ReindexScheduler {
    records: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    default_threads: usize,
    print_progress: bool,
}

impl ReindexScheduler {
    pub fn new(records: Arc<dyn RecordStore>, index: Arc<dyn SearchIndex>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            index,
            clock,
            batch_size: DEFAULT_BATCH_SIZE,
            default_threads: 1,
            print_progress: false,
        }
    }

    /// Records fetched per `keys` page; caps memory per worker.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_default_threads(mut self, threads: usize) -> Self {
        self.default_threads = threads.max(1);
        self
    }

    pub fn with_print_progress(mut self, print_progress: bool) -> Self {
        self.print_progress = print_progress;
        self
    }

    /// Re-index every record of `record_type`, over `threads` workers
    /// (the configured default when `None`).
    ///
    /// A worker stops at its first failed read or index write; the others
    /// run to the end of their ranges and the first error is returned.
    pub fn reindex_all(
        &self,
        record_type: &RecordType,
        threads: Option<usize>,
    ) -> Result<ReindexSummary, ReindexError> {
        let wrap = |source: IndexError| ReindexError::Index {
            record_type: record_type.to_string(),
            source,
        };

        let total = self.records.count(record_type).map_err(wrap)?;
        let ranges = partition(total, threads.unwrap_or(self.default_threads));
        info!(%record_type, total, threads = ranges.len(), "reindexing");

        let progress = Progress {
            label: format!("Indexing {record_type}"),
            total,
            started_at: self.clock.now(),
            indexed: Mutex::new(0),
        };

        let results: Vec<Result<(), ReindexError>> = thread::scope(|s| {
            let handles: Vec<_> = ranges
                .iter()
                .cloned()
                .enumerate()
                .map(|(worker, range)| {
                    let progress = &progress;
                    (worker, s.spawn(move || self.index_range(record_type, range, progress)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(worker, handle)| match handle.join() {
                    Ok(result) => result.map_err(wrap),
                    Err(payload) => Err(ReindexError::WorkerPanicked {
                        worker,
                        message: panic_message(payload.as_ref()),
                    }),
                })
                .collect()
        });
        results.into_iter().collect::<Result<Vec<()>, _>>()?;

        let indexed = progress.indexed.into_inner();
        info!(%record_type, indexed, "reindex finished");
        Ok(ReindexSummary {
            total,
            indexed,
            threads: ranges.len(),
        })
    }

    fn index_range(
        &self,
        record_type: &RecordType,
        range: Range<usize>,
        progress: &Progress,
    ) -> Result<(), IndexError> {
        let mut offset = range.start;
        while offset < range.end {
            let limit = self.batch_size.min(range.end - offset);
            let keys = self.records.keys(record_type, offset, limit)?;
            if keys.is_empty() {
                break;
            }
            let fetched = keys.len().min(limit);
            for key in keys.iter().take(limit) {
                self.index.index_record(record_type, key)?;

                let mut indexed = progress.indexed.lock();
                *indexed += 1;
                if self.print_progress {
                    ProgressReporter::print(
                        &progress.label,
                        *indexed,
                        progress.total,
                        progress.started_at,
                        self.clock.now(),
                    );
                }
            }
            offset += fetched;
        }
        Ok(())
    }

    /// Remove index documents whose record no longer exists.
    ///
    /// Single-threaded. Collects the orphans while paging, then deletes,
    /// so paging offsets are not shifted by the deletions.
    pub fn delete_orphaned_documents(&self, record_type: &RecordType) -> Result<usize, ReindexError> {
        let wrap = |source: IndexError| ReindexError::Index {
            record_type: record_type.to_string(),
            source,
        };

        let mut orphans = Vec::new();
        let mut offset = 0;
        loop {
            let keys = self
                .index
                .document_keys(record_type, offset, self.batch_size)
                .map_err(wrap)?;
            if keys.is_empty() {
                break;
            }
            offset += keys.len();
            for key in keys {
                if !self.records.exists(record_type, &key).map_err(wrap)? {
                    orphans.push(key);
                }
            }
        }

        for key in &orphans {
            debug!(%record_type, key, "deleting orphaned document");
            self.index.delete_document(record_type, key).map_err(wrap)?;
        }
        info!(%record_type, deleted = orphans.len(), "orphan sweep finished");
        Ok(orphans.len())
    }
}
