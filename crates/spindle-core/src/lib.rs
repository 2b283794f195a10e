//! spindle-core
//!
//! Task tracking and parallel batch processing for long-running background
//! operations.
//!
//! # Modules
//! - **domain**: ids, task status, task record, envelope, errors
//! - **ports**: TaskStore, JobQueue, Workload, RecordStore, SearchIndex and friends
//! - **impls**: in-memory implementations (tests and the CLI)
//! - **app**: the engine (job lifecycle, batch, reindex, workers, builder, status)

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    Engine, EngineBuilder, EngineConfig, Environment, JobContext, JobRunner, ParallelBatchProcessor,
    Performable, ProgressReporter, ReindexScheduler, TaskHandle, WorkerGroup,
};
pub use domain::{JobId, TaskId, TaskRecord, TaskStatus};
