//! App - the engine, assembled from ports.
//!
//! # Components
//! - **TaskHandle**: write-through access to a shared Task
//! - **JobRunner / TaskLifecycle**: job lifecycle hooks and execution
//! - **ParallelBatchProcessor**: splits a workload across threads
//! - **ReindexScheduler**: search index rebuilds and orphan sweeps
//! - **WorkerGroup**: background workers that pop jobs off the queue
//! - **EngineBuilder**: config and wiring

pub mod batch;
pub mod builder;
pub mod job;
pub mod progress;
pub mod reindex;
pub mod status;
pub mod task_handle;
pub mod worker;

pub use self::batch::{BatchReport, DEFAULT_BATCH_SIZE, ParallelBatchProcessor, partition};
pub use self::builder::{Engine, EngineBuilder, EngineConfig, Environment};
pub use self::job::{DynPerformable, JobContext, JobRegistry, JobRunner, Performable, TaskLifecycle};
pub use self::progress::ProgressReporter;
pub use self::reindex::{ReindexScheduler, ReindexSummary};
pub use self::status::{StatusCounts, TaskStatusView};
pub use self::task_handle::TaskHandle;
pub use self::worker::WorkerGroup;
