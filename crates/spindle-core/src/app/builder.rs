//! EngineBuilder - construction and wiring
//!
//! - `EngineConfig`: settings loadable with serde (JSON)
//! - `EngineBuilder`: swaps ports and registers jobs
//! - `build()` validates everything up front (fail-fast)

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::batch::{DEFAULT_BATCH_SIZE, ParallelBatchProcessor};
use super::job::{JobRegistry, JobRunner, Performable, TaskLifecycle};
use super::reindex::ReindexScheduler;
use super::worker::WorkerGroup;
use crate::domain::{ConfigError, DEFAULT_DETAIL_LINE_MAX, JobError};
use crate::impls::{InMemoryJobQueue, InMemoryRecordStore, InMemorySearchIndex, InMemoryTaskStore};
use crate::ports::{
    Clock, ErrorNotifier, IdGenerator, JobQueue, LogNotifier, RecordStore, SearchIndex, SystemClock,
    TaskStore, UlidGenerator,
};

/// Where the engine runs. Failures are only reported to the
/// `ErrorNotifier` outside `Test`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn notifies_errors(self) -> bool {
        self != Environment::Test
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub environment: Environment,
    /// Threads used when a caller does not say.
    pub default_threads: usize,
    /// Elements fetched per `slice`/`keys` call.
    pub batch_size: usize,
    /// Longest per-item error summary kept in a Task's detail.
    pub detail_line_max: usize,
    pub print_progress: bool,
    pub worker_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            default_threads: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            detail_line_max: DEFAULT_DETAIL_LINE_MAX,
            print_progress: false,
            worker_poll_ms: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("default_threads", self.default_threads as u64),
            ("batch_size", self.batch_size as u64),
            ("detail_line_max", self.detail_line_max as u64),
            ("worker_poll_ms", self.worker_poll_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }
}

/// Builds an `Engine`.
///
/// # Example
/// ```ignore
/// let engine = EngineBuilder::new()
///     .config(EngineConfig::from_json_str(&raw)?)
///     .register(ExportItems)?
///     .expect_jobs(&[ExportItems::TYPE])
///     .build()?;
/// ```
///
/// Ports that are not swapped get the in-memory implementation.
pub struct EngineBuilder {
    config: EngineConfig,
    registry: JobRegistry,
    expected_jobs: Option<Vec<String>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    store: Option<Arc<dyn TaskStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    notifier: Option<Arc<dyn ErrorNotifier>>,
    records: Option<Arc<dyn RecordStore>>,
    index: Option<Arc<dyn SearchIndex>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: JobRegistry::new(),
            expected_jobs: None,
            clock: None,
            ids: None,
            store: None,
            queue: None,
            notifier: None,
            records: None,
            index: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ErrorNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Register a job.
    pub fn register<P: Performable>(mut self, job: P) -> Result<Self, JobError> {
        self.registry.register(job)?;
        Ok(self)
    }

    /// Job types that must be registered by `build()`.
    pub fn expect_jobs(mut self, job_types: &[&str]) -> Self {
        self.expected_jobs = Some(job_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// # Validation
    /// - no zero values in the config
    /// - every job type passed to `expect_jobs()` is registered
    pub fn build(self) -> Result<Engine, ConfigError> {
        self.config.validate()?;

        if let Some(expected_jobs) = &self.expected_jobs {
            let registered_types = self.registry.registered_types();
            let missing: Vec<String> = expected_jobs
                .iter()
                .filter(|x| !registered_types.contains(x))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(ConfigError::MissingJobTypes(missing));
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new(Arc::clone(&ids), Arc::clone(&clock))));
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(InMemoryJobQueue::new(Arc::clone(&ids))));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let records = self
            .records
            .unwrap_or_else(|| Arc::new(InMemoryRecordStore::new()));
        let index = self
            .index
            .unwrap_or_else(|| Arc::new(InMemorySearchIndex::new()));

        let batch = Arc::new(ParallelBatchProcessor::new(
            Arc::clone(&clock),
            self.config.batch_size,
        ));
        let lifecycle = TaskLifecycle::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            notifier,
            self.config.environment,
            self.config.detail_line_max,
        );
        let runner = Arc::new(JobRunner::new(
            Arc::new(self.registry),
            lifecycle,
            Arc::clone(&queue),
            ids,
            Arc::clone(&batch),
        ));
        let reindexer = ReindexScheduler::new(records, index, clock)
            .with_batch_size(self.config.batch_size)
            .with_default_threads(self.config.default_threads)
            .with_print_progress(self.config.print_progress);

        info!(
            environment = ?self.config.environment,
            jobs = ?runner.registry().registered_types(),
            "engine built"
        );
        Ok(Engine {
            config: self.config,
            store,
            queue,
            runner,
            batch,
            reindexer,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired engine: everything a host process needs to run jobs.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn JobQueue>,
    runner: Arc<JobRunner>,
    batch: Arc<ParallelBatchProcessor>,
    reindexer: ReindexScheduler,
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    pub fn batch(&self) -> &ParallelBatchProcessor {
        &self.batch
    }

    pub fn reindexer(&self) -> &ReindexScheduler {
        &self.reindexer
    }

    /// Start `n` background workers on this engine's queue.
    pub fn spawn_workers(&self, n: usize) -> WorkerGroup {
        WorkerGroup::spawn(
            n,
            Arc::clone(&self.queue),
            Arc::clone(&self.runner),
            Duration::from_millis(self.config.worker_poll_ms),
        )
    }
}
