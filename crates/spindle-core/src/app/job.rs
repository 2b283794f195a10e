//! Job lifecycle wrapper.
//!
//! Two layers:
//! - **Performable**: a concrete job, generic over its `Args` type. It only
//!   does the work.
//! - **TaskLifecycle / JobRunner**: the hooks that create the Task, move it
//!   to Running, finish it, and record uncaught failures. They work the
//!   same for every job and know nothing about its business logic.
//!
//! `JobRegistry` erases `Performable<Args = A>` into `DynPerformable` so
//! background workers can look a job up by its `TYPE` string and decode its
//! args from the queued JSON.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::batch::{BatchReport, ParallelBatchProcessor};
use super::builder::Environment;
use super::task_handle::TaskHandle;
use crate::domain::{
    BatchError, JobEnvelope, JobError, JobId, NewTask, StoreError, TaskRecord, DEFAULT_QUEUE,
};
use crate::ports::{Clock, ErrorNotifier, IdGenerator, JobFailure, JobQueue, TaskStore, Workload};

/// A unit of work the engine can run in the foreground or from a queue.
///
/// # Example
/// ```ignore
/// struct ExportItems;
///
/// impl Performable for ExportItems {
///     const TYPE: &'static str = "export.items.v1";
///     type Args = ExportArgs;
///
///     fn perform(&self, args: ExportArgs, ctx: &JobContext) -> anyhow::Result<()> {
///         ctx.task().set_status_text("Writing rows")?;
///         let key = write_export(&args)?;
///         ctx.task().succeed_with_result(key)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Performable: Send + Sync + 'static {
    /// Job type name, used as the registry key.
    ///
    /// Convention: `{domain}.{action}.v{major}`, e.g. `reindex.items.v1`.
    const TYPE: &'static str;

    type Args: Serialize + DeserializeOwned + Send;

    /// Name given to the Task that tracks this job.
    fn task_name(&self, _args: &Self::Args) -> String {
        Self::TYPE.to_string()
    }

    /// Do the work. Returning `Err` (or panicking) fails the Task.
    ///
    /// The body may finish the Task itself (e.g. `succeed_with_result`);
    /// otherwise it is marked succeeded when this returns `Ok`.
    fn perform(&self, args: Self::Args, ctx: &JobContext) -> anyhow::Result<()>;
}

/// Object-safe form of `Performable`, working on JSON args.
pub trait DynPerformable: Send + Sync {
    fn job_type(&self) -> &'static str;

    fn task_name_dyn(&self, args: &serde_json::Value) -> String;

    fn perform_dyn(&self, args: serde_json::Value, ctx: &JobContext) -> anyhow::Result<()>;
}

struct TypedPerformable<P: Performable> {
    job: P,
    _marker: PhantomData<fn(P::Args)>,
}

impl<P: Performable> DynPerformable for TypedPerformable<P> {
    fn job_type(&self) -> &'static str {
        P::TYPE
    }

    fn task_name_dyn(&self, args: &serde_json::Value) -> String {
        serde_json::from_value::<P::Args>(args.clone())
            .map(|args| self.job.task_name(&args))
            .unwrap_or_else(|_| P::TYPE.to_string())
    }

    fn perform_dyn(&self, args: serde_json::Value, ctx: &JobContext) -> anyhow::Result<()> {
        let args: P::Args = serde_json::from_value(args).map_err(|source| JobError::Decode {
            job_type: P::TYPE.to_string(),
            source,
        })?;
        self.job.perform(args, ctx)
    }
}

/// Registry of jobs by `TYPE`.
///
/// Built during initialization (mutable), then shared read-only.
#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, Arc<dyn DynPerformable>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Performable>(&mut self, job: P) -> Result<(), JobError> {
        if self.jobs.contains_key(P::TYPE) {
            return Err(JobError::DuplicateJobType {
                job_type: P::TYPE.to_string(),
            });
        }
        self.jobs.insert(
            P::TYPE,
            Arc::new(TypedPerformable {
                job,
                _marker: PhantomData,
            }),
        );
        Ok(())
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn DynPerformable>> {
        self.jobs.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.jobs.contains_key(job_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.jobs.keys().map(|t| t.to_string()).collect();
        types.sort();
        types
    }
}

/// What a running job body can reach.
pub struct JobContext {
    job_id: JobId,
    task: Arc<TaskHandle>,
    batch: Arc<ParallelBatchProcessor>,
}

impl JobContext {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn task(&self) -> &Arc<TaskHandle> {
        &self.task
    }

    pub fn batch(&self) -> &ParallelBatchProcessor {
        &self.batch
    }

    /// Fan `work` out over `threads` workers, reporting into this job's Task.
    pub fn process_in_parallel<T, W, F>(
        &self,
        workload: &W,
        threads: usize,
        print_progress: bool,
        work: F,
    ) -> Result<BatchReport, BatchError>
    where
        T: Send,
        W: Workload<T> + ?Sized,
        F: Fn(T) -> anyhow::Result<()> + Sync,
    {
        self.batch
            .process_in_parallel(workload, threads, Some(&*self.task), print_progress, work)
    }
}

/// The hooks around a job's `perform`.
///
/// Each hook is a plain method so it can be exercised without a queue or a
/// concrete job.
pub struct TaskLifecycle {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn ErrorNotifier>,
    environment: Environment,
    detail_line_max: usize,
}

impl TaskLifecycle {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn ErrorNotifier>,
        environment: Environment,
        detail_line_max: usize,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            environment,
            detail_line_max,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    fn handle(&self, record: TaskRecord) -> Arc<TaskHandle> {
        Arc::new(TaskHandle::new(
            record,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.detail_line_max,
        ))
    }

    /// Runs before an envelope is handed to the queue.
    pub fn before_enqueue(&self, registry: &JobRegistry, envelope: &JobEnvelope) -> Result<(), JobError> {
        if !registry.contains(envelope.job_type()) {
            return Err(JobError::UnknownJobType(envelope.job_type().to_string()));
        }
        debug!(job_type = envelope.job_type(), queue = envelope.queue(), "enqueueing job");
        Ok(())
    }

    /// Runs once the queue has assigned a job id: creates the Task.
    ///
    /// A Task that already exists for `job_id` is left alone; queue
    /// runners may call this more than once for one job.
    pub fn after_enqueue(&self, job_id: JobId, name: &str, queue: &str) -> Result<(), JobError> {
        match self
            .store
            .create(NewTask::new(name).for_job(job_id).on_queue(queue))
        {
            Ok(task) => {
                debug!(%job_id, task_id = %task.task_id(), "task created for queued job");
                Ok(())
            }
            Err(StoreError::DuplicateJobId(_)) => {
                debug!(%job_id, "task already exists for job");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Task for a foreground run, keyed by a locally generated job id.
    pub fn create_for_foreground(&self, job_id: JobId, name: &str) -> Result<Arc<TaskHandle>, JobError> {
        let record = self.store.create(NewTask::new(name).for_job(job_id))?;
        Ok(self.handle(record))
    }

    /// Task for a queued job about to run, creating it if `after_enqueue`
    /// has not got to it yet.
    pub fn attach(&self, job_id: JobId, name: &str, queue: &str) -> Result<Arc<TaskHandle>, JobError> {
        if let Some(record) = self.store.find_by_job_id(job_id)? {
            return Ok(self.handle(record));
        }
        match self
            .store
            .create(NewTask::new(name).for_job(job_id).on_queue(queue))
        {
            Ok(record) => Ok(self.handle(record)),
            Err(StoreError::DuplicateJobId(_)) => {
                let record = self
                    .store
                    .find_by_job_id(job_id)?
                    .ok_or_else(|| StoreError::Backend(format!("task for {job_id} vanished")))?;
                Ok(self.handle(record))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn before_perform(&self, task: &TaskHandle) -> Result<(), JobError> {
        task.set_status(crate::domain::TaskStatus::Running)?;
        Ok(())
    }

    /// Marks the Task succeeded unless the job already finished it.
    pub fn after_perform(&self, task: &TaskHandle) -> Result<(), JobError> {
        if task.snapshot().is_terminal() {
            return Ok(());
        }
        task.succeed()?;
        Ok(())
    }

    /// Records an uncaught failure on the Task and notifies.
    ///
    /// Never fails itself: a Task that cannot be updated is logged, since
    /// the original failure is what the caller needs to see.
    pub fn on_failure(
        &self,
        task: &TaskHandle,
        job_id: JobId,
        job_type: &str,
        message: &str,
        backtrace: Option<String>,
    ) {
        error!(%job_id, job_type, "job failed: {message}");
        if let Err(err) = task.fail(message, backtrace.clone()) {
            warn!(%job_id, error = %err, "could not record job failure on task");
        }
        if self.environment.notifies_errors() {
            self.notifier.notify(&JobFailure {
                job_id,
                task_id: task.task_id(),
                job_type: job_type.to_string(),
                message: message.to_string(),
                backtrace,
            });
        }
    }
}

fn backtrace_of(err: &anyhow::Error) -> Option<String> {
    let backtrace = err.backtrace();
    (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string())
}

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chain a panic hook that keeps a backtrace of the panic site for the
/// panicking thread. The previous hook still runs.
fn install_panic_backtrace_hook() {
    static INSTALLED: Once = Once::new();
    INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = PANIC_BACKTRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Backtrace of the panic just caught on this thread. Falls back to the
/// catch site when another hook replaced ours.
fn take_panic_backtrace() -> String {
    PANIC_BACKTRACE
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

/// Runs jobs through the lifecycle, in the foreground or via a queue.
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    lifecycle: TaskLifecycle,
    queue: Arc<dyn JobQueue>,
    ids: Arc<dyn IdGenerator>,
    batch: Arc<ParallelBatchProcessor>,
}

impl JobRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        lifecycle: TaskLifecycle,
        queue: Arc<dyn JobQueue>,
        ids: Arc<dyn IdGenerator>,
        batch: Arc<ParallelBatchProcessor>,
    ) -> Self {
        install_panic_backtrace_hook();
        Self {
            registry,
            lifecycle,
            queue,
            ids,
            batch,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &TaskLifecycle {
        &self.lifecycle
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Submit a registered job to the background queue on the default queue.
    pub fn enqueue<P: Performable>(&self, args: &P::Args) -> Result<JobId, JobError> {
        self.enqueue_on::<P>(DEFAULT_QUEUE, args)
    }

    pub fn enqueue_on<P: Performable>(&self, queue: &str, args: &P::Args) -> Result<JobId, JobError> {
        let args = serde_json::to_value(args).map_err(|source| JobError::Decode {
            job_type: P::TYPE.to_string(),
            source,
        })?;
        let envelope = JobEnvelope::new(P::TYPE, args).on_queue(queue);
        self.lifecycle.before_enqueue(&self.registry, &envelope)?;

        let name = self
            .registry
            .get(P::TYPE)
            .map(|job| job.task_name_dyn(envelope.args()))
            .unwrap_or_else(|| P::TYPE.to_string());
        let job_id = self.queue.push(envelope)?;
        self.lifecycle.after_enqueue(job_id, &name, queue)?;
        info!(%job_id, job_type = P::TYPE, "job enqueued");
        Ok(job_id)
    }

    /// Run `job` now, on the calling thread, tracked by a fresh Task.
    ///
    /// On failure the Task is failed and the error returned; a panic is
    /// recorded the same way and then resumed.
    pub fn perform_in_foreground<P: Performable>(&self, job: &P, args: P::Args) -> Result<TaskRecord, JobError> {
        let job_id = self.ids.generate_job_id();
        let task = self
            .lifecycle
            .create_for_foreground(job_id, &job.task_name(&args))?;
        self.run_guarded(job_id, P::TYPE, task, |ctx| job.perform(args, ctx))
    }

    /// Run one envelope taken off the queue.
    pub fn perform_enqueued(&self, envelope: JobEnvelope) -> Result<TaskRecord, JobError> {
        let job = self
            .registry
            .get(envelope.job_type())
            .ok_or_else(|| JobError::UnknownJobType(envelope.job_type().to_string()))?;
        let job_id = match envelope.job_id() {
            Some(job_id) => job_id,
            None => self.ids.generate_job_id(),
        };
        let name = job.task_name_dyn(envelope.args());
        let task = self.lifecycle.attach(job_id, &name, envelope.queue())?;
        let job_type = job.job_type();
        let args = envelope.args().clone();
        self.run_guarded(job_id, job_type, task, |ctx| job.perform_dyn(args, ctx))
    }

    fn run_guarded<F>(
        &self,
        job_id: JobId,
        job_type: &str,
        task: Arc<TaskHandle>,
        body: F,
    ) -> Result<TaskRecord, JobError>
    where
        F: FnOnce(&JobContext) -> anyhow::Result<()>,
    {
        let ctx = JobContext {
            job_id,
            task: Arc::clone(&task),
            batch: Arc::clone(&self.batch),
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
            self.lifecycle.before_perform(&task)?;
            body(&ctx)?;
            self.lifecycle.after_perform(&task)?;
            Ok(())
        }));

        match outcome {
            Ok(Ok(())) => {
                debug!(%job_id, job_type, "job finished");
                Ok(task.snapshot())
            }
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                self.lifecycle
                    .on_failure(&task, job_id, job_type, &message, backtrace_of(&err));
                Err(JobError::Perform { job_id, source: err })
            }
            Err(payload) => {
                let message = format!(
                    "panicked: {}",
                    crate::domain::errors::panic_message(payload.as_ref())
                );
                let backtrace = take_panic_backtrace();
                self.lifecycle
                    .on_failure(&task, job_id, job_type, &message, Some(backtrace));
                panic::resume_unwind(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use crate::impls::{InMemoryJobQueue, InMemoryTaskStore};
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::time::Duration;
    use tracing_test::traced_test;
    use ulid::Ulid;

    #[derive(Default)]
    struct RecordingNotifier {
        failures: Mutex<Vec<JobFailure>>,
    }

    impl ErrorNotifier for RecordingNotifier {
        fn notify(&self, failure: &JobFailure) {
            self.failures.lock().push(failure.clone());
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Greet {
        name: String,
        fail: bool,
    }

    struct GreetJob;

    impl Performable for GreetJob {
        const TYPE: &'static str = "test.greet.v1";
        type Args = Greet;

        fn task_name(&self, args: &Greet) -> String {
            format!("Greet {}", args.name)
        }

        fn perform(&self, args: Greet, ctx: &JobContext) -> anyhow::Result<()> {
            ctx.task().set_status_text(format!("greeting {}", args.name))?;
            if args.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    struct ExportJob;

    impl Performable for ExportJob {
        const TYPE: &'static str = "test.export.v1";
        type Args = ();

        fn perform(&self, _args: (), ctx: &JobContext) -> anyhow::Result<()> {
            ctx.task().succeed_with_result("exports/all.tsv")?;
            Ok(())
        }
    }

    struct PanicJob;

    impl Performable for PanicJob {
        const TYPE: &'static str = "test.panic.v1";
        type Args = ();

        fn perform(&self, _args: (), _ctx: &JobContext) -> anyhow::Result<()> {
            panic!("unexpected state");
        }
    }

    struct Fixture {
        store: Arc<InMemoryTaskStore>,
        queue: Arc<InMemoryJobQueue>,
        notifier: Arc<RecordingNotifier>,
        runner: JobRunner,
    }

    fn fixture(environment: Environment) -> Fixture {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let store = Arc::new(InMemoryTaskStore::new(ids.clone(), clock.clone()));
        let queue = Arc::new(InMemoryJobQueue::new(ids.clone()));
        let notifier = Arc::new(RecordingNotifier::default());

        let mut registry = JobRegistry::new();
        registry.register(GreetJob).unwrap();
        registry.register(ExportJob).unwrap();

        let lifecycle = TaskLifecycle::new(store.clone(), clock.clone(), notifier.clone(), environment, 256);
        let batch = Arc::new(ParallelBatchProcessor::new(clock, 1000));
        let runner = JobRunner::new(Arc::new(registry), lifecycle, queue.clone(), ids, batch);
        Fixture {
            store,
            queue,
            notifier,
            runner,
        }
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = JobRegistry::new();
        registry.register(GreetJob).unwrap();
        let err = registry.register(GreetJob).unwrap_err();
        assert!(matches!(err, JobError::DuplicateJobType { .. }));
        assert_eq!(registry.registered_types(), vec![GreetJob::TYPE.to_string()]);
    }

    #[test]
    fn foreground_success_finishes_task() {
        let f = fixture(Environment::Test);
        let task = f
            .runner
            .perform_in_foreground(&GreetJob, Greet { name: "Ada".into(), fail: false })
            .unwrap();

        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(task.name(), "Greet Ada");
        assert_eq!(task.status_text(), Some("greeting Ada"));
        assert!(task.started_at().is_some());
        assert!(task.job_id().is_some());
        assert_eq!(f.store.get(task.task_id()).unwrap().unwrap(), task);
    }

    #[traced_test]
    #[test]
    fn foreground_error_fails_task_and_is_returned() {
        let f = fixture(Environment::Production);
        let err = f
            .runner
            .perform_in_foreground(&GreetJob, Greet { name: "Ada".into(), fail: true })
            .unwrap_err();

        assert!(matches!(err, JobError::Perform { .. }));
        assert!(err.to_string().contains("boom"));

        let task = f.store.list().unwrap().pop().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.detail().unwrap().contains("boom"));
        assert!(task.completed_at().is_some());

        let failures = f.notifier.failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task_id, task.task_id());
        assert!(logs_contain("job failed: boom"));
    }

    #[test]
    fn test_environment_does_not_notify() {
        let f = fixture(Environment::Test);
        let _ = f
            .runner
            .perform_in_foreground(&GreetJob, Greet { name: "x".into(), fail: true });
        assert!(f.notifier.failures.lock().is_empty());
    }

    #[test]
    fn panic_is_recorded_then_resumed() {
        let f = fixture(Environment::Test);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            f.runner.perform_in_foreground(&PanicJob, ())
        }));
        assert!(result.is_err());

        let task = f.store.list().unwrap().pop().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.detail(), Some("panicked: unexpected state"));
        assert!(task.backtrace().is_some_and(|trace| !trace.is_empty()));
        let view = crate::app::TaskStatusView::from(&task);
        assert_eq!(view.backtrace.as_deref(), task.backtrace());
    }

    #[test]
    fn job_that_finishes_itself_keeps_its_result() {
        let f = fixture(Environment::Test);
        let task = f.runner.perform_in_foreground(&ExportJob, ()).unwrap();
        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(task.result_ref(), Some("exports/all.tsv"));
    }

    #[test]
    fn enqueue_creates_waiting_task_keyed_by_queue_id() {
        let f = fixture(Environment::Test);
        let job_id = f
            .runner
            .enqueue_on::<GreetJob>("mail", &Greet { name: "Bo".into(), fail: false })
            .unwrap();

        let task = f.store.find_by_job_id(job_id).unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Waiting);
        assert_eq!(task.name(), "Greet Bo");
        assert_eq!(task.queue(), Some("mail"));
        assert_eq!(f.queue.len(), 1);
    }

    #[test]
    fn enqueue_of_unregistered_job_is_refused() {
        let f = fixture(Environment::Test);
        let err = f.runner.enqueue::<PanicJob>(&()).unwrap_err();
        assert!(matches!(err, JobError::UnknownJobType(t) if t == PanicJob::TYPE));
        assert!(f.queue.is_empty());
        assert!(f.store.is_empty());
    }

    #[test]
    fn after_enqueue_twice_creates_one_task() {
        let f = fixture(Environment::Test);
        let job_id = JobId::from_ulid(Ulid::new());
        f.runner.lifecycle().after_enqueue(job_id, "dup", DEFAULT_QUEUE).unwrap();
        f.runner.lifecycle().after_enqueue(job_id, "dup", DEFAULT_QUEUE).unwrap();
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn enqueued_job_runs_against_its_task() {
        let f = fixture(Environment::Test);
        let job_id = f
            .runner
            .enqueue::<GreetJob>(&Greet { name: "Cy".into(), fail: false })
            .unwrap();
        let envelope = f.queue.pop(Duration::from_millis(10)).unwrap().unwrap();

        let task = f.runner.perform_enqueued(envelope).unwrap();
        assert_eq!(task.job_id(), Some(job_id));
        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn perform_before_after_enqueue_still_yields_one_task() {
        let f = fixture(Environment::Test);
        let args = serde_json::to_value(Greet { name: "Di".into(), fail: false }).unwrap();
        let job_id = f.queue.push(JobEnvelope::new(GreetJob::TYPE, args)).unwrap();
        let envelope = f.queue.pop(Duration::from_millis(10)).unwrap().unwrap();

        f.runner.perform_enqueued(envelope).unwrap();
        f.runner.lifecycle().after_enqueue(job_id, "late hook", DEFAULT_QUEUE).unwrap();

        let task = f.store.find_by_job_id(job_id).unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn undecodable_args_fail_the_task() {
        let f = fixture(Environment::Test);
        let job_id = f
            .queue
            .push(JobEnvelope::new(GreetJob::TYPE, serde_json::json!({"nope": 1})))
            .unwrap();
        let envelope = f.queue.pop(Duration::from_millis(10)).unwrap().unwrap();

        assert!(f.runner.perform_enqueued(envelope).is_err());
        let task = f.store.find_by_job_id(job_id).unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.detail().unwrap().contains("decoding args"));
    }

    #[test]
    fn hooks_work_without_a_job() {
        let f = fixture(Environment::Test);
        let lifecycle = f.runner.lifecycle();
        let task = lifecycle
            .create_for_foreground(JobId::from_ulid(Ulid::new()), "bare")
            .unwrap();

        lifecycle.before_perform(&task).unwrap();
        assert_eq!(task.status(), TaskStatus::Running);

        lifecycle.after_perform(&task).unwrap();
        assert_eq!(task.status(), TaskStatus::Succeeded);

        // already terminal: after_perform is a no-op
        lifecycle.after_perform(&task).unwrap();
    }
}
