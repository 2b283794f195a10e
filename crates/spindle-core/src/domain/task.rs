//! Task record: the persisted status of one long-running operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TaskError;
use super::ids::{JobId, TaskId};
use super::state::TaskStatus;

/// Writes within this distance of 1.0 count as complete.
pub const COMPLETION_EPSILON: f32 = 1e-7;

/// Default maximum length of one per-item error line in `detail`.
pub const DEFAULT_DETAIL_LINE_MAX: usize = 256;

/// Input for `TaskStore::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub job_id: Option<JobId>,
    pub queue: Option<String>,
    pub status_text: Option<String>,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            job_id: None,
            queue: None,
            status_text: None,
        }
    }

    pub fn for_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }
}

/// The single source of truth for "what is this operation doing right now".
///
/// Design:
/// - Fields are private; all state transitions go through methods so the
///   progress bounds and terminal stickiness cannot be bypassed.
/// - Every transition takes `now` explicitly (see `ports::Clock`).
/// - Once Succeeded or Failed, every mutator returns `TaskError::Finished`
///   and leaves the record untouched. The one exception is `succeed()` on an
///   already-Succeeded task, which is an idempotent `Ok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    task_id: TaskId,
    job_id: Option<JobId>,
    name: String,
    queue: Option<String>,

    status: TaskStatus,
    percent_complete: f32,
    indeterminate: bool,
    status_text: Option<String>,

    detail: Option<String>,
    backtrace: Option<String>,
    error_count: u64,

    result_ref: Option<String>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(task_id: TaskId, new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            task_id,
            job_id: new.job_id,
            name: new.name,
            queue: new.queue,
            status: TaskStatus::Waiting,
            percent_complete: 0.0,
            indeterminate: false,
            status_text: new.status_text,
            detail: None,
            backtrace: None,
            error_count: 0,
            result_ref: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn percent_complete(&self) -> f32 {
        self.percent_complete
    }

    pub fn indeterminate(&self) -> bool {
        self.indeterminate
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }

    /// Number of per-item failures isolated while this task ran.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn result_ref(&self) -> Option<&str> {
        self.result_ref.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_open(&self) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::Finished {
                task_id: self.task_id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Move to `status`.
    ///
    /// Entering Running stamps `started_at` once. Succeeded finalizes like
    /// `succeed()`; Failed records a failure with no message.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> Result<(), TaskError> {
        match status {
            TaskStatus::Succeeded => return self.succeed(now),
            TaskStatus::Failed => return self.fail("", None, now),
            _ => {}
        }
        self.ensure_open()?;
        if status == TaskStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Record progress, clamped to [0, 1]. Completion auto-succeeds.
    pub fn update_progress(&mut self, fraction: f32, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.ensure_open()?;
        let clamped = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        if (1.0 - clamped).abs() < COMPLETION_EPSILON {
            return self.succeed(now);
        }
        self.percent_complete = clamped;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_status_text(
        &mut self,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        self.ensure_open()?;
        self.status_text = Some(text.into());
        self.updated_at = now;
        Ok(())
    }

    pub fn set_indeterminate(&mut self, indeterminate: bool, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.ensure_open()?;
        self.indeterminate = indeterminate;
        self.updated_at = now;
        Ok(())
    }

    /// Link the artifact this operation produced (by key, not ownership).
    pub fn set_result_ref(&mut self, key: impl Into<String>, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.ensure_open()?;
        self.result_ref = Some(key.into());
        self.updated_at = now;
        Ok(())
    }

    /// Count one isolated per-item failure and append its summary to `detail`.
    ///
    /// The summary is cut to `line_max` characters.
    pub fn record_item_error(
        &mut self,
        summary: &str,
        line_max: usize,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        self.ensure_open()?;
        self.error_count += 1;
        let line = truncate(summary, line_max);
        match &mut self.detail {
            Some(detail) if !detail.is_empty() => {
                detail.push('\n');
                detail.push_str(&line);
            }
            _ => self.detail = Some(line),
        }
        self.updated_at = now;
        Ok(())
    }

    /// Finish successfully.
    ///
    /// Clears `backtrace`; `detail` is kept only when per-item errors were
    /// recorded, since it is then the operator's error summary.
    pub fn succeed(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        if self.status == TaskStatus::Succeeded {
            return Ok(());
        }
        self.ensure_open()?;
        self.status = TaskStatus::Succeeded;
        self.percent_complete = 1.0;
        self.completed_at = Some(now);
        self.updated_at = now;
        self.backtrace = None;
        if self.error_count == 0 {
            self.detail = None;
        }
        Ok(())
    }

    /// Finish with a failure. `percent_complete` keeps how far the work got.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        backtrace: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        self.ensure_open()?;
        let message = message.into();
        self.status = TaskStatus::Failed;
        self.completed_at = Some(now);
        self.updated_at = now;
        self.detail = (!message.is_empty()).then_some(message);
        self.backtrace = backtrace;
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn record() -> TaskRecord {
        TaskRecord::new(TaskId::from_ulid(Ulid::new()), NewTask::new("reindex"), t0())
    }

    #[test]
    fn new_task_starts_waiting() {
        let task = record();
        assert_eq!(task.status(), TaskStatus::Waiting);
        assert_eq!(task.percent_complete(), 0.0);
        assert_eq!(task.name(), "reindex");
        assert!(task.started_at().is_none());
        assert!(task.completed_at().is_none());
    }

    #[rstest]
    #[case::below(-0.5, 0.0)]
    #[case::inside(0.42, 0.42)]
    #[case::nan(f32::NAN, 0.0)]
    fn progress_is_clamped(#[case] input: f32, #[case] expected: f32) {
        let mut task = record();
        task.update_progress(input, t0()).unwrap();
        assert_eq!(task.percent_complete(), expected);
        assert_eq!(task.status(), TaskStatus::Waiting);
    }

    #[rstest]
    #[case::exact(1.0)]
    #[case::within_epsilon(1.0 - 1e-8)]
    #[case::above(7.5)]
    fn progress_at_one_auto_succeeds(#[case] input: f32) {
        let mut task = record();
        task.set_status(TaskStatus::Running, t0()).unwrap();
        let done = t0() + Duration::seconds(5);

        task.update_progress(input, done).unwrap();

        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(task.percent_complete(), 1.0);
        assert_eq!(task.completed_at(), Some(done));
    }

    #[test]
    fn running_stamps_started_at_once() {
        let mut task = record();
        task.set_status(TaskStatus::Running, t0()).unwrap();
        task.set_status(TaskStatus::Paused, t0() + Duration::seconds(1)).unwrap();
        task.set_status(TaskStatus::Running, t0() + Duration::seconds(2)).unwrap();

        assert_eq!(task.started_at(), Some(t0()));
        assert_eq!(task.status(), TaskStatus::Running);
    }

    #[rstest]
    #[case::succeeded(TaskStatus::Succeeded)]
    #[case::failed(TaskStatus::Failed)]
    fn terminal_status_is_sticky(#[case] terminal: TaskStatus) {
        let mut task = record();
        task.set_status(terminal, t0()).unwrap();

        let err = task.set_status(TaskStatus::Running, t0()).unwrap_err();
        assert!(matches!(err, TaskError::Finished { status, .. } if status == terminal));
        assert_eq!(task.status(), terminal);

        assert!(task.update_progress(0.3, t0()).is_err());
        assert!(task.set_status_text("again", t0()).is_err());
        assert!(task.fail("late", None, t0()).is_err());
    }

    #[test]
    fn succeed_is_idempotent_and_does_not_move_completed_at() {
        let mut task = record();
        task.succeed(t0()).unwrap();
        task.succeed(t0() + Duration::seconds(9)).unwrap();
        assert_eq!(task.completed_at(), Some(t0()));
    }

    #[test]
    fn succeed_after_fail_is_rejected() {
        let mut task = record();
        task.fail("boom", None, t0()).unwrap();
        assert!(task.succeed(t0()).is_err());
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[test]
    fn fail_keeps_progress_and_records_detail() {
        let mut task = record();
        task.set_status(TaskStatus::Running, t0()).unwrap();
        task.update_progress(0.6, t0()).unwrap();

        task.fail("boom", Some("at frame 0".into()), t0()).unwrap();

        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.percent_complete(), 0.6);
        assert_eq!(task.detail(), Some("boom"));
        assert_eq!(task.backtrace(), Some("at frame 0"));
        assert_eq!(task.completed_at(), Some(t0()));
    }

    #[test]
    fn item_errors_survive_success() {
        let mut task = record();
        task.record_item_error("item 2: bad", 256, t0()).unwrap();
        task.record_item_error("item 5: worse", 256, t0()).unwrap();
        task.succeed(t0()).unwrap();

        assert_eq!(task.error_count(), 2);
        assert_eq!(task.detail(), Some("item 2: bad\nitem 5: worse"));
    }

    #[test]
    fn success_clears_stale_detail_without_item_errors() {
        let mut task = TaskRecord {
            detail: Some("stale".into()),
            backtrace: Some("trace".into()),
            ..record()
        };
        task.succeed(t0()).unwrap();
        assert!(task.detail().is_none());
        assert!(task.backtrace().is_none());
    }

    #[test]
    fn item_error_lines_are_truncated() {
        let mut task = record();
        task.record_item_error(&"x".repeat(50), 10, t0()).unwrap();
        assert_eq!(task.detail(), Some("xxxxxxx..."));
    }

    #[test]
    fn record_roundtrips_through_json() {
        let mut task = record();
        task.set_result_ref("exports/items.tsv", t0()).unwrap();
        let s = serde_json::to_string(&task).unwrap();
        let back: TaskRecord = serde_json::from_str(&s).unwrap();
        assert_eq!(back, task);
        assert_eq!(back.result_ref(), Some("exports/items.tsv"));
    }
}
