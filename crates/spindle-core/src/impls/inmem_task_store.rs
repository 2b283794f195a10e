//! InMemoryTaskStore - task store for tests, demos and single-process use.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{JobId, NewTask, StoreError, TaskId, TaskRecord, TaskStatus};
use crate::ports::{Clock, IdGenerator, TaskStore};

#[derive(Default)]
struct State {
    /// All task records (single source of truth).
    records: HashMap<TaskId, TaskRecord>,

    /// Unique index: at most one task per job id.
    by_job: HashMap<JobId, TaskId>,

    /// Creation order, for `list`.
    order: Vec<TaskId>,
}

/// Keeps every task in a `HashMap` behind one lock.
///
/// The job-id index is checked and written under the same lock as the
/// insert, which is what makes concurrent `create` calls for one job id
/// produce exactly one task.
pub struct InMemoryTaskStore {
    state: Mutex<State>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ids,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.state
            .lock()
            .records
            .values()
            .filter(|r| r.status() == status)
            .count()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create(&self, new: NewTask) -> Result<TaskRecord, StoreError> {
        let mut state = self.state.lock();
        if let Some(job_id) = new.job_id
            && state.by_job.contains_key(&job_id)
        {
            return Err(StoreError::DuplicateJobId(job_id));
        }

        let task_id = self.ids.generate_task_id();
        let record = TaskRecord::new(task_id, new, self.clock.now());
        if let Some(job_id) = record.job_id() {
            state.by_job.insert(job_id, task_id);
        }
        state.records.insert(task_id, record.clone());
        state.order.push(task_id);
        Ok(record)
    }

    fn get(&self, task_id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.state.lock().records.get(&task_id).cloned())
    }

    fn find_by_job_id(&self, job_id: JobId) -> Result<Option<TaskRecord>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .by_job
            .get(&job_id)
            .and_then(|task_id| state.records.get(task_id))
            .cloned())
    }

    fn update(&self, task: &TaskRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let slot = state
            .records
            .get_mut(&task.task_id())
            .ok_or(StoreError::NotFound(task.task_id()))?;
        *slot = task.clone();
        Ok(())
    }

    fn list(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{SystemClock, UlidGenerator};
    use ulid::Ulid;

    fn store() -> InMemoryTaskStore {
        InMemoryTaskStore::new(
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn create_then_find_by_job_id() {
        let store = store();
        let job_id = JobId::from_ulid(Ulid::new());
        let created = store
            .create(NewTask::new("ocr").for_job(job_id).on_queue("ocr"))
            .unwrap();

        let found = store.find_by_job_id(job_id).unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.queue(), Some("ocr"));
        assert_eq!(found.status(), TaskStatus::Waiting);
    }

    #[test]
    fn duplicate_job_id_is_rejected() {
        let store = store();
        let job_id = JobId::from_ulid(Ulid::new());
        store.create(NewTask::new("a").for_job(job_id)).unwrap();

        let err = store.create(NewTask::new("b").for_job(job_id)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateJobId(id) if id == job_id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tasks_without_job_id_are_independent() {
        let store = store();
        store.create(NewTask::new("a")).unwrap();
        store.create(NewTask::new("a")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_creates_for_one_job_make_one_task() {
        let store = Arc::new(store());
        let job_id = JobId::from_ulid(Ulid::new());

        let created: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    s.spawn(move || store.create(NewTask::new("race").for_job(job_id)).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(created, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_replaces_stored_copy() {
        let store = store();
        let mut task = store.create(NewTask::new("export")).unwrap();
        task.set_status_text("writing rows", SystemClock.now()).unwrap();
        store.update(&task).unwrap();

        let back = store.get(task.task_id()).unwrap().unwrap();
        assert_eq!(back.status_text(), Some("writing rows"));
    }

    #[test]
    fn update_of_unknown_task_fails() {
        let store = store();
        let other = self::store().create(NewTask::new("elsewhere")).unwrap();
        assert!(matches!(store.update(&other), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_is_in_creation_order() {
        let store = store();
        for name in ["first", "second", "third"] {
            store.create(NewTask::new(name)).unwrap();
        }
        let names: Vec<_> = store
            .list()
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, ["first", "second", "third"]);
    }
}
