//! Ports - the seams to everything outside the engine.
//!
//! Each trait is synchronous and `Send + Sync`: the engine runs work on
//! plain OS threads and calls these from several of them at once.

pub mod clock;
pub mod error_notifier;
pub mod id_generator;
pub mod job_queue;
pub mod search_index;
pub mod task_store;
pub mod workload;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::error_notifier::{ErrorNotifier, JobFailure, LogNotifier, NoopNotifier};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_queue::JobQueue;
pub use self::search_index::{RecordStore, RecordType, SearchIndex};
pub use self::task_store::TaskStore;
pub use self::workload::Workload;
