//! Impls - in-memory implementations of the ports.
//!
//! Used by the tests and the CLI, and good enough for single-process
//! deployments that do not need tasks to outlive the process.

pub mod inmem_index;
pub mod inmem_queue;
pub mod inmem_task_store;

pub use self::inmem_index::{InMemoryRecordStore, InMemorySearchIndex};
pub use self::inmem_queue::InMemoryJobQueue;
pub use self::inmem_task_store::InMemoryTaskStore;
