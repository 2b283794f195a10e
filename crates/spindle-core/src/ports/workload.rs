//! Workload port - something that can be counted and read in windows.
//!
//! `slice` is called from several threads at once with disjoint
//! `offset`/`limit` windows; implementations must not need external locking
//! for that pattern.

use crate::domain::WorkloadError;

pub trait Workload<T>: Sync {
    fn count(&self) -> Result<usize, WorkloadError>;

    /// Up to `limit` elements starting at `offset`. Out-of-range windows
    /// return fewer (or zero) elements rather than an error.
    fn slice(&self, offset: usize, limit: usize) -> Result<Vec<T>, WorkloadError>;
}

impl<T: Clone + Sync> Workload<T> for [T] {
    fn count(&self) -> Result<usize, WorkloadError> {
        Ok(self.len())
    }

    fn slice(&self, offset: usize, limit: usize) -> Result<Vec<T>, WorkloadError> {
        let start = offset.min(self.len());
        let end = offset.saturating_add(limit).min(self.len());
        Ok(self[start..end].to_vec())
    }
}

impl<T: Clone + Sync> Workload<T> for Vec<T> {
    fn count(&self) -> Result<usize, WorkloadError> {
        self.as_slice().count()
    }

    fn slice(&self, offset: usize, limit: usize) -> Result<Vec<T>, WorkloadError> {
        self.as_slice().slice(offset, limit)
    }
}
