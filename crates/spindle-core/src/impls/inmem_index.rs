//! In-memory RecordStore / SearchIndex pair.
//!
//! Keys are kept in `BTreeSet`s so offset/limit paging has a stable order,
//! like an `ORDER BY id` query would.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;

use crate::domain::IndexError;
use crate::ports::{RecordStore, RecordType, SearchIndex};

fn page(keys: Option<&BTreeSet<String>>, offset: usize, limit: usize) -> Vec<String> {
    keys.map(|keys| keys.iter().skip(offset).take(limit).cloned().collect())
        .unwrap_or_default()
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordType, BTreeSet<String>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record_type: &RecordType, key: impl Into<String>) {
        self.records
            .write()
            .entry(record_type.clone())
            .or_default()
            .insert(key.into());
    }

    pub fn remove(&self, record_type: &RecordType, key: &str) -> bool {
        self.records
            .write()
            .get_mut(record_type)
            .is_some_and(|keys| keys.remove(key))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn count(&self, record_type: &RecordType) -> Result<usize, IndexError> {
        Ok(self.records.read().get(record_type).map_or(0, BTreeSet::len))
    }

    fn keys(
        &self,
        record_type: &RecordType,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, IndexError> {
        Ok(page(self.records.read().get(record_type), offset, limit))
    }

    fn exists(&self, record_type: &RecordType, key: &str) -> Result<bool, IndexError> {
        Ok(self
            .records
            .read()
            .get(record_type)
            .is_some_and(|keys| keys.contains(key)))
    }
}

/// Search index stand-in that remembers which documents exist and how many
/// times each was (re)indexed.
#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<HashMap<RecordType, BTreeSet<String>>>,
    index_writes: RwLock<HashMap<String, usize>>,
    failing: RwLock<HashSet<String>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a document in place without going through `index_record`.
    pub fn seed(&self, record_type: &RecordType, key: impl Into<String>) {
        self.documents
            .write()
            .entry(record_type.clone())
            .or_default()
            .insert(key.into());
    }

    /// Make `index_record` fail for `key`.
    pub fn fail_on(&self, key: impl Into<String>) {
        self.failing.write().insert(key.into());
    }

    pub fn contains(&self, record_type: &RecordType, key: &str) -> bool {
        self.documents
            .read()
            .get(record_type)
            .is_some_and(|keys| keys.contains(key))
    }

    pub fn document_count(&self, record_type: &RecordType) -> usize {
        self.documents.read().get(record_type).map_or(0, BTreeSet::len)
    }

    /// How many times `key` has been written through `index_record`.
    pub fn writes_for(&self, key: &str) -> usize {
        self.index_writes.read().get(key).copied().unwrap_or(0)
    }
}

impl SearchIndex for InMemorySearchIndex {
    fn index_record(&self, record_type: &RecordType, key: &str) -> Result<(), IndexError> {
        if self.failing.read().contains(key) {
            return Err(IndexError::Index(format!("rejected document {key}")));
        }
        self.seed(record_type, key);
        *self.index_writes.write().entry(key.to_string()).or_default() += 1;
        Ok(())
    }

    fn document_keys(
        &self,
        record_type: &RecordType,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, IndexError> {
        Ok(page(self.documents.read().get(record_type), offset, limit))
    }

    fn delete_document(&self, record_type: &RecordType, key: &str) -> Result<(), IndexError> {
        if let Some(keys) = self.documents.write().get_mut(record_type) {
            keys.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_store_pages_in_key_order() {
        let items = RecordType::new("Item");
        let store = InMemoryRecordStore::new();
        for key in ["c", "a", "b"] {
            store.insert(&items, key);
        }

        assert_eq!(store.count(&items).unwrap(), 3);
        assert_eq!(store.keys(&items, 0, 2).unwrap(), ["a", "b"]);
        assert_eq!(store.keys(&items, 2, 2).unwrap(), ["c"]);
        assert!(store.exists(&items, "b").unwrap());
        assert!(!store.exists(&RecordType::new("Collection"), "b").unwrap());
    }

    #[test]
    fn index_record_counts_writes_and_honours_failures() {
        let items = RecordType::new("Item");
        let index = InMemorySearchIndex::new();
        index.fail_on("bad");

        index.index_record(&items, "good").unwrap();
        index.index_record(&items, "good").unwrap();
        assert!(index.index_record(&items, "bad").is_err());

        assert_eq!(index.writes_for("good"), 2);
        assert!(index.contains(&items, "good"));
        assert!(!index.contains(&items, "bad"));
    }
}
