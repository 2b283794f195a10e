//! RecordStore / SearchIndex ports - the two sides of a reindex.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::IndexError;

/// Names a kind of persisted record ("Item", "Collection", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType(String);

impl RecordType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Read side: the persisted records, paged by offset/limit in a stable order.
pub trait RecordStore: Send + Sync {
    fn count(&self, record_type: &RecordType) -> Result<usize, IndexError>;

    fn keys(&self, record_type: &RecordType, offset: usize, limit: usize)
    -> Result<Vec<String>, IndexError>;

    fn exists(&self, record_type: &RecordType, key: &str) -> Result<bool, IndexError>;
}

/// Write side: the search index documents derived from those records.
pub trait SearchIndex: Send + Sync {
    /// (Re)build the document for one record.
    fn index_record(&self, record_type: &RecordType, key: &str) -> Result<(), IndexError>;

    fn document_keys(
        &self,
        record_type: &RecordType,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, IndexError>;

    fn delete_document(&self, record_type: &RecordType, key: &str) -> Result<(), IndexError>;
}
