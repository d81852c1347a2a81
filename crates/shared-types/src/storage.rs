//! # Storage Port
//!
//! Ordered byte-keyed store shared by the data access layer and the state
//! store. Keys are laid out so that lexicographic order matches height order,
//! which is what [`KeyRange`] scans rely on. The host application supplies the
//! on-disk engine; [`InMemoryKVStore`] backs tests and single-process nodes.

use crate::errors::KVStoreError;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Key/value pairs in ascending key order.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Keys selected by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// Every key starting with the prefix.
    Prefix(Vec<u8>),
    /// `start..=end`. Empty when `start > end`.
    Between { start: Vec<u8>, end: Vec<u8> },
}

impl KeyRange {
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        Self::Prefix(prefix.into())
    }

    pub fn between(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self::Between {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        match self {
            Self::Prefix(prefix) => key.starts_with(prefix),
            Self::Between { start, end } => start.as_slice() <= key && key <= end.as_slice(),
        }
    }
}

/// A single write inside [`KeyValueStore::write_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Deleting a missing key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Applies every operation or none. Later operations on the same key win.
    fn write_batch(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Matching entries in ascending key order.
    fn scan(&self, range: &KeyRange) -> Result<ScanResult, KVStoreError>;
}

/// `BTreeMap`-backed store.
#[derive(Debug, Default)]
pub struct InMemoryKVStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn write_batch(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, range: &KeyRange) -> Result<ScanResult, KVStoreError> {
        let (lower, upper) = match range {
            KeyRange::Prefix(prefix) => (Bound::Included(prefix.clone()), Bound::Unbounded),
            KeyRange::Between { start, end } if start <= end => {
                (Bound::Included(start.clone()), Bound::Included(end.clone()))
            }
            KeyRange::Between { .. } => return Ok(Vec::new()),
        };
        Ok(self
            .data
            .range((lower, upper))
            .take_while(|(key, _)| range.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
