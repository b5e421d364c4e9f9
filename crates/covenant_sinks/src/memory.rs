//! In-memory store for tests and spill-behavior assertions.

use crate::error::{Result, StoreError};
use crate::ColumnarStore;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    parts: Vec<(String, Vec<Value>)>,
    merges: Vec<(String, Vec<String>)>,
}

/// Keeps every saved batch in memory and counts calls, so tests can
/// assert exactly when and how often the dispatcher flushed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save_batch` calls so far.
    pub fn save_calls(&self) -> usize {
        self.inner.lock().map(|inner| inner.parts.len()).unwrap_or(0)
    }

    /// Row counts of each saved batch, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.inner
            .lock()
            .map(|inner| inner.parts.iter().map(|(_, rows)| rows.len()).collect())
            .unwrap_or_default()
    }

    /// All saved rows in flush order.
    pub fn all_rows(&self) -> Vec<Value> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .parts
                    .iter()
                    .flat_map(|(_, rows)| rows.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The part lists handed to `merge_parts`, in call order.
    pub fn merges(&self) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .map(|inner| inner.merges.iter().map(|(_, parts)| parts.clone()).collect())
            .unwrap_or_default()
    }
}

impl ColumnarStore for MemoryStore {
    fn save_batch(&self, rows: &[Value], trace_id: &str) -> Result<String> {
        if rows.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("store lock poisoned")))?;
        let part_id = format!("mem://{}/part{}", trace_id, inner.parts.len());
        inner.parts.push((part_id.clone(), rows.to_vec()));
        Ok(part_id)
    }

    fn merge_parts(&self, parts: &[String], target_id: &str) -> Result<String> {
        if parts.is_empty() {
            return Err(StoreError::NoParts(target_id.to_string()));
        }
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("store lock poisoned")))?;
        let uri = format!("mem://{}/merged", target_id);
        inner.merges.push((target_id.to_string(), parts.to_vec()));
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn saves_are_observable() {
        let store = MemoryStore::new();
        store.save_batch(&[json!({"a": 1}), json!({"a": 2})], "t").unwrap();
        store.save_batch(&[json!({"a": 3})], "t").unwrap();
        assert_eq!(store.save_calls(), 2);
        assert_eq!(store.batch_sizes(), vec![2, 1]);
        assert_eq!(store.all_rows().len(), 3);
    }

    #[test]
    fn merge_records_the_member_parts() {
        let store = MemoryStore::new();
        let a = store.save_batch(&[json!({"a": 1})], "t").unwrap();
        let b = store.save_batch(&[json!({"a": 2})], "t").unwrap();
        let uri = store.merge_parts(&[a.clone(), b.clone()], "t").unwrap();
        assert_eq!(uri, "mem://t/merged");
        assert_eq!(store.merges(), vec![vec![a, b]]);
    }
}
