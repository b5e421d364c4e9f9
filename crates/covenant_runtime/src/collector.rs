//! Buffering collector with spill-to-store.
//!
//! Streaming handlers feed rows in one at a time. Rows accumulate in
//! memory until the byte threshold or row-group cap is crossed, at which
//! point the buffer flushes synchronously to the columnar store and
//! resets. A run that never flushed returns its rows inline; one that
//! did ends with a final flush and a part merge.

use crate::error::Result;
use covenant_protocol::{spill_threshold_bytes, ROW_GROUP_SIZE};
use covenant_sinks::ColumnarStore;
use serde_json::Value;
use tracing::debug;

/// What a finished collection produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorOutcome {
    /// Everything fit in memory.
    Buffered(Vec<Value>),
    /// At least one flush happened; rows live in the store.
    Spilled { uri: String, parts: usize, rows: u64 },
}

pub struct SpillCollector<'a> {
    store: &'a dyn ColumnarStore,
    trace_id: String,
    threshold_bytes: usize,
    row_group_size: usize,
    buffer: Vec<Value>,
    buffered_bytes: usize,
    parts: Vec<String>,
    rows_total: u64,
}

impl<'a> SpillCollector<'a> {
    /// Collector with the process-wide threshold (env-overridable).
    pub fn new(store: &'a dyn ColumnarStore, trace_id: impl Into<String>) -> Self {
        Self::with_limits(store, trace_id, spill_threshold_bytes(), ROW_GROUP_SIZE)
    }

    pub fn with_limits(
        store: &'a dyn ColumnarStore,
        trace_id: impl Into<String>,
        threshold_bytes: usize,
        row_group_size: usize,
    ) -> Self {
        Self {
            store,
            trace_id: trace_id.into(),
            threshold_bytes,
            row_group_size,
            buffer: Vec::new(),
            buffered_bytes: 0,
            parts: Vec::new(),
            rows_total: 0,
        }
    }

    pub fn rows_total(&self) -> u64 {
        self.rows_total
    }

    /// Accept one row. Returns the part URI when this push triggered a
    /// flush.
    pub fn push(&mut self, row: Value) -> Result<Option<String>> {
        self.buffered_bytes += estimate_row_size(&row);
        self.buffer.push(row);
        self.rows_total += 1;

        if self.buffered_bytes >= self.threshold_bytes || self.buffer.len() >= self.row_group_size {
            return Ok(Some(self.flush()?));
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<String> {
        let batch = std::mem::take(&mut self.buffer);
        self.buffered_bytes = 0;
        let uri = self.store.save_batch(&batch, &self.trace_id)?;
        debug!(part = %uri, rows = batch.len(), "Spilled row batch");
        self.parts.push(uri.clone());
        Ok(uri)
    }

    /// Flush any remainder and settle the outcome.
    pub fn finish(mut self) -> Result<CollectorOutcome> {
        if self.parts.is_empty() {
            return Ok(CollectorOutcome::Buffered(self.buffer));
        }
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        let uri = self.store.merge_parts(&self.parts, &self.trace_id)?;
        Ok(CollectorOutcome::Spilled {
            uri,
            parts: self.parts.len(),
            rows: self.rows_total,
        })
    }
}

/// Serialized size of one row, the unit the spill threshold is measured
/// in.
pub fn estimate_row_size(row: &Value) -> usize {
    serde_json::to_string(row).map(|s| s.len()).unwrap_or(0)
}
