//! Covenant columnar stores.
//!
//! The dispatcher spills oversized streaming results here. A store takes
//! row batches, persists them as parts, and can later merge the parts of
//! one invocation into a single addressable result.

pub mod error;
pub mod memory;
pub mod parquet_store;

use serde_json::Value;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use parquet_store::ParquetStore;

/// Column-oriented persistence for spilled row batches.
///
/// Implementations must be safe to call from the dispatching thread; a
/// flush is synchronous and the dispatcher waits for it.
pub trait ColumnarStore: Send + Sync {
    /// Persist one batch of rows for the given invocation, returning an
    /// addressable part URI.
    fn save_batch(&self, rows: &[Value], trace_id: &str) -> Result<String>;

    /// Combine previously saved parts into one result, returning its URI.
    fn merge_parts(&self, parts: &[String], target_id: &str) -> Result<String>;
}
