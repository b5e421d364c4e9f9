//! Covenant protocol types.
//!
//! Canonical data model shared by the scanner, validator, and runtime:
//! schema nodes, actions, contracts, diagnostics, and stream chunks.

pub mod defaults;
pub mod types;

pub use defaults::{
    spill_threshold_bytes, AUTO_SPILL_THRESHOLD_BYTES, MAX_NESTING_DEPTH, MEMORY_THRESHOLD_ENV,
    ROW_GROUP_SIZE,
};
pub use types::{
    Action, ActionLocation, Contract, Diagnostic, DiagnosticKind, PluginInfo, Properties,
    SchemaKind, SchemaNode, StreamChunk,
};
