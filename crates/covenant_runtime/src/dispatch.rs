//! Action dispatch state machine.
//!
//! A dispatch moves Resolved -> Running -> one of Completed, Failed,
//! Cancelled. Value handlers return their result directly; streaming
//! handlers run through the spill collector with a cancellation
//! checkpoint before every row.

use crate::collector::{CollectorOutcome, SpillCollector};
use crate::context::{ActionContext, ActionEvent};
use crate::error::{DispatchError, Result};
use crate::params::validate_args;
use crate::registry::{ActionRegistry, ArgMap, Handler};
use covenant_protocol::StreamChunk;
use covenant_sinks::ColumnarStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Rows between Progress events on the streaming path.
const PROGRESS_INTERVAL: u64 = 1_000;

/// Terminal result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The full result, inline. Value handlers always land here, and so
    /// do streams small enough to stay buffered (as an array of rows).
    Completed(Value),
    /// The result overflowed to the columnar store.
    Spilled { uri: String, parts: usize, rows: u64 },
}

/// Executes contract actions against registered handlers.
pub struct Dispatcher {
    registry: ActionRegistry,
    store: Arc<dyn ColumnarStore>,
    threshold_bytes: usize,
    row_group_size: usize,
}

impl Dispatcher {
    pub fn new(registry: ActionRegistry, store: Arc<dyn ColumnarStore>) -> Self {
        Self {
            registry,
            store,
            threshold_bytes: covenant_protocol::spill_threshold_bytes(),
            row_group_size: covenant_protocol::ROW_GROUP_SIZE,
        }
    }

    /// Override the spill limits, chiefly for tests.
    pub fn with_limits(mut self, threshold_bytes: usize, row_group_size: usize) -> Self {
        self.threshold_bytes = threshold_bytes;
        self.row_group_size = row_group_size;
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Dispatch an action to completion.
    pub fn dispatch(&self, name: &str, args: &ArgMap, ctx: &ActionContext) -> Result<DispatchOutcome> {
        self.run(name, args, ctx, &mut |_| {})
    }

    /// Dispatch an action, delivering every produced row to `on_chunk`
    /// as it appears. A terminal `is_last` chunk is always emitted, for
    /// value handlers too.
    pub fn dispatch_stream(
        &self,
        name: &str,
        args: &ArgMap,
        ctx: &ActionContext,
        on_chunk: &mut dyn FnMut(StreamChunk),
    ) -> Result<DispatchOutcome> {
        self.run(name, args, ctx, on_chunk)
    }

    fn run(
        &self,
        name: &str,
        args: &ArgMap,
        ctx: &ActionContext,
        on_chunk: &mut dyn FnMut(StreamChunk),
    ) -> Result<DispatchOutcome> {
        // Resolved
        let (action, handler) = self.registry.resolve(name)?;
        ctx.emit(ActionEvent::Started {
            action: action.name.clone(),
        });
        info!(action = %action.name, trace_id = %ctx.trace_id, "Dispatching action");

        if let Err(e) = validate_args(&action.input_schema, args) {
            ctx.emit(ActionEvent::Exception {
                message: e.to_string(),
            });
            return Err(e);
        }

        // Running
        ctx.emit(ActionEvent::Enter);
        let result = match handler {
            Handler::Value(f) => self.run_value(f, args, ctx, on_chunk),
            Handler::Stream(f) => self.run_stream(f, args, ctx, on_chunk),
        };

        match &result {
            Ok(outcome) => {
                ctx.emit(ActionEvent::Success);
                match outcome {
                    DispatchOutcome::Completed(_) => {
                        info!(action = %action.name, trace_id = %ctx.trace_id, "Dispatch completed")
                    }
                    DispatchOutcome::Spilled { parts, rows, .. } => info!(
                        action = %action.name,
                        trace_id = %ctx.trace_id,
                        parts, rows,
                        "Dispatch completed with spill"
                    ),
                }
            }
            Err(DispatchError::Cancelled) => {
                ctx.emit(ActionEvent::Cancelled);
                warn!(action = %action.name, trace_id = %ctx.trace_id, "Dispatch cancelled");
            }
            Err(e) => {
                ctx.emit(ActionEvent::Exception {
                    message: e.to_string(),
                });
                warn!(action = %action.name, trace_id = %ctx.trace_id, error = %e, "Dispatch failed");
            }
        }
        result
    }

    fn run_value(
        &self,
        f: &(dyn Fn(&ArgMap) -> Result<Value> + Send + Sync),
        args: &ArgMap,
        ctx: &ActionContext,
        on_chunk: &mut dyn FnMut(StreamChunk),
    ) -> Result<DispatchOutcome> {
        ctx.cancel.checkpoint()?;
        let value = f(args)?;
        // Compatibility path: a value result still yields exactly one
        // terminal chunk on the streaming surface.
        on_chunk(StreamChunk::last(value.clone(), 0));
        Ok(DispatchOutcome::Completed(value))
    }

    fn run_stream(
        &self,
        f: &(dyn Fn(&ArgMap) -> Result<crate::registry::RowIter> + Send + Sync),
        args: &ArgMap,
        ctx: &ActionContext,
        on_chunk: &mut dyn FnMut(StreamChunk),
    ) -> Result<DispatchOutcome> {
        let rows = f(args)?;
        let mut collector = SpillCollector::with_limits(
            self.store.as_ref(),
            ctx.trace_id.clone(),
            self.threshold_bytes,
            self.row_group_size,
        );
        let mut index: u64 = 0;

        for row in rows {
            ctx.cancel.checkpoint()?;
            let row = row?;
            on_chunk(StreamChunk::new(row.clone(), index));
            index += 1;

            if let Some(part_uri) = collector.push(row)? {
                ctx.emit(ActionEvent::Spill { part_uri });
            }
            if index % PROGRESS_INTERVAL == 0 {
                ctx.emit(ActionEvent::Progress { rows: index });
            }
        }
        on_chunk(StreamChunk::last(Value::Null, index));

        match collector.finish()? {
            CollectorOutcome::Buffered(rows) => Ok(DispatchOutcome::Completed(Value::Array(rows))),
            CollectorOutcome::Spilled { uri, parts, rows } => {
                Ok(DispatchOutcome::Spilled { uri, parts, rows })
            }
        }
    }
}
