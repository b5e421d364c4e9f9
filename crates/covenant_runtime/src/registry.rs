//! Declarative handler registration.
//!
//! Handlers are registered explicitly against action names from the
//! contract; dispatch refuses names the contract does not declare or
//! that have no handler bound.

use crate::error::{DispatchError, Result};
use covenant_protocol::{Action, Contract};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub type ArgMap = Map<String, Value>;
/// Row stream produced by a streaming handler.
pub type RowIter = Box<dyn Iterator<Item = Result<Value>> + Send>;

type ValueFn = Box<dyn Fn(&ArgMap) -> Result<Value> + Send + Sync>;
type StreamFn = Box<dyn Fn(&ArgMap) -> Result<RowIter> + Send + Sync>;

/// A bound action implementation.
pub enum Handler {
    /// Returns one value; never touches the spill path.
    Value(ValueFn),
    /// Produces rows one at a time; buffered and spilled by the
    /// dispatcher.
    Stream(StreamFn),
}

/// Contract-backed map of action handlers.
pub struct ActionRegistry {
    contract: Contract,
    handlers: HashMap<String, Handler>,
}

impl ActionRegistry {
    pub fn new(contract: Contract) -> Self {
        Self {
            contract,
            handlers: HashMap::new(),
        }
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Bind a value handler to an action name.
    pub fn register_value<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&ArgMap) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers
            .insert(name.into(), Handler::Value(Box::new(handler)));
    }

    /// Bind a streaming handler to an action name.
    pub fn register_stream<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&ArgMap) -> Result<RowIter> + Send + Sync + 'static,
    {
        self.handlers
            .insert(name.into(), Handler::Stream(Box::new(handler)));
    }

    /// Resolve a name to its contract action and bound handler.
    pub fn resolve(&self, name: &str) -> Result<(&Action, &Handler)> {
        let action = self
            .contract
            .action(name)
            .ok_or_else(|| DispatchError::ActionNotFound(name.to_string()))?;
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| DispatchError::ActionNotFound(name.to_string()))?;
        Ok((action, handler))
    }
}
