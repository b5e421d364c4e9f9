//! Per-dispatch execution context and lifecycle events.

use crate::cancel::CancellationToken;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle events reported while a dispatch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEvent {
    /// Dispatch accepted, arguments not yet validated.
    Started { action: String },
    /// Arguments validated, handler about to run.
    Enter,
    /// Periodic row-count report for streaming handlers.
    Progress { rows: u64 },
    /// A buffer flush wrote a spill part.
    Spill { part_uri: String },
    /// The handler or the store failed.
    Exception { message: String },
    Success,
    Cancelled,
}

type Observer = Arc<dyn Fn(&ActionEvent) + Send + Sync>;

/// Identity and control surface of one dispatch.
#[derive(Clone)]
pub struct ActionContext {
    /// Unique id of this invocation; spill parts are named after it.
    pub trace_id: String,
    /// Logical node the dispatch runs on.
    pub node_id: String,
    pub cancel: CancellationToken,
    observer: Option<Observer>,
}

impl ActionContext {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    /// Attach an event observer. Events are delivered synchronously on
    /// the dispatching thread.
    pub fn with_observer(mut self, observer: impl Fn(&ActionEvent) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub(crate) fn emit(&self, event: ActionEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("trace_id", &self.trace_id)
            .field("node_id", &self.node_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn observer_sees_emitted_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ctx = ActionContext::new("node-1")
            .with_observer(move |event| sink.lock().unwrap().push(event.clone()));
        ctx.emit(ActionEvent::Enter);
        ctx.emit(ActionEvent::Success);
        let events = seen.lock().unwrap();
        assert_eq!(*events, vec![ActionEvent::Enter, ActionEvent::Success]);
    }

    #[test]
    fn trace_ids_are_unique() {
        let a = ActionContext::new("n");
        let b = ActionContext::new("n");
        assert_ne!(a.trace_id, b.trace_id);
    }
}
