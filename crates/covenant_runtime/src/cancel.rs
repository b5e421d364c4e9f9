//! Cooperative cancellation.

use crate::error::DispatchError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for cooperative cancellation of a dispatch.
///
/// Uses an AtomicBool internally. Clone is cheap and shares state.
/// The dispatcher polls once per produced row; there are no implicit
/// timeouts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail fast if cancellation has been requested.
    pub fn checkpoint(&self) -> Result<(), DispatchError> {
        if self.is_cancelled() {
            Err(DispatchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
