//! Covenant action runtime.
//!
//! Dispatches contract actions against explicitly registered handlers:
//! arguments are validated before any handler runs, streaming results
//! buffer in memory and spill to a columnar store past the size
//! threshold, and every row is a cooperative cancellation point.

pub mod cancel;
pub mod collector;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod registry;

pub use cancel::CancellationToken;
pub use collector::{estimate_row_size, CollectorOutcome, SpillCollector};
pub use context::{ActionContext, ActionEvent};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{DispatchError, Result};
pub use params::validate_args;
pub use registry::{ActionRegistry, ArgMap, Handler, RowIter};
