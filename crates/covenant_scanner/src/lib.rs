//! Covenant action scanner.
//!
//! Walks a plugin project directory, discovers decorated action methods
//! in two phases (parallel syntax pass, sequential type enrichment) and
//! compiles their annotations into contract schemas. Results are cached
//! per project root, keyed on candidate file mtimes.

pub mod cache;
pub mod error;
pub mod parse;
pub mod pytypes;
pub mod scanner;

pub use cache::{CacheSnapshot, ScanCache};
pub use error::{Result, ScanError};
pub use scanner::{has_blocking_diagnostics, ActionScanner, ScanConfig, ScanOutcome, ScanStats};
