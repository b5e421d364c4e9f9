//! Covenant contract audit.
//!
//! Validates a plugin project end to end: contract presence and shape,
//! contract-to-code alignment, schema well-formedness, annotation
//! compliance, dependency declarations, and an advisory security scan.

pub mod alignment;
pub mod audit;
pub mod error;

pub use alignment::check_alignment;
pub use audit::{
    check_contract_document, check_requirements, check_security, AuditReport, ContractValidator,
};
pub use error::{AuditError, Result};
