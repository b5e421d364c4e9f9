use covenant_protocol::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan failed: {0}")]
    Scan(#[from] covenant_scanner::ScanError),

    #[error("Contract error: {0}")]
    Schema(#[from] covenant_schema::SchemaError),

    #[error("Annotation compliance failed with {} problem(s)", .0.len())]
    ComplianceFailure(Vec<Diagnostic>),
}
