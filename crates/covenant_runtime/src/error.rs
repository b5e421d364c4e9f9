use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Contract violation at '{field_path}': {message}")]
    ContractViolation { field_path: String, message: String },

    #[error("Action execution failed: {0}")]
    ExecutionFailure(String),

    #[error("Spill store error: {0}")]
    Store(#[from] covenant_sinks::StoreError),

    #[error("Dispatch cancelled")]
    Cancelled,
}

impl DispatchError {
    pub fn violation(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::ContractViolation {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}
