use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Plugin project not found: {0}")]
    ProjectNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Cache(#[from] serde_json::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),

    #[error("Internal scanner error: {0}")]
    Internal(String),
}
