use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Refusing to save an empty batch")]
    EmptyBatch,

    #[error("Rows must be JSON objects, got: {0}")]
    NonObjectRow(String),

    #[error("No parts to merge for '{0}'")]
    NoParts(String),
}
