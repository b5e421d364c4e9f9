//! Error types for schema resolution and contract handling.

use thiserror::Error;

/// Schema-layer error type.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Contract document not found: {0}")]
    ManifestMissing(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, SchemaError>;
