//! Covenant schema layer.
//!
//! Compiles frontend-populated type descriptors into wire schema nodes,
//! audits persisted schema trees, and reads/writes the contract document.

pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod resolver;
pub mod wellformed;

pub use descriptor::{
    EmptyCatalog, FieldDescriptor, InMemoryCatalog, NominalType, PrimitiveKind, TypeCatalog,
    TypeDescriptor,
};
pub use error::{Result, SchemaError};
pub use manifest::{build_contract, load_contract, manifest_path, persist_contract, MANIFEST_FILE};
pub use resolver::{resolve, resolve_field};
pub use wellformed::check_schema;
