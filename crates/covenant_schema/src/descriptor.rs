//! Frontend-neutral type descriptors.
//!
//! The resolver never inspects live code. Any frontend (the bundled source
//! parser, or tests building descriptors by hand) populates this tree plus
//! a [`TypeCatalog`] of nominal types, and the resolver compiles it into
//! schema nodes.

use serde_json::Value;
use std::collections::HashMap;

/// Builtin scalar types recognized by the annotation syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// `str`
    Str,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `bool`
    Bool,
    /// `bytes`
    Bytes,
    /// `None` / `NoneType`
    NoneType,
}

/// Parsed shape of one type annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// `Annotated[inner, "description", Required?]`
    Annotated {
        inner: Box<TypeDescriptor>,
        description: Option<String>,
        required_marker: bool,
    },
    /// `Literal[v1, v2, ...]`: a closed set of literal values.
    Literals(Vec<Value>),
    /// A builtin scalar.
    Primitive(PrimitiveKind),
    /// `list` / `list[item]`. An unparameterized list has no item
    /// descriptor and resolves without `items`.
    List { item: Option<Box<TypeDescriptor>> },
    /// A raw builtin map (`dict`, `dict[...]`). Never valid as a schema.
    Mapping,
    /// A nominal composite, resolved through the catalog.
    Named(String),
    /// Parameter declared with no annotation at all.
    Unannotated,
}

impl TypeDescriptor {
    /// Convenience constructor for an annotated scalar.
    pub fn annotated(inner: TypeDescriptor, description: impl Into<String>) -> Self {
        TypeDescriptor::Annotated {
            inner: Box::new(inner),
            description: Some(description.into()),
            required_marker: false,
        }
    }

    /// Whether the descriptor carries an `Annotated` wrapper anywhere at
    /// its top level. Parameters without one get a
    /// `missing_type_annotation` diagnostic during scanning.
    pub fn has_annotation_metadata(&self) -> bool {
        matches!(self, TypeDescriptor::Annotated { .. })
    }

    /// Whether an `Annotated` wrapper is present with a non-empty
    /// description.
    pub fn has_description(&self) -> bool {
        match self {
            TypeDescriptor::Annotated { description, .. } => {
                description.as_deref().is_some_and(|d| !d.trim().is_empty())
            }
            _ => false,
        }
    }
}

/// One declared field of a nominal type, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub descriptor: TypeDescriptor,
    /// Declared default. `Some(Value::Null)` is an explicit null default:
    /// the field is optional but the null is not copied onto the wire.
    pub default: Option<Value>,
}

/// A nominal composite type with named, ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NominalType {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

/// Lookup seam between a frontend and the resolver.
pub trait TypeCatalog {
    /// Resolve a nominal type name to its declaration, if known.
    fn lookup(&self, name: &str) -> Option<&NominalType>;
}

/// Catalog backed by a plain map; what the scanner's enrichment pass
/// populates and what tests construct directly.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    types: HashMap<String, NominalType>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a nominal type, replacing any previous declaration with
    /// the same name (later declarations shadow earlier ones, mirroring
    /// load order).
    pub fn insert(&mut self, ty: NominalType) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeCatalog for InMemoryCatalog {
    fn lookup(&self, name: &str) -> Option<&NominalType> {
        self.types.get(name)
    }
}

/// Catalog that knows no nominal types. Useful where only scalars can
/// legally appear.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl TypeCatalog for EmptyCatalog {
    fn lookup(&self, _name: &str) -> Option<&NominalType> {
        None
    }
}
