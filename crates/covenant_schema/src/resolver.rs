//! Recursive descriptor-to-schema compilation.
//!
//! Pure: no I/O, no panics. Every failure mode is captured inline as an
//! `Invalid` node so one bad type can never abort a whole scan.

use crate::descriptor::{PrimitiveKind, TypeCatalog, TypeDescriptor};
use covenant_protocol::{Properties, SchemaKind, SchemaNode, MAX_NESTING_DEPTH};
use serde_json::Value;

/// Whether the node being resolved sits at a field site (a parameter or a
/// nominal field, which may carry a default) or stands bare (a return
/// annotation, an array element).
#[derive(Debug, Clone, Copy)]
enum Site<'a> {
    Field(Option<&'a Value>),
    Bare,
}

/// Resolve a bare type annotation (e.g. a return type) at depth 0.
pub fn resolve(catalog: &dyn TypeCatalog, descriptor: &TypeDescriptor) -> SchemaNode {
    resolve_at(catalog, descriptor, 0, Site::Bare)
}

/// Resolve a top-level parameter. The node carries its own
/// `required: bool`, true iff no default value was supplied.
pub fn resolve_field(
    catalog: &dyn TypeCatalog,
    descriptor: &TypeDescriptor,
    default: Option<&Value>,
) -> SchemaNode {
    resolve_at(catalog, descriptor, 0, Site::Field(default))
}

fn resolve_at(
    catalog: &dyn TypeCatalog,
    descriptor: &TypeDescriptor,
    depth: usize,
    site: Site<'_>,
) -> SchemaNode {
    if depth > MAX_NESTING_DEPTH {
        return SchemaNode::invalid(format!(
            "nesting depth exceeds the ceiling ({})",
            MAX_NESTING_DEPTH
        ));
    }

    // Unwrap annotation metadata before looking at the underlying type.
    let mut description = String::new();
    let mut required_marker = false;
    let mut inner = descriptor;
    if let TypeDescriptor::Annotated {
        inner: wrapped,
        description: desc,
        required_marker: marker,
    } = inner
    {
        if let Some(d) = desc {
            description = d.clone();
        }
        required_marker = *marker;
        inner = wrapped;
    }

    let default = match site {
        Site::Field(d) => d,
        Site::Bare => None,
    };

    let mut node = match inner {
        TypeDescriptor::Literals(values) => resolve_literals(values),
        TypeDescriptor::Primitive(kind) => SchemaNode::of_kind(primitive_kind(*kind)),
        TypeDescriptor::List { item } => match item {
            Some(item) => {
                let items = resolve_at(catalog, item, depth + 1, Site::Bare);
                SchemaNode::array(items)
            }
            // Unparameterized lists keep `items` off; the well-formedness
            // check reports them at audit time.
            None => SchemaNode::of_kind(SchemaKind::Array),
        },
        TypeDescriptor::Mapping => {
            return SchemaNode::invalid(
                "direct generic map type forbidden - declare a named structure",
            );
        }
        TypeDescriptor::Named(name) => resolve_nominal(catalog, name, depth),
        // An unannotated parameter degrades to a bare object with no
        // properties; scanning flags it and the audit rejects it.
        TypeDescriptor::Unannotated => SchemaNode::of_kind(SchemaKind::Object),
        TypeDescriptor::Annotated { .. } => {
            // Doubly-wrapped annotations: keep the outer metadata, resolve
            // the rest in place.
            resolve_at(catalog, inner, depth, Site::Bare)
        }
    };

    if node.is_invalid() {
        return node;
    }

    node.description = description;
    if let Site::Field(_) = site {
        node.required = Some(default.is_none() || required_marker);
    }
    // An explicit null default makes the field optional but is not copied
    // onto the wire.
    if let Some(value) = default {
        if !value.is_null() {
            node.default = Some(value.clone());
        }
    }

    node
}

/// `Literal[...]` becomes an `enum` whose kind is taken from the first
/// literal's value type.
fn resolve_literals(values: &[Value]) -> SchemaNode {
    let kind = match values.first() {
        Some(Value::Number(_)) => SchemaKind::Number,
        Some(Value::Bool(_)) => SchemaKind::Boolean,
        _ => SchemaKind::String,
    };
    let mut node = SchemaNode::of_kind(kind);
    if !values.is_empty() {
        node.enum_values = Some(values.to_vec());
    }
    node
}

fn primitive_kind(kind: PrimitiveKind) -> SchemaKind {
    match kind {
        PrimitiveKind::Str => SchemaKind::String,
        PrimitiveKind::Int | PrimitiveKind::Float => SchemaKind::Number,
        PrimitiveKind::Bool => SchemaKind::Boolean,
        PrimitiveKind::Bytes => SchemaKind::Blob,
        PrimitiveKind::NoneType => SchemaKind::Null,
    }
}

/// Expand a nominal type into an Object node.
///
/// Fields resolve at `depth + 1` with their own defaults. A field whose
/// resolved node carries `required == true` is recorded in the parent's
/// `required_fields`; the child's own flag is dropped either way, so
/// required-ness of nested fields lives only on the parent.
fn resolve_nominal(catalog: &dyn TypeCatalog, name: &str, depth: usize) -> SchemaNode {
    let Some(nominal) = catalog.lookup(name) else {
        return SchemaNode::invalid(format!("failed to resolve type '{}'", name));
    };

    let mut properties = Properties::new();
    let mut required_fields = Vec::new();

    for field in &nominal.fields {
        let mut child = resolve_at(
            catalog,
            &field.descriptor,
            depth + 1,
            Site::Field(field.default.as_ref()),
        );
        if child.required.take() == Some(true) {
            required_fields.push(field.name.clone());
        }
        properties.insert(field.name.clone(), child);
    }

    let mut node = SchemaNode::object(properties);
    if !required_fields.is_empty() {
        node.required_fields = Some(required_fields);
    }
    node
}
