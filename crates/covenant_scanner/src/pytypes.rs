//! Annotation text to [`TypeDescriptor`] translation.
//!
//! Raw annotation strings captured by the syntax pass are compiled here
//! into the resolver's descriptor tree. The grammar is intentionally
//! small: scalars, `list[...]`, `dict`, `Literal[...]`, `Annotated[...]`
//! and nominal names. Anything else becomes a `Named` descriptor that the
//! resolver reports as unresolvable.

use crate::parse::{last_segment, split_top_level, unquote};
use covenant_schema::{PrimitiveKind, TypeDescriptor};
use serde_json::{Number, Value};

/// Marker identifier inside `Annotated[...]` forcing required-ness even
/// when a default is present.
const REQUIRED_MARKER: &str = "Required";

/// Compile one annotation expression. Never fails: unrecognized shapes
/// degrade to descriptors the resolver reports on.
pub fn parse_annotation(text: &str) -> TypeDescriptor {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return TypeDescriptor::Unannotated;
    }

    let (head, args) = split_generic(trimmed);
    let head = last_segment(head);

    match (head, args) {
        ("str", None) => TypeDescriptor::Primitive(PrimitiveKind::Str),
        ("int", None) => TypeDescriptor::Primitive(PrimitiveKind::Int),
        ("float", None) => TypeDescriptor::Primitive(PrimitiveKind::Float),
        ("bool", None) => TypeDescriptor::Primitive(PrimitiveKind::Bool),
        ("bytes", None) => TypeDescriptor::Primitive(PrimitiveKind::Bytes),
        ("None" | "NoneType", None) => TypeDescriptor::Primitive(PrimitiveKind::NoneType),
        ("list" | "List", None) => TypeDescriptor::List { item: None },
        ("list" | "List", Some(args)) => {
            let pieces = split_top_level(args, ',');
            TypeDescriptor::List {
                item: Some(Box::new(parse_annotation(pieces[0]))),
            }
        }
        ("dict" | "Dict" | "Mapping", _) => TypeDescriptor::Mapping,
        ("Annotated", Some(args)) => parse_annotated(args),
        ("Literal", Some(args)) => TypeDescriptor::Literals(
            split_top_level(args, ',')
                .iter()
                .map(|piece| parse_literal(piece))
                .collect(),
        ),
        (name, None) if crate::parse::is_identifier(name) => {
            TypeDescriptor::Named(name.to_string())
        }
        // Unsupported generics (Optional, Union, Tuple, ...) resolve as
        // unknown nominal types and surface as Invalid nodes.
        (name, _) => TypeDescriptor::Named(name.to_string()),
    }
}

/// Parse a default expression into a JSON value. `None` and anything
/// non-literal become JSON null: the parameter is still optional, but no
/// default value is carried onto the wire.
pub fn parse_literal(text: &str) -> Value {
    let trimmed = text.trim();
    match trimmed {
        "" | "None" => return Value::Null,
        "True" => return Value::Bool(true),
        "False" => return Value::Bool(false),
        _ => {}
    }

    if trimmed.starts_with('"') || trimmed.starts_with('\'') {
        return Value::String(unquote(trimmed).to_string());
    }
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        if inner.trim().is_empty() {
            return Value::Array(Vec::new());
        }
        return Value::Array(split_top_level(inner, ',').iter().map(|p| parse_literal(p)).collect());
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::Null
}

/// `Annotated[inner, "description", Required?]`
fn parse_annotated(args: &str) -> TypeDescriptor {
    let pieces = split_top_level(args, ',');
    let inner = parse_annotation(pieces[0]);

    let mut description = None;
    let mut required_marker = false;
    for piece in pieces.iter().skip(1) {
        let piece = piece.trim();
        if piece.starts_with('"') || piece.starts_with('\'') {
            if description.is_none() {
                description = Some(unquote(piece).to_string());
            }
        } else if last_segment(piece) == REQUIRED_MARKER {
            required_marker = true;
        }
    }

    TypeDescriptor::Annotated {
        inner: Box::new(inner),
        description,
        required_marker,
    }
}

/// Split `Head[args]` into its head and bracketed argument text.
fn split_generic(text: &str) -> (&str, Option<&str>) {
    if !text.ends_with(']') {
        return (text, None);
    }
    // The opening bracket of the outermost generic is the first one in
    // the expression.
    match text.find('[') {
        Some(open) => (text[..open].trim(), Some(&text[open + 1..text.len() - 1])),
        None => (text, None),
    }
}
