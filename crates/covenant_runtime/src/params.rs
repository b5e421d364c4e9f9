//! Argument validation against an action's input schema.
//!
//! Runs before the handler; a violation means the handler is never
//! invoked. Violations carry the dotted path of the offending field.

use crate::error::{DispatchError, Result};
use crate::registry::ArgMap;
use covenant_protocol::{SchemaKind, SchemaNode};
use serde_json::Value;

/// Validate call arguments against a top-level input schema.
pub fn validate_args(schema: &SchemaNode, args: &ArgMap) -> Result<()> {
    let Some(properties) = schema.properties.as_ref() else {
        // A contract with no declared inputs accepts only empty args.
        if args.is_empty() {
            return Ok(());
        }
        return Err(DispatchError::violation(
            args.keys().next().cloned().unwrap_or_default(),
            "action declares no parameters",
        ));
    };

    for (name, node) in properties.iter() {
        match args.get(name) {
            Some(value) => check_value(node, value, name)?,
            None => {
                let has_default = node.default.is_some();
                if node.required == Some(true) && !has_default {
                    return Err(DispatchError::violation(
                        name,
                        "required argument is missing",
                    ));
                }
            }
        }
    }

    for key in args.keys() {
        if properties.get(key).is_none() {
            return Err(DispatchError::violation(key, "unexpected argument"));
        }
    }

    Ok(())
}

fn check_value(node: &SchemaNode, value: &Value, path: &str) -> Result<()> {
    if let Some(allowed) = &node.enum_values {
        if !allowed.contains(value) {
            return Err(DispatchError::violation(
                path,
                format!("value {} is not one of the allowed values", value),
            ));
        }
    }

    match node.kind {
        SchemaKind::String => expect(value.is_string(), value, path, "a string"),
        SchemaKind::Number => expect(value.is_number(), value, path, "a number"),
        SchemaKind::Boolean => expect(value.is_boolean(), value, path, "a boolean"),
        SchemaKind::Null => expect(value.is_null(), value, path, "null"),
        // Blobs travel as strings on the wire: a filesystem path or
        // base64 payload the handler decodes.
        SchemaKind::Blob => expect(value.is_string(), value, path, "a blob string"),
        SchemaKind::Array => {
            let Some(items) = value.as_array() else {
                return expect(false, value, path, "an array");
            };
            if let Some(item_schema) = node.items.as_ref() {
                for (index, item) in items.iter().enumerate() {
                    check_value(item_schema, item, &format!("{}[{}]", path, index))?;
                }
            }
            Ok(())
        }
        SchemaKind::Object => {
            let Some(map) = value.as_object() else {
                return expect(false, value, path, "an object");
            };
            if let Some(required) = &node.required_fields {
                for field in required {
                    if !map.contains_key(field) {
                        return Err(DispatchError::violation(
                            format!("{}.{}", path, field),
                            "required field is missing",
                        ));
                    }
                }
            }
            if let Some(properties) = &node.properties {
                for (name, child) in properties.iter() {
                    if let Some(child_value) = map.get(name) {
                        check_value(child, child_value, &format!("{}.{}", path, name))?;
                    }
                }
                for key in map.keys() {
                    if properties.get(key).is_none() {
                        return Err(DispatchError::violation(
                            format!("{}.{}", path, key),
                            "unexpected field",
                        ));
                    }
                }
            }
            Ok(())
        }
        SchemaKind::Invalid => Err(DispatchError::violation(
            path,
            node.error
                .clone()
                .unwrap_or_else(|| "schema is invalid".to_string()),
        )),
    }
}

fn expect(ok: bool, value: &Value, path: &str, expected: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(DispatchError::violation(
            path,
            format!("expected {}, got {}", expected, kind_of(value)),
        ))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
