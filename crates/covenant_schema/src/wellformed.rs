//! Recursive schema well-formedness checking.
//!
//! Walks a persisted schema tree and reports structural problems as
//! diagnostics. Never throws; callers collect everything and decide.

use covenant_protocol::{Diagnostic, DiagnosticKind, SchemaKind, SchemaNode, MAX_NESTING_DEPTH};

/// Check one schema tree, accumulating diagnostics.
///
/// `context` is a dotted path used for locations, e.g.
/// `greet.inputSchema.user.address`.
pub fn check_schema(node: &SchemaNode, context: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_at(node, context, 0, &mut diagnostics);
    diagnostics
}

fn check_at(node: &SchemaNode, context: &str, depth: usize, out: &mut Vec<Diagnostic>) {
    if depth > MAX_NESTING_DEPTH {
        out.push(Diagnostic::new(
            DiagnosticKind::SchemaDepthExceeded,
            context,
            format!("schema nesting exceeds the ceiling ({})", MAX_NESTING_DEPTH),
        ));
        return;
    }

    match node.kind {
        SchemaKind::Invalid => {
            let detail = node.error.as_deref().unwrap_or("invalid schema node");
            out.push(Diagnostic::new(
                DiagnosticKind::SchemaMalformed,
                context,
                detail,
            ));
        }
        SchemaKind::Object => {
            let Some(properties) = node.properties.as_ref() else {
                out.push(Diagnostic::new(
                    DiagnosticKind::SchemaMalformed,
                    context,
                    "object type missing 'properties'",
                ));
                return;
            };
            for (name, child) in properties.iter() {
                let child_context = format!("{}.{}", context, name);
                check_at(child, &child_context, depth + 1, out);
            }
        }
        SchemaKind::Array => {
            let Some(items) = node.items.as_ref() else {
                out.push(Diagnostic::new(
                    DiagnosticKind::SchemaMalformed,
                    context,
                    "array type missing 'items'",
                ));
                return;
            };
            let items_context = format!("{}.items", context);
            check_at(items, &items_context, depth + 1, out);
        }
        // All other kinds are leaves and always pass.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_protocol::Properties;

    fn leaf(kind: SchemaKind) -> SchemaNode {
        SchemaNode::of_kind(kind)
    }

    #[test]
    fn leaves_always_pass() {
        for kind in [
            SchemaKind::String,
            SchemaKind::Number,
            SchemaKind::Boolean,
            SchemaKind::Blob,
            SchemaKind::Null,
        ] {
            assert!(check_schema(&leaf(kind), "x").is_empty());
        }
    }

    #[test]
    fn object_without_properties_is_malformed() {
        let node = leaf(SchemaKind::Object);
        let diags = check_schema(&node, "a.inputSchema");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::SchemaMalformed);
        assert_eq!(diags[0].location, "a.inputSchema");
    }

    #[test]
    fn array_without_items_is_malformed() {
        let node = leaf(SchemaKind::Array);
        let diags = check_schema(&node, "a.outputSchema");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::SchemaMalformed);
    }

    #[test]
    fn nested_problems_report_full_paths() {
        let mut props = Properties::new();
        props.insert("ok", leaf(SchemaKind::String));
        props.insert("bad", leaf(SchemaKind::Array));
        let node = SchemaNode::object(props);

        let diags = check_schema(&node, "act.inputSchema");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].location, "act.inputSchema.bad");
    }

    #[test]
    fn invalid_node_reports_its_error() {
        let node = SchemaNode::invalid("failed to resolve type 'Ghost'");
        let diags = check_schema(&node, "x");
        assert_eq!(diags[0].kind, DiagnosticKind::SchemaMalformed);
        assert!(diags[0].message.contains("Ghost"));
    }

    #[test]
    fn depth_beyond_ceiling_is_reported() {
        // Build an array nested 5 levels deep.
        let mut node = leaf(SchemaKind::String);
        for _ in 0..5 {
            node = SchemaNode::array(node);
        }
        let diags = check_schema(&node, "deep");
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::SchemaDepthExceeded));
    }

    #[test]
    fn all_problems_are_collected_not_just_the_first() {
        let mut props = Properties::new();
        props.insert("first", leaf(SchemaKind::Object));
        props.insert("second", leaf(SchemaKind::Array));
        let node = SchemaNode::object(props);

        let diags = check_schema(&node, "multi");
        assert_eq!(diags.len(), 2);
    }
}
