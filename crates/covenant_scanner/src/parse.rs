//! Line-oriented parser for plugin source files.
//!
//! The syntax pass only needs the contract-bearing surface of a plugin
//! module: plugin classes, their decorated action methods with raw
//! annotation text, and plain data classes declaring nominal types.
//! Everything else (method bodies, imports, module-level statements) is
//! skipped. Annotation text is handed to [`crate::pytypes`] untouched.

use std::fmt;

/// Base class name that marks a class as a plugin.
const PLUGIN_BASE: &str = "BasePlugin";
/// Decorator name that marks a method as an action.
const ACTION_DECORATOR: &str = "action";

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Everything the syntax pass extracts from one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedModule {
    pub plugin_classes: Vec<ParsedClass>,
    pub nominals: Vec<ParsedNominal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedClass {
    pub name: String,
    /// 1-based line of the `class` header.
    pub line: usize,
    pub methods: Vec<ParsedMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMethod {
    pub name: String,
    pub line: usize,
    pub is_async: bool,
    pub is_streaming: bool,
    pub category: String,
    /// Parameters excluding the receiver.
    pub params: Vec<ParsedParam>,
    /// Raw return annotation text, if any.
    pub return_annotation: Option<String>,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParam {
    pub name: String,
    /// Raw annotation text, if any.
    pub annotation: Option<String>,
    /// Raw default expression text, if any.
    pub default: Option<String>,
}

/// A plain data class declaring a nominal type: `name: annotation = default`
/// fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNominal {
    pub name: String,
    pub fields: Vec<ParsedNominalField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNominalField {
    pub name: String,
    pub annotation: String,
    pub default: Option<String>,
}

/// Parse one source file. Errors only on structural breakage the scanner
/// cannot recover from (unterminated brackets or strings); anything merely
/// unrecognized is skipped.
pub fn parse_module(source: &str) -> Result<ParsedModule, ParseError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut module = ParsedModule::default();
    let mut i = 0;

    while i < lines.len() {
        let code = strip_comment(lines[i]);
        let trimmed = code.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if let Some(header) = parse_class_header(trimmed) {
            let class_indent = indent_of(lines[i]);
            let class_line = i + 1;
            if header.is_plugin {
                let (class, next) =
                    parse_plugin_body(&lines, i + 1, class_indent, header.name, class_line)?;
                module.plugin_classes.push(class);
                i = next;
            } else {
                let (nominal, next) = parse_nominal_body(&lines, i + 1, class_indent, header.name);
                module.nominals.push(nominal);
                i = next;
            }
        } else if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
            i = skip_string_block(&lines, i)?;
        } else {
            i += 1;
        }
    }

    Ok(module)
}

struct ClassHeader {
    name: String,
    is_plugin: bool,
}

fn parse_class_header(trimmed: &str) -> Option<ClassHeader> {
    let rest = trimmed.strip_prefix("class ")?;
    let rest = rest.trim_end().strip_suffix(':')?.trim();
    let (name, bases) = match rest.find('(') {
        Some(open) => {
            let close = rest.rfind(')')?;
            (rest[..open].trim(), Some(&rest[open + 1..close]))
        }
        None => (rest, None),
    };
    if !is_identifier(name) {
        return None;
    }
    let is_plugin = bases.is_some_and(|list| {
        split_top_level(list, ',')
            .iter()
            .any(|base| last_segment(base.trim()) == PLUGIN_BASE)
    });
    Some(ClassHeader {
        name: name.to_string(),
        is_plugin,
    })
}

/// Decorator arguments carried into the next `def`.
#[derive(Debug, Clone, Default)]
struct ActionDecorator {
    category: Option<String>,
    stream: bool,
}

fn parse_plugin_body(
    lines: &[&str],
    start: usize,
    class_indent: usize,
    class_name: String,
    class_line: usize,
) -> Result<(ParsedClass, usize), ParseError> {
    let mut methods = Vec::new();
    let mut pending: Option<ActionDecorator> = None;
    let mut body_indent: Option<usize> = None;
    let mut i = start;

    while i < lines.len() {
        let code = strip_comment(lines[i]);
        let trimmed = code.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        let indent = indent_of(lines[i]);
        if indent <= class_indent {
            break;
        }
        let member_indent = *body_indent.get_or_insert(indent);
        if indent > member_indent {
            // Inside a method body or nested block.
            i += 1;
            continue;
        }

        if trimmed.starts_with('@') {
            let (text, next) = gather_statement(lines, i, false)?;
            i = next;
            let decorator_text = text.trim().trim_start_matches('@');
            let head = decorator_text
                .split('(')
                .next()
                .unwrap_or(decorator_text)
                .trim();
            if last_segment(head) == ACTION_DECORATOR {
                pending = Some(parse_action_args(decorator_text));
            }
            continue;
        }

        if trimmed.starts_with("def ") || trimmed.starts_with("async def ") {
            let method_line = i + 1;
            let (signature, next) = gather_statement(lines, i, true)?;
            i = next;
            let decorator = pending.take();
            if let Some(decorator) = decorator {
                let (docstring, after_doc) = parse_docstring(lines, i)?;
                i = after_doc;
                let method = parse_signature(&signature, method_line, decorator, docstring)?;
                methods.push(method);
            }
            continue;
        }

        // Any other member statement drops a dangling decorator.
        pending = None;
        if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
            i = skip_string_block(lines, i)?;
        } else {
            i += 1;
        }
    }

    Ok((
        ParsedClass {
            name: class_name,
            line: class_line,
            methods,
        },
        i,
    ))
}

fn parse_nominal_body(
    lines: &[&str],
    start: usize,
    class_indent: usize,
    class_name: String,
) -> (ParsedNominal, usize) {
    let mut fields = Vec::new();
    let mut body_indent: Option<usize> = None;
    let mut i = start;

    while i < lines.len() {
        let code = strip_comment(lines[i]);
        let trimmed = code.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        let indent = indent_of(lines[i]);
        if indent <= class_indent {
            break;
        }
        let member_indent = *body_indent.get_or_insert(indent);
        if indent > member_indent {
            i += 1;
            continue;
        }

        if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
            match skip_string_block(lines, i) {
                Ok(next) => i = next,
                Err(_) => break,
            }
            continue;
        }

        if let Some(field) = parse_nominal_field(trimmed) {
            fields.push(field);
        }
        i += 1;
    }

    (
        ParsedNominal {
            name: class_name,
            fields,
        },
        i,
    )
}

fn parse_nominal_field(trimmed: &str) -> Option<ParsedNominalField> {
    for prefix in ["def ", "async ", "class ", "@", "if ", "for ", "while ", "return"] {
        if trimmed.starts_with(prefix) {
            return None;
        }
    }
    let colon = find_top_level(trimmed, ':')?;
    let name = trimmed[..colon].trim();
    if !is_identifier(name) {
        return None;
    }
    let rest = &trimmed[colon + 1..];
    let (annotation, default) = match find_top_level(rest, '=') {
        Some(eq) => (
            rest[..eq].trim().to_string(),
            Some(rest[eq + 1..].trim().to_string()),
        ),
        None => (rest.trim().to_string(), None),
    };
    if annotation.is_empty() {
        return None;
    }
    Some(ParsedNominalField {
        name: name.to_string(),
        annotation,
        default,
    })
}

fn parse_action_args(decorator_text: &str) -> ActionDecorator {
    let mut parsed = ActionDecorator::default();
    let Some(open) = decorator_text.find('(') else {
        return parsed;
    };
    let Some(close) = decorator_text.rfind(')') else {
        return parsed;
    };
    for arg in split_top_level(&decorator_text[open + 1..close], ',') {
        let Some(eq) = find_top_level(arg, '=') else {
            continue;
        };
        let key = arg[..eq].trim();
        let value = arg[eq + 1..].trim();
        match key {
            "category" => parsed.category = Some(unquote(value).to_string()),
            "stream" => parsed.stream = value == "True",
            _ => {}
        }
    }
    parsed
}

fn parse_signature(
    signature: &str,
    line: usize,
    decorator: ActionDecorator,
    docstring: Option<String>,
) -> Result<ParsedMethod, ParseError> {
    let trimmed = signature.trim();
    let (is_async, rest) = match trimmed.strip_prefix("async ") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let rest = rest.strip_prefix("def ").ok_or_else(|| ParseError {
        line,
        message: "expected a def statement".to_string(),
    })?;

    let open = rest.find('(').ok_or_else(|| ParseError {
        line,
        message: "method signature has no parameter list".to_string(),
    })?;
    let name = rest[..open].trim();
    if !is_identifier(name) {
        return Err(ParseError {
            line,
            message: format!("invalid method name '{}'", name),
        });
    }

    let close = matching_close(rest, open).ok_or_else(|| ParseError {
        line,
        message: "unbalanced parameter list".to_string(),
    })?;
    let params_text = &rest[open + 1..close];
    let tail = rest[close + 1..].trim().trim_end_matches(':').trim();
    let return_annotation = tail
        .strip_prefix("->")
        .map(|ret| ret.trim().to_string())
        .filter(|ret| !ret.is_empty());

    let mut params = Vec::new();
    for piece in split_top_level(params_text, ',') {
        let piece = piece.trim();
        if piece.is_empty()
            || piece == "self"
            || piece == "cls"
            || piece == "*"
            || piece == "/"
            || piece.starts_with('*')
        {
            continue;
        }
        let param = match find_top_level(piece, ':') {
            Some(colon) => {
                let name = piece[..colon].trim().to_string();
                let rest = &piece[colon + 1..];
                match find_top_level(rest, '=') {
                    Some(eq) => ParsedParam {
                        name,
                        annotation: Some(rest[..eq].trim().to_string()),
                        default: Some(rest[eq + 1..].trim().to_string()),
                    },
                    None => ParsedParam {
                        name,
                        annotation: Some(rest.trim().to_string()),
                        default: None,
                    },
                }
            }
            None => match find_top_level(piece, '=') {
                Some(eq) => ParsedParam {
                    name: piece[..eq].trim().to_string(),
                    annotation: None,
                    default: Some(piece[eq + 1..].trim().to_string()),
                },
                None => ParsedParam {
                    name: piece.to_string(),
                    annotation: None,
                    default: None,
                },
            },
        };
        if is_identifier(&param.name) {
            params.push(param);
        }
    }

    Ok(ParsedMethod {
        name: name.to_string(),
        line,
        is_async,
        is_streaming: decorator.stream,
        category: decorator.category.unwrap_or_else(|| "exec".to_string()),
        params,
        return_annotation,
        docstring,
    })
}

/// Read the docstring immediately following a method signature, if present.
/// Returns the docstring and the index of the first line after it.
fn parse_docstring(
    lines: &[&str],
    start: usize,
) -> Result<(Option<String>, usize), ParseError> {
    let mut i = start;
    while i < lines.len() && strip_comment(lines[i]).trim().is_empty() {
        i += 1;
    }
    if i >= lines.len() {
        return Ok((None, start));
    }
    let trimmed = lines[i].trim_start();
    let delim = if trimmed.starts_with("\"\"\"") {
        "\"\"\""
    } else if trimmed.starts_with("'''") {
        "'''"
    } else {
        return Ok((None, start));
    };

    let after_open = &trimmed[delim.len()..];
    if let Some(end) = after_open.find(delim) {
        let text = after_open[..end].trim().to_string();
        return Ok((none_if_empty(text), i + 1));
    }

    let mut parts = vec![after_open.to_string()];
    let mut j = i + 1;
    while j < lines.len() {
        if let Some(end) = lines[j].find(delim) {
            parts.push(lines[j][..end].to_string());
            let text = parts.join("\n").trim().to_string();
            return Ok((none_if_empty(text), j + 1));
        }
        parts.push(lines[j].to_string());
        j += 1;
    }
    Err(ParseError {
        line: i + 1,
        message: "unterminated docstring".to_string(),
    })
}

fn none_if_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Join continuation lines of one statement until brackets balance.
/// With `need_colon`, also requires the statement to end with `:`
/// (def headers). Errors at EOF with the statement still open.
fn gather_statement(
    lines: &[&str],
    start: usize,
    need_colon: bool,
) -> Result<(String, usize), ParseError> {
    let mut text = String::new();
    let mut i = start;
    while i < lines.len() {
        let code = strip_comment(lines[i]);
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(code.trim());
        i += 1;
        if bracket_depth(&text) == 0 && (!need_colon || text.trim_end().ends_with(':')) {
            return Ok((text, i));
        }
    }
    Err(ParseError {
        line: start + 1,
        message: "unterminated statement".to_string(),
    })
}

/// Skip a triple-quoted string block starting at `start`; returns the index
/// of the first line after it.
fn skip_string_block(lines: &[&str], start: usize) -> Result<usize, ParseError> {
    let trimmed = lines[start].trim_start();
    let delim = if trimmed.starts_with("\"\"\"") {
        "\"\"\""
    } else {
        "'''"
    };
    if trimmed[delim.len()..].contains(delim) {
        return Ok(start + 1);
    }
    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if line.contains(delim) {
            return Ok(start + offset + 2);
        }
    }
    Err(ParseError {
        line: start + 1,
        message: "unterminated string".to_string(),
    })
}

/// Leading indentation width; a tab counts as four columns.
fn indent_of(line: &str) -> usize {
    let mut width = 0;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

/// Cut an unquoted `#` comment off the end of a line.
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' | '"' => match in_string {
                Some(open) if open == ch => in_string = None,
                Some(_) => {}
                None => in_string = Some(ch),
            },
            '#' if in_string.is_none() => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Split at `sep` occurring outside brackets and strings.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' | '"' => match in_string {
                Some(open) if open == ch => in_string = None,
                Some(_) => {}
                None => in_string = Some(ch),
            },
            '(' | '[' | '{' if in_string.is_none() => depth += 1,
            ')' | ']' | '}' if in_string.is_none() => depth -= 1,
            c if c == sep && depth == 0 && in_string.is_none() => {
                pieces.push(&text[last..idx]);
                last = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&text[last..]);
    pieces
}

/// First position of `needle` outside brackets and strings.
pub(crate) fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' | '"' => match in_string {
                Some(open) if open == ch => in_string = None,
                Some(_) => {}
                None => in_string = Some(ch),
            },
            '(' | '[' | '{' if in_string.is_none() => depth += 1,
            ')' | ']' | '}' if in_string.is_none() => depth -= 1,
            c if c == needle && depth == 0 && in_string.is_none() => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Index of the bracket closing the one at `open`.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in text.char_indices().skip_while(|(idx, _)| *idx < open) {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' | '"' => match in_string {
                Some(quote) if quote == ch => in_string = None,
                Some(_) => {}
                None => in_string = Some(ch),
            },
            '(' | '[' | '{' if in_string.is_none() => depth += 1,
            ')' | ']' | '}' if in_string.is_none() => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn bracket_depth(text: &str) -> i32 {
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' | '"' => match in_string {
                Some(open) if open == ch => in_string = None,
                Some(_) => {}
                None => in_string = Some(ch),
            },
            '(' | '[' | '{' if in_string.is_none() => depth += 1,
            ')' | ']' | '}' if in_string.is_none() => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// `a.b.C` -> `C`
pub(crate) fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

pub(crate) fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        if (bytes[0] == b'"' && bytes[trimmed.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[trimmed.len() - 1] == b'\'')
        {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREETER: &str = r#"
from covenant_sdk import BasePlugin, action
from typing import Annotated


class Greeter(BasePlugin):
    """Greets people."""

    @action
    def greet(self, name: Annotated[str, "Name of the person to greet"]) -> Annotated[str, "The greeting"]:
        """Produce a greeting."""
        return f"Hello, {name}!"
"#;

    #[test]
    fn greeter_parses() {
        let module = parse_module(GREETER).unwrap();
        assert_eq!(module.plugin_classes.len(), 1);
        let class = &module.plugin_classes[0];
        assert_eq!(class.name, "Greeter");
        assert_eq!(class.methods.len(), 1);

        let method = &class.methods[0];
        assert_eq!(method.name, "greet");
        assert!(!method.is_async);
        assert!(!method.is_streaming);
        assert_eq!(method.category, "exec");
        assert_eq!(method.docstring.as_deref(), Some("Produce a greeting."));
        assert_eq!(method.params.len(), 1);
        assert_eq!(method.params[0].name, "name");
        assert_eq!(
            method.params[0].annotation.as_deref(),
            Some("Annotated[str, \"Name of the person to greet\"]")
        );
        assert!(method.params[0].default.is_none());
        assert_eq!(
            method.return_annotation.as_deref(),
            Some("Annotated[str, \"The greeting\"]")
        );
    }

    #[test]
    fn decorator_arguments_are_read() {
        let source = r#"
class Exporter(BasePlugin):
    @action(category="transform", stream=True)
    async def export(self, limit: int = 10) -> list:
        """Stream rows."""
        yield {}
"#;
        let module = parse_module(source).unwrap();
        let method = &module.plugin_classes[0].methods[0];
        assert_eq!(method.category, "transform");
        assert!(method.is_streaming);
        assert!(method.is_async);
        assert_eq!(method.params[0].default.as_deref(), Some("10"));
    }

    #[test]
    fn undecorated_methods_are_skipped() {
        let source = r#"
class Helper(BasePlugin):
    @action
    def visible(self) -> str:
        """Doc."""
        return ""

    def hidden(self, x: int) -> int:
        return x
"#;
        let module = parse_module(source).unwrap();
        let class = &module.plugin_classes[0];
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name, "visible");
    }

    #[test]
    fn attribute_qualified_base_is_recognized() {
        let source = "class P(sdk.BasePlugin):\n    @action\n    def go(self) -> str:\n        return ''\n";
        let module = parse_module(source).unwrap();
        assert_eq!(module.plugin_classes.len(), 1);
    }

    #[test]
    fn plain_classes_become_nominals() {
        let source = r#"
class Address:
    street: Annotated[str, "Street"]
    zip_code: Annotated[str, "Zip"] = "00000"


class User:
    """A user record."""
    name: Annotated[str, "Name"]
    address: Address
"#;
        let module = parse_module(source).unwrap();
        assert!(module.plugin_classes.is_empty());
        assert_eq!(module.nominals.len(), 2);
        let address = &module.nominals[0];
        assert_eq!(address.name, "Address");
        assert_eq!(address.fields.len(), 2);
        assert_eq!(address.fields[1].default.as_deref(), Some("\"00000\""));
        let user = &module.nominals[1];
        assert_eq!(user.fields.len(), 2);
        assert_eq!(user.fields[1].annotation, "Address");
    }

    #[test]
    fn multiline_signatures_join() {
        let source = r#"
class P(BasePlugin):
    @action
    def many(
        self,
        first: Annotated[str, "First"],
        second: Annotated[int, "Second"] = 2,
    ) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#;
        let module = parse_module(source).unwrap();
        let method = &module.plugin_classes[0].methods[0];
        assert_eq!(method.params.len(), 2);
        assert_eq!(method.params[1].name, "second");
        assert_eq!(method.params[1].default.as_deref(), Some("2"));
    }

    #[test]
    fn unterminated_signature_is_an_error() {
        let source = "class P(BasePlugin):\n    @action\n    def broken(self, x: int";
        assert!(parse_module(source).is_err());
    }

    #[test]
    fn comments_and_strings_do_not_confuse_splitting() {
        assert_eq!(strip_comment("x = 1  # note"), "x = 1  ");
        assert_eq!(strip_comment("s = '#not a comment'"), "s = '#not a comment'");
        let pieces = split_top_level("Annotated[str, \"a, b\"], int", ',');
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].trim(), "int");
    }
}
