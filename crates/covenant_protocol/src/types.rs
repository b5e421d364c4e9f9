//! Core wire types shared by every Covenant crate.
//!
//! A `Contract` is the persisted, serializable description of all of a
//! plugin's actions. Scanning always rebuilds `Action` records wholesale;
//! the persisted contract is the durable source of truth in between.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Closed set of schema node kinds.
///
/// `int` and `float` in plugin sources both collapse to `Number`; any
/// nominal composite becomes `Object`; raw byte sequences are `Blob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// UTF-8 string
    String,
    /// Integer or floating point number
    Number,
    /// Boolean
    Boolean,
    /// Homogeneous list; `items` describes the element schema
    Array,
    /// Nominal composite with named fields
    Object,
    /// Raw byte sequence (paths or base64 on the wire)
    Blob,
    /// Explicit absence type
    Null,
    /// Resolution failure; `error` explains why
    Invalid,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Array => "array",
            SchemaKind::Object => "object",
            SchemaKind::Blob => "blob",
            SchemaKind::Null => "null",
            SchemaKind::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

/// Ordered `name -> SchemaNode` map for Object properties.
///
/// Declaration order is significant on the wire, so this is a thin
/// insertion-ordered map rather than a `BTreeMap`/`HashMap`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, SchemaNode)>);

impl Properties {
    /// Create an empty property map.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a property, replacing any existing entry with the same name
    /// in place (order of first insertion wins).
    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) {
        let name = name.into();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = node;
        } else {
            self.0.push((name, node));
        }
    }

    /// Look up a property by name.
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterate properties in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Property names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, SchemaNode)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, SchemaNode)>>(iter: T) -> Self {
        let mut props = Properties::new();
        for (name, node) in iter {
            props.insert(name, node);
        }
        props
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, node) in &self.0 {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of property name to schema node")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut props = Properties::new();
                while let Some((name, node)) = access.next_entry::<String, SchemaNode>()? {
                    props.insert(name, node);
                }
                Ok(props)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

/// One node of the recursive type-to-wire-format tree.
///
/// `required` is only meaningful at a field site, and only at the top level
/// of an input schema: nested object fields instead contribute their names
/// to the parent's `required_fields` list. The asymmetry is preserved for
/// wire compatibility with existing contract documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Node kind; always present.
    #[serde(rename = "type")]
    pub kind: SchemaKind,

    /// Human-readable description, taken from the annotation metadata.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Whether this top-level field must be supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Closed set of allowed literal values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Named fields, in declaration order (Object only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,

    /// Names among `properties` that must be present (Object only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_fields: Option<Vec<String>>,

    /// Element schema (Array only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    /// Default value copied from the declaration site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Explanation of the failure (Invalid only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SchemaNode {
    /// Leaf node of the given kind with no metadata.
    pub fn of_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: String::new(),
            required: None,
            enum_values: None,
            properties: None,
            required_fields: None,
            items: None,
            default: None,
            error: None,
        }
    }

    /// Invalid node carrying an explanatory error.
    pub fn invalid(error: impl Into<String>) -> Self {
        let mut node = Self::of_kind(SchemaKind::Invalid);
        node.error = Some(error.into());
        node
    }

    /// Object node with the given properties.
    pub fn object(properties: Properties) -> Self {
        let mut node = Self::of_kind(SchemaKind::Object);
        node.properties = Some(properties);
        node
    }

    /// Array node with the given element schema.
    pub fn array(items: SchemaNode) -> Self {
        let mut node = Self::of_kind(SchemaKind::Array);
        node.items = Some(Box::new(items));
        node
    }

    /// Attach a description, overwriting any existing one.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_invalid(&self) -> bool {
        self.kind == SchemaKind::Invalid
    }
}

/// Kinds of problems reported by scanning and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Parameter carries no annotation metadata at all
    MissingTypeAnnotation,
    /// Annotated parameter lacks a description
    MissingDescription,
    /// Method has no return annotation
    MissingReturnType,
    /// Method has an empty docstring
    MissingDocstring,
    /// Schema nesting exceeds the fixed ceiling
    SchemaDepthExceeded,
    /// Schema tree is structurally broken
    SchemaMalformed,
    /// Contract names an action the source no longer defines
    DriftMissingInCode,
    /// Source defines an action the contract does not list
    DriftMissingInContract,
    /// A source file could not be parsed
    ParseFailure,
    /// Type enrichment failed for a discovered action
    EnrichmentFailure,
    /// Potentially dangerous call found by the textual security scan
    SecurityWarning,
    /// Dependency declaration lacks a version constraint
    DependencyFormat,
    /// Synchronous action could be declared async (advisory)
    MissingAsyncMarker,
}

impl DiagnosticKind {
    /// Advisory kinds are reported but never fail an audit.
    pub fn is_advisory(self) -> bool {
        matches!(
            self,
            DiagnosticKind::SecurityWarning | DiagnosticKind::MissingAsyncMarker
        )
    }
}

/// A collected problem report. Pure value, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Where the problem was found, e.g. `greeter.py:Greeter.greet#name`.
    pub location: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}: {}", self.kind, self.location, self.message)
    }
}

/// Source location of an action: owning file plus enclosing class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLocation {
    /// Path relative to the plugin root.
    pub file: String,
    /// Enclosing class name.
    #[serde(rename = "class")]
    pub class_name: String,
}

fn default_category() -> String {
    "exec".to_string()
}

/// A single invocable, schema-described capability discovered in source.
///
/// Identity is by `name`; every scan recreates Action records wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub description: String,

    pub location: ActionLocation,

    #[serde(rename = "inputSchema")]
    pub input_schema: SchemaNode,

    #[serde(rename = "outputSchema")]
    pub output_schema: SchemaNode,

    #[serde(default)]
    pub is_streaming: bool,

    #[serde(default)]
    pub is_async: bool,

    /// Scan-time diagnostics attached to this action. Stripped from
    /// persisted contracts but kept in the scan cache.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

/// Identity block of a contract document, merged across regenerations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

impl PluginInfo {
    /// Default identity derived from the plugin directory name.
    pub fn for_directory(dir_name: &str) -> Self {
        Self {
            id: dir_name.to_string(),
            name: dir_name.to_string(),
            version: "0.1.0".to_string(),
            description: format!("{} plugin", dir_name),
        }
    }
}

/// The persisted, serializable description of all of a plugin's actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub plugin_info: PluginInfo,
    pub actions: Vec<Action>,
}

impl Contract {
    /// Look up an action by name.
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Action names in contract order.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }
}

/// The minimal unit of a streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Incremental content produced by this step.
    pub delta: Value,
    /// Sequence number, starting at 0.
    pub index: u64,
    /// Whether this is the terminal chunk.
    pub is_last: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
}

impl StreamChunk {
    pub fn new(delta: Value, index: u64) -> Self {
        Self {
            delta,
            index,
            is_last: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// Terminal marker chunk.
    pub fn last(delta: Value, index: u64) -> Self {
        Self {
            delta,
            index,
            is_last: true,
            metadata: serde_json::Map::new(),
        }
    }
}
