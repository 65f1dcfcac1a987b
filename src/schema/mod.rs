//! Schema description trees
//!
//! A contract's schema is a closed tagged union of node kinds. Generators and
//! the parser are structural recursions over [`SchemaNode`]; there is no
//! runtime introspection of foreign schema objects.
//!
//! Schemas serialize with a `kind` tag so contract files can describe them:
//!
//! ```json
//! {
//!   "kind": "object",
//!   "fields": [
//!     { "name": "title", "schema": { "kind": "string", "min_length": 1 } },
//!     { "name": "done", "schema": { "kind": "default", "inner": { "kind": "boolean" }, "value": false } }
//!   ]
//! }
//! ```
//!
//! Unrecognized kinds deserialize to [`SchemaNode::Unsupported`] so loading
//! never fails on shapes written for a newer toolchain.

mod parse;

pub use parse::{ContractResolver, NoResolver, ParseFailure, ValidationIssue};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One structural unit of a schema description tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaNode {
    String(StringConstraints),
    Number(NumberConstraints),
    Boolean,
    /// RFC 3339 timestamp carried as a string on the wire
    Date,
    Object(ObjectSchema),
    Array(ArraySchema),
    /// Enumeration of string literals
    Enum { values: Vec<String> },
    /// Named members with string or numeric values
    NativeEnum { members: Vec<NativeEnumMember> },
    Union { options: Vec<SchemaNode> },
    Intersection {
        left: Box<SchemaNode>,
        right: Box<SchemaNode>,
    },
    Optional { inner: Box<SchemaNode> },
    Nullable { inner: Box<SchemaNode> },
    Default {
        inner: Box<SchemaNode>,
        value: Value,
    },
    Literal { value: Value },
    /// String-keyed map with uniform values
    Record { values: Box<SchemaNode> },
    Any,
    Unknown,
    /// Reference to another registered contract (latest version when unpinned)
    Ref {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    /// Any node kind this crate does not understand
    #[serde(other)]
    Unsupported,
}

/// Constraints carried by a string node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Well-known string formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    Email,
    Url,
    Uuid,
    Datetime,
}

impl StringFormat {
    /// OpenAPI `format` keyword for this format
    pub fn openapi_format(&self) -> &'static str {
        match self {
            StringFormat::Email => "email",
            StringFormat::Url => "uri",
            StringFormat::Uuid => "uuid",
            StringFormat::Datetime => "date-time",
        }
    }
}

/// Constraints carried by a number node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_minimum: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_maximum: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub integer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
}

/// Object node: ordered fields plus the unknown-key policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub unknown_keys: UnknownKeys,
}

impl ObjectSchema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A named field of an object node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub schema: SchemaNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// What an object does with keys it does not declare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeys {
    /// Drop undeclared keys from the parsed output
    #[default]
    Strip,
    /// Reject undeclared keys
    Strict,
    /// Keep undeclared keys untouched
    Passthrough,
}

/// Array node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArraySchema {
    pub items: Box<SchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

/// Native enum member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeEnumMember {
    pub key: String,
    pub value: Value,
}

// =============================================================================
// Builders
// =============================================================================

impl SchemaNode {
    pub fn string() -> Self {
        SchemaNode::String(StringConstraints::default())
    }

    pub fn number() -> Self {
        SchemaNode::Number(NumberConstraints::default())
    }

    pub fn integer() -> Self {
        SchemaNode::Number(NumberConstraints {
            integer: true,
            ..NumberConstraints::default()
        })
    }

    pub fn boolean() -> Self {
        SchemaNode::Boolean
    }

    pub fn date() -> Self {
        SchemaNode::Date
    }

    pub fn any() -> Self {
        SchemaNode::Any
    }

    pub fn unknown() -> Self {
        SchemaNode::Unknown
    }

    /// Object node from `(name, schema)` pairs, in declaration order
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        SchemaNode::Object(ObjectSchema {
            fields: fields
                .into_iter()
                .map(|(name, schema)| Field {
                    name: name.into(),
                    schema,
                    description: None,
                })
                .collect(),
            unknown_keys: UnknownKeys::Strip,
        })
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array(ArraySchema {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        })
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaNode::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn native_enum<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        SchemaNode::NativeEnum {
            members: members
                .into_iter()
                .map(|(key, value)| NativeEnumMember { key: key.into(), value })
                .collect(),
        }
    }

    pub fn union(options: Vec<SchemaNode>) -> Self {
        SchemaNode::Union { options }
    }

    pub fn intersection(left: SchemaNode, right: SchemaNode) -> Self {
        SchemaNode::Intersection {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        SchemaNode::Literal { value: value.into() }
    }

    pub fn record(values: SchemaNode) -> Self {
        SchemaNode::Record { values: Box::new(values) }
    }

    pub fn reference(name: impl Into<String>, version: Option<&str>) -> Self {
        SchemaNode::Ref {
            name: name.into(),
            version: version.map(String::from),
        }
    }

    // -------------------------------------------------------------------------
    // Wrappers
    // -------------------------------------------------------------------------

    pub fn optional(self) -> Self {
        SchemaNode::Optional { inner: Box::new(self) }
    }

    pub fn nullable(self) -> Self {
        SchemaNode::Nullable { inner: Box::new(self) }
    }

    pub fn with_default(self, value: impl Into<Value>) -> Self {
        SchemaNode::Default {
            inner: Box::new(self),
            value: value.into(),
        }
    }

    // -------------------------------------------------------------------------
    // Refinements. Each is a no-op on node kinds it does not apply to.
    // -------------------------------------------------------------------------

    pub fn min_length(mut self, n: usize) -> Self {
        if let SchemaNode::String(c) = &mut self {
            c.min_length = Some(n);
        }
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        if let SchemaNode::String(c) = &mut self {
            c.max_length = Some(n);
        }
        self
    }

    pub fn length(mut self, n: usize) -> Self {
        if let SchemaNode::String(c) = &mut self {
            c.length = Some(n);
        }
        self
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        if let SchemaNode::String(c) = &mut self {
            c.format = Some(format);
        }
        self
    }

    pub fn email(self) -> Self {
        self.format(StringFormat::Email)
    }

    pub fn url(self) -> Self {
        self.format(StringFormat::Url)
    }

    pub fn uuid(self) -> Self {
        self.format(StringFormat::Uuid)
    }

    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        if let SchemaNode::String(c) = &mut self {
            c.pattern = Some(regex.into());
        }
        self
    }

    pub fn min(mut self, value: f64) -> Self {
        if let SchemaNode::Number(c) = &mut self {
            c.minimum = Some(value);
            c.exclusive_minimum = false;
        }
        self
    }

    pub fn max(mut self, value: f64) -> Self {
        if let SchemaNode::Number(c) = &mut self {
            c.maximum = Some(value);
            c.exclusive_maximum = false;
        }
        self
    }

    /// Strictly greater than zero
    pub fn positive(mut self) -> Self {
        if let SchemaNode::Number(c) = &mut self {
            c.minimum = Some(0.0);
            c.exclusive_minimum = true;
        }
        self
    }

    pub fn int(mut self) -> Self {
        if let SchemaNode::Number(c) = &mut self {
            c.integer = true;
        }
        self
    }

    pub fn multiple_of(mut self, step: f64) -> Self {
        if let SchemaNode::Number(c) = &mut self {
            c.multiple_of = Some(step);
        }
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        if let SchemaNode::Array(a) = &mut self {
            a.min_items = Some(n);
        }
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        if let SchemaNode::Array(a) = &mut self {
            a.max_items = Some(n);
        }
        self
    }

    pub fn strict(mut self) -> Self {
        if let SchemaNode::Object(o) = &mut self {
            o.unknown_keys = UnknownKeys::Strict;
        }
        self
    }

    pub fn passthrough(mut self) -> Self {
        if let SchemaNode::Object(o) = &mut self {
            o.unknown_keys = UnknownKeys::Passthrough;
        }
        self
    }

    /// Attach a description to an object field
    pub fn describe_field(mut self, field: &str, description: impl Into<String>) -> Self {
        if let SchemaNode::Object(o) = &mut self {
            if let Some(f) = o.fields.iter_mut().find(|f| f.name == field) {
                f.description = Some(description.into());
            }
        }
        self
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Stable name of this node's kind (matches the serde tag)
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::String(_) => "string",
            SchemaNode::Number(_) => "number",
            SchemaNode::Boolean => "boolean",
            SchemaNode::Date => "date",
            SchemaNode::Object(_) => "object",
            SchemaNode::Array(_) => "array",
            SchemaNode::Enum { .. } => "enum",
            SchemaNode::NativeEnum { .. } => "native_enum",
            SchemaNode::Union { .. } => "union",
            SchemaNode::Intersection { .. } => "intersection",
            SchemaNode::Optional { .. } => "optional",
            SchemaNode::Nullable { .. } => "nullable",
            SchemaNode::Default { .. } => "default",
            SchemaNode::Literal { .. } => "literal",
            SchemaNode::Record { .. } => "record",
            SchemaNode::Any => "any",
            SchemaNode::Unknown => "unknown",
            SchemaNode::Ref { .. } => "ref",
            SchemaNode::Unsupported => "unsupported",
        }
    }

    /// A field with this schema may be absent from its object
    pub fn is_optional(&self) -> bool {
        matches!(self, SchemaNode::Optional { .. } | SchemaNode::Default { .. })
    }

    /// Strip Optional/Nullable/Default wrappers
    pub fn unwrap_modifiers(&self) -> &SchemaNode {
        match self {
            SchemaNode::Optional { inner }
            | SchemaNode::Nullable { inner }
            | SchemaNode::Default { inner, .. } => inner.unwrap_modifiers(),
            other => other,
        }
    }

    /// Contracts referenced anywhere in this tree, as `(name, version)` pairs
    pub fn references(&self) -> BTreeSet<(String, Option<String>)> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut BTreeSet<(String, Option<String>)>) {
        match self {
            SchemaNode::Ref { name, version } => {
                out.insert((name.clone(), version.clone()));
            }
            SchemaNode::Object(o) => {
                for field in &o.fields {
                    field.schema.collect_references(out);
                }
            }
            SchemaNode::Array(a) => a.items.collect_references(out),
            SchemaNode::Union { options } => {
                for option in options {
                    option.collect_references(out);
                }
            }
            SchemaNode::Intersection { left, right } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            SchemaNode::Optional { inner }
            | SchemaNode::Nullable { inner }
            | SchemaNode::Default { inner, .. } => inner.collect_references(out),
            SchemaNode::Record { values } => values.collect_references(out),
            SchemaNode::String(_)
            | SchemaNode::Number(_)
            | SchemaNode::Boolean
            | SchemaNode::Date
            | SchemaNode::Enum { .. }
            | SchemaNode::NativeEnum { .. }
            | SchemaNode::Literal { .. }
            | SchemaNode::Any
            | SchemaNode::Unknown
            | SchemaNode::Unsupported => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tag_serialization() {
        let node = SchemaNode::object([
            ("title", SchemaNode::string().min_length(1)),
            ("done", SchemaNode::boolean().with_default(false)),
        ]);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["kind"], "object");
        assert_eq!(value["fields"][0]["schema"]["kind"], "string");
        assert_eq!(value["fields"][0]["schema"]["min_length"], 1);
        assert_eq!(value["fields"][1]["schema"]["inner"]["kind"], "boolean");

        let back: SchemaNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_unrecognized_kind_is_unsupported() {
        let node: SchemaNode = serde_json::from_value(json!({ "kind": "bigint" })).unwrap();
        assert_eq!(node, SchemaNode::Unsupported);

        let nested: SchemaNode = serde_json::from_value(json!({
            "kind": "array",
            "items": { "kind": "promise" }
        }))
        .unwrap();
        assert_eq!(nested, SchemaNode::array(SchemaNode::Unsupported));
    }

    #[test]
    fn test_refinements_ignore_other_kinds() {
        assert_eq!(SchemaNode::boolean().min_length(3), SchemaNode::Boolean);
        assert_eq!(SchemaNode::string().positive(), SchemaNode::string());
    }

    #[test]
    fn test_references_collects_nested_refs() {
        let node = SchemaNode::object([
            ("owner", SchemaNode::reference("User", Some("1.0.0"))),
            ("tags", SchemaNode::array(SchemaNode::reference("Tag", None)).optional()),
        ]);
        let refs: Vec<_> = node.references().into_iter().collect();
        assert_eq!(
            refs,
            vec![
                ("Tag".to_string(), None),
                ("User".to_string(), Some("1.0.0".to_string())),
            ]
        );
    }

    #[test]
    fn test_unwrap_modifiers() {
        let node = SchemaNode::string().nullable().optional();
        assert_eq!(node.unwrap_modifiers(), &SchemaNode::string());
        assert!(node.is_optional());
        assert!(!SchemaNode::string().nullable().is_optional());
    }
}
