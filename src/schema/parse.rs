//! Validation and coercion of JSON values against schema trees

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{ArraySchema, NumberConstraints, ObjectSchema, SchemaNode, StringConstraints, StringFormat, UnknownKeys};

/// Maximum number of `Ref` hops followed while parsing one value
const MAX_REF_DEPTH: usize = 32;

/// Looks up the schema of a referenced contract
pub trait ContractResolver {
    /// Resolve `name` at `version`, or at the latest version when `None`
    fn resolve(&self, name: &str, version: Option<&str>) -> Option<&SchemaNode>;
}

/// Resolver that knows no contracts; every `Ref` is an issue
pub struct NoResolver;

impl ContractResolver for NoResolver {
    fn resolve(&self, _name: &str, _version: Option<&str>) -> Option<&SchemaNode> {
        None
    }
}

/// A single problem found while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending value (empty for the root)
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Parsing failed with one or more issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

impl std::error::Error for ParseFailure {}

impl SchemaNode {
    /// Validate `value`, returning the coerced output.
    ///
    /// `Ref` nodes cannot be resolved; use [`SchemaNode::parse_with`] for
    /// trees that reference other contracts.
    pub fn parse(&self, value: &Value) -> Result<Value, ParseFailure> {
        self.parse_with(value, &NoResolver)
    }

    /// Validate `value`, resolving `Ref` nodes through `resolver`
    pub fn parse_with(&self, value: &Value, resolver: &dyn ContractResolver) -> Result<Value, ParseFailure> {
        let mut parser = Parser::new(resolver, Vec::new());
        let output = parser.parse(self, Some(value));
        if parser.issues.is_empty() {
            Ok(output.unwrap_or(Value::Null))
        } else {
            Err(ParseFailure { issues: parser.issues })
        }
    }
}

struct Parser<'r> {
    resolver: &'r dyn ContractResolver,
    path: Vec<String>,
    issues: Vec<ValidationIssue>,
    ref_depth: usize,
}

impl<'r> Parser<'r> {
    fn new(resolver: &'r dyn ContractResolver, path: Vec<String>) -> Self {
        Self {
            resolver,
            path,
            issues: Vec::new(),
            ref_depth: 0,
        }
    }

    fn issue(&mut self, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: self.path.join("."),
            message: message.into(),
        });
    }

    fn type_mismatch(&mut self, expected: &str, value: &Value) {
        self.issue(format!("Expected {}, received {}", expected, json_type(value)));
    }

    /// Parse an optional value. `None` means the value is absent, which is
    /// different from an explicit `null`.
    fn parse(&mut self, node: &SchemaNode, value: Option<&Value>) -> Option<Value> {
        let value = match value {
            Some(v) => v,
            None => return self.parse_absent(node),
        };

        match node {
            SchemaNode::String(c) => self.parse_string(c, value),
            SchemaNode::Number(c) => self.parse_number(c, value),
            SchemaNode::Boolean => {
                if !value.is_boolean() {
                    self.type_mismatch("boolean", value);
                }
                Some(value.clone())
            }
            SchemaNode::Date => self.parse_date(value),
            SchemaNode::Object(o) => self.parse_object(o, value),
            SchemaNode::Array(a) => self.parse_array(a, value),
            SchemaNode::Enum { values } => {
                match value.as_str() {
                    Some(s) if values.iter().any(|v| v == s) => {}
                    _ => {
                        let expected: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
                        self.issue(format!(
                            "Invalid enum value. Expected {}, received {}",
                            expected.join(" | "),
                            value
                        ));
                    }
                }
                Some(value.clone())
            }
            SchemaNode::NativeEnum { members } => {
                if !members.iter().any(|m| m.value == *value) {
                    self.issue(format!("Invalid enum value {}", value));
                }
                Some(value.clone())
            }
            SchemaNode::Union { options } => self.parse_union(options, value),
            SchemaNode::Intersection { left, right } => {
                let l = self.parse(left, Some(value));
                let r = self.parse(right, Some(value));
                match (l, r) {
                    (Some(Value::Object(mut a)), Some(Value::Object(b))) => {
                        a.extend(b);
                        Some(Value::Object(a))
                    }
                    (Some(a), Some(b)) if a == b => Some(a),
                    (Some(_), Some(_)) => {
                        self.issue("Intersection results could not be merged");
                        None
                    }
                    _ => None,
                }
            }
            SchemaNode::Optional { inner } => self.parse(inner, Some(value)),
            SchemaNode::Nullable { inner } => {
                if value.is_null() {
                    Some(Value::Null)
                } else {
                    self.parse(inner, Some(value))
                }
            }
            SchemaNode::Default { inner, .. } => self.parse(inner, Some(value)),
            SchemaNode::Literal { value: expected } => {
                if value != expected {
                    self.issue(format!("Invalid literal value, expected {}", expected));
                }
                Some(value.clone())
            }
            SchemaNode::Record { values } => {
                let Some(map) = value.as_object() else {
                    self.type_mismatch("object", value);
                    return None;
                };
                let mut out = Map::new();
                for (key, item) in map {
                    self.path.push(key.clone());
                    if let Some(parsed) = self.parse(values, Some(item)) {
                        out.insert(key.clone(), parsed);
                    }
                    self.path.pop();
                }
                Some(Value::Object(out))
            }
            SchemaNode::Any | SchemaNode::Unknown | SchemaNode::Unsupported => Some(value.clone()),
            SchemaNode::Ref { name, version } => self.parse_ref(name, version.as_deref(), Some(value)),
        }
    }

    fn parse_absent(&mut self, node: &SchemaNode) -> Option<Value> {
        match node {
            SchemaNode::Optional { .. } | SchemaNode::Any | SchemaNode::Unknown => None,
            SchemaNode::Default { inner, value } => self.parse(inner, Some(value)),
            SchemaNode::Ref { name, version } => self.parse_ref(name, version.as_deref(), None),
            _ => {
                self.issue("Required");
                None
            }
        }
    }

    fn parse_ref(&mut self, name: &str, version: Option<&str>, value: Option<&Value>) -> Option<Value> {
        if self.ref_depth >= MAX_REF_DEPTH {
            self.issue(format!("Reference depth exceeded while resolving '{}'", name));
            return None;
        }
        let resolver = self.resolver;
        let Some(target) = resolver.resolve(name, version) else {
            self.issue(format!(
                "Unresolved contract reference '{}'{}",
                name,
                version.map(|v| format!(" version {}", v)).unwrap_or_default()
            ));
            return None;
        };
        self.ref_depth += 1;
        let out = self.parse(target, value);
        self.ref_depth -= 1;
        out
    }

    fn parse_string(&mut self, c: &StringConstraints, value: &Value) -> Option<Value> {
        let Some(s) = value.as_str() else {
            self.type_mismatch("string", value);
            return None;
        };
        let len = s.chars().count();

        if let Some(min) = c.min_length {
            if len < min {
                self.issue(format!("String must contain at least {} character(s)", min));
            }
        }
        if let Some(max) = c.max_length {
            if len > max {
                self.issue(format!("String must contain at most {} character(s)", max));
            }
        }
        if let Some(exact) = c.length {
            if len != exact {
                self.issue(format!("String must contain exactly {} character(s)", exact));
            }
        }
        if let Some(format) = c.format {
            if !matches_format(format, s) {
                self.issue(format!("Invalid {}", format.openapi_format()));
            }
        }
        if let Some(pattern) = &c.pattern {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => self.issue(format!("String does not match pattern {}", pattern)),
                Err(e) => self.issue(format!("Invalid pattern {}: {}", pattern, e)),
            }
        }
        Some(value.clone())
    }

    fn parse_number(&mut self, c: &NumberConstraints, value: &Value) -> Option<Value> {
        let Some(n) = value.as_f64() else {
            self.type_mismatch("number", value);
            return None;
        };

        if c.integer && n.fract() != 0.0 {
            self.issue("Expected integer, received float");
        }
        if let Some(min) = c.minimum {
            if (c.exclusive_minimum && n <= min) || n < min {
                let op = if c.exclusive_minimum { "greater than" } else { "greater than or equal to" };
                self.issue(format!("Number must be {} {}", op, min));
            }
        }
        if let Some(max) = c.maximum {
            if (c.exclusive_maximum && n >= max) || n > max {
                let op = if c.exclusive_maximum { "less than" } else { "less than or equal to" };
                self.issue(format!("Number must be {} {}", op, max));
            }
        }
        if let Some(step) = c.multiple_of {
            if step != 0.0 && ((n / step).round() * step - n).abs() > 1e-9 {
                self.issue(format!("Number must be a multiple of {}", step));
            }
        }
        Some(value.clone())
    }

    fn parse_date(&mut self, value: &Value) -> Option<Value> {
        let Some(s) = value.as_str() else {
            self.type_mismatch("date string", value);
            return None;
        };
        match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Some(Value::String(
                dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            Err(_) => {
                self.issue("Invalid date");
                None
            }
        }
    }

    fn parse_object(&mut self, o: &ObjectSchema, value: &Value) -> Option<Value> {
        let Some(map) = value.as_object() else {
            self.type_mismatch("object", value);
            return None;
        };

        let mut out = Map::new();
        for field in &o.fields {
            self.path.push(field.name.clone());
            if let Some(parsed) = self.parse(&field.schema, map.get(&field.name)) {
                out.insert(field.name.clone(), parsed);
            }
            self.path.pop();
        }

        let unknown: Vec<&String> = map.keys().filter(|k| o.field(k).is_none()).collect();
        match o.unknown_keys {
            UnknownKeys::Strip => {}
            UnknownKeys::Strict => {
                if !unknown.is_empty() {
                    let keys: Vec<String> = unknown.iter().map(|k| format!("'{}'", k)).collect();
                    self.issue(format!("Unrecognized key(s) in object: {}", keys.join(", ")));
                }
            }
            UnknownKeys::Passthrough => {
                for key in unknown {
                    out.insert(key.clone(), map[key].clone());
                }
            }
        }
        Some(Value::Object(out))
    }

    fn parse_array(&mut self, a: &ArraySchema, value: &Value) -> Option<Value> {
        let Some(items) = value.as_array() else {
            self.type_mismatch("array", value);
            return None;
        };
        if let Some(min) = a.min_items {
            if items.len() < min {
                self.issue(format!("Array must contain at least {} element(s)", min));
            }
        }
        if let Some(max) = a.max_items {
            if items.len() > max {
                self.issue(format!("Array must contain at most {} element(s)", max));
            }
        }

        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            self.path.push(index.to_string());
            if let Some(parsed) = self.parse(&a.items, Some(item)) {
                out.push(parsed);
            }
            self.path.pop();
        }
        Some(Value::Array(out))
    }

    fn parse_union(&mut self, options: &[SchemaNode], value: &Value) -> Option<Value> {
        let mut rejected = Vec::new();
        for (index, option) in options.iter().enumerate() {
            let mut attempt = Parser::new(self.resolver, self.path.clone());
            attempt.ref_depth = self.ref_depth;
            let out = attempt.parse(option, Some(value));
            if attempt.issues.is_empty() {
                return out;
            }
            rejected.extend(attempt.issues.into_iter().map(|issue| ValidationIssue {
                path: issue.path,
                message: format!("Union member {}: {}", index + 1, issue.message),
            }));
        }
        self.issue(format!(
            "Invalid input: {} does not match any of {} union member(s)",
            json_type(value),
            options.len()
        ));
        self.issues.extend(rejected);
        None
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_format(format: StringFormat, s: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    static URL: OnceLock<Regex> = OnceLock::new();
    static UUID: OnceLock<Regex> = OnceLock::new();

    match format {
        StringFormat::Email => EMAIL
            .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
            .is_match(s),
        StringFormat::Url => URL
            .get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/?#]+[^\s]*$").expect("valid url regex"))
            .is_match(s),
        StringFormat::Uuid => UUID
            .get_or_init(|| {
                Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
                    .expect("valid uuid regex")
            })
            .is_match(s),
        StringFormat::Datetime => DateTime::parse_from_rfc3339(s).is_ok(),
    }
}
