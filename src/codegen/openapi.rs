//! OpenAPI Generator
//!
//! Converts schema trees to OpenAPI 3.0 schema objects and assembles full
//! documents from endpoint metadata. Every contract referenced by an endpoint
//! is converted once and stored in `components.schemas` under
//! `{name}_{version}`; operations point at it with `$ref`.
//!
//! A reference that cannot be resolved is logged and skipped. The endpoint
//! is still emitted, just without that schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::names::{component_key, to_pascal_case};
use super::{HttpMethod, NamingConfig};
use crate::contract::Contract;
use crate::error::Result;
use crate::registry::ContractRegistry;
use crate::schema::{NativeEnumMember, SchemaNode, UnknownKeys};

/// OpenAPI version emitted
pub const OPENAPI_VERSION: &str = "3.0.0";

/// Component that documents the gateway's 400 response body
pub const VALIDATION_ERROR_COMPONENT: &str = "ContractValidationError";

// =============================================================================
// Endpoint Metadata
// =============================================================================

/// Reference to a registered contract; the latest version when unpinned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ContractRef {
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn pinned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

/// Where a parameter lives in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// A contract describing one group of request parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterContract {
    pub location: ParameterLocation,
    pub contract: ContractRef,
}

/// Description of one HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDefinition {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub request_body_contract: Option<ContractRef>,
    #[serde(default)]
    pub response_contract: Option<ContractRef>,
    #[serde(default)]
    pub parameter_contracts: Vec<ParameterContract>,
    /// Security requirement objects, e.g. `{"bearerAuth": []}`
    #[serde(default)]
    pub security: Vec<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub operation_id: Option<String>,
}

impl EndpointDefinition {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            summary: None,
            description: None,
            tags: Vec::new(),
            request_body_contract: None,
            response_contract: None,
            parameter_contracts: Vec::new(),
            security: Vec::new(),
            operation_id: None,
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn request_body(mut self, contract: ContractRef) -> Self {
        self.request_body_contract = Some(contract);
        self
    }

    pub fn response(mut self, contract: ContractRef) -> Self {
        self.response_contract = Some(contract);
        self
    }

    pub fn parameters(mut self, location: ParameterLocation, contract: ContractRef) -> Self {
        self.parameter_contracts.push(ParameterContract { location, contract });
        self
    }

    /// Explicit operation id, or one derived from method and path
    /// (`GET /tasks/{id}` -> `getTasksById`)
    pub fn resolved_operation_id(&self) -> String {
        if let Some(id) = &self.operation_id {
            return id.clone();
        }
        let naming = NamingConfig::default();
        let mut id = self.method.as_key().to_string();
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(param) => {
                    id.push_str("By");
                    id.push_str(&to_pascal_case(param, &naming));
                }
                None => id.push_str(&to_pascal_case(segment, &naming)),
            }
        }
        id
    }
}

/// Document-level information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecInfo {
    pub title: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
}

impl SpecInfo {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Document Model
// =============================================================================

/// An OpenAPI 3.0 document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiSpec {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerInfo>,
    /// path -> method -> operation
    pub paths: BTreeMap<String, BTreeMap<String, Operation>>,
    pub components: Components,
}

impl OpenApiSpec {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Operation registered at `path` for `method`
    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&Operation> {
        self.paths.get(path)?.get(method.as_key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub schemas: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Value,
}

fn json_content(schema: Value) -> BTreeMap<String, MediaType> {
    BTreeMap::from([("application/json".to_string(), MediaType { schema })])
}

fn component_pointer(key: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", key) })
}

// =============================================================================
// Schema Conversion
// =============================================================================

/// Convert a schema tree to an OpenAPI schema object.
///
/// `Ref` nodes have no registry to resolve against here and become a generic
/// object tagged with `x-contract-ref`.
pub fn schema_to_openapi(node: &SchemaNode) -> Value {
    SchemaConverter::new(None).convert(node)
}

/// Structural conversion with optional component memoization
struct SchemaConverter<'a> {
    registry: Option<&'a ContractRegistry>,
    components: BTreeMap<String, Value>,
}

impl<'a> SchemaConverter<'a> {
    fn new(registry: Option<&'a ContractRegistry>) -> Self {
        Self {
            registry,
            components: BTreeMap::new(),
        }
    }

    /// Convert a contract into `components.schemas` (once) and return a `$ref` to it
    fn component(&mut self, contract: &Contract) -> Value {
        let key = component_key(contract.name(), &contract.version().version_string());
        if !self.components.contains_key(&key) {
            // Placeholder first so self-referencing contracts terminate
            self.components.insert(key.clone(), Value::Null);
            let schema = self.convert(&contract.schema);
            self.components.insert(key.clone(), schema);
        } else {
            tracing::debug!(component = %key, "reusing converted contract schema");
        }
        component_pointer(&key)
    }

    fn convert(&mut self, node: &SchemaNode) -> Value {
        match node {
            SchemaNode::String(c) => {
                let mut s = Map::new();
                s.insert("type".into(), json!("string"));
                if let Some(n) = c.length {
                    s.insert("minLength".into(), json!(n));
                    s.insert("maxLength".into(), json!(n));
                }
                if let Some(n) = c.min_length {
                    s.insert("minLength".into(), json!(n));
                }
                if let Some(n) = c.max_length {
                    s.insert("maxLength".into(), json!(n));
                }
                if let Some(format) = c.format {
                    s.insert("format".into(), json!(format.openapi_format()));
                }
                if let Some(pattern) = &c.pattern {
                    s.insert("pattern".into(), json!(pattern));
                }
                Value::Object(s)
            }
            SchemaNode::Number(c) => {
                let mut s = Map::new();
                s.insert("type".into(), json!(if c.integer { "integer" } else { "number" }));
                if let Some(min) = c.minimum {
                    s.insert("minimum".into(), number(min));
                    if c.exclusive_minimum {
                        s.insert("exclusiveMinimum".into(), json!(true));
                    }
                }
                if let Some(max) = c.maximum {
                    s.insert("maximum".into(), number(max));
                    if c.exclusive_maximum {
                        s.insert("exclusiveMaximum".into(), json!(true));
                    }
                }
                if let Some(step) = c.multiple_of {
                    s.insert("multipleOf".into(), number(step));
                }
                Value::Object(s)
            }
            SchemaNode::Boolean => json!({ "type": "boolean" }),
            SchemaNode::Date => json!({ "type": "string", "format": "date-time" }),
            SchemaNode::Object(o) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in &o.fields {
                    let mut prop = self.convert(&field.schema);
                    if let Some(description) = &field.description {
                        prop = annotate(prop, "description", json!(description));
                    }
                    properties.insert(field.name.clone(), prop);
                    if !field.schema.is_optional() {
                        required.push(json!(field.name));
                    }
                }

                let mut s = Map::new();
                s.insert("type".into(), json!("object"));
                s.insert("properties".into(), Value::Object(properties));
                if !required.is_empty() {
                    s.insert("required".into(), Value::Array(required));
                }
                match o.unknown_keys {
                    UnknownKeys::Strict => {
                        s.insert("additionalProperties".into(), json!(false));
                    }
                    UnknownKeys::Passthrough => {
                        s.insert("additionalProperties".into(), json!(true));
                    }
                    UnknownKeys::Strip => {}
                }
                Value::Object(s)
            }
            SchemaNode::Array(a) => {
                let mut s = Map::new();
                s.insert("type".into(), json!("array"));
                s.insert("items".into(), self.convert(&a.items));
                if let Some(n) = a.min_items {
                    s.insert("minItems".into(), json!(n));
                }
                if let Some(n) = a.max_items {
                    s.insert("maxItems".into(), json!(n));
                }
                Value::Object(s)
            }
            SchemaNode::Enum { values } => json!({ "type": "string", "enum": values }),
            SchemaNode::NativeEnum { members } => native_enum(members),
            SchemaNode::Union { options } => {
                let options: Vec<Value> = options.iter().map(|o| self.convert(o)).collect();
                json!({ "anyOf": options })
            }
            SchemaNode::Intersection { left, right } => {
                let left = self.convert(left);
                let right = self.convert(right);
                json!({ "allOf": [left, right] })
            }
            // Optionality is expressed by the parent's `required` list
            SchemaNode::Optional { inner } => self.convert(inner),
            SchemaNode::Nullable { inner } => {
                let inner = self.convert(inner);
                annotate(inner, "nullable", json!(true))
            }
            SchemaNode::Default { inner, value } => {
                let inner = self.convert(inner);
                annotate(inner, "default", value.clone())
            }
            SchemaNode::Literal { value } => match json_type(value) {
                Some(ty) => json!({ "type": ty, "enum": [value] }),
                None => json!({ "enum": [value] }),
            },
            SchemaNode::Record { values } => {
                let values = self.convert(values);
                json!({ "type": "object", "additionalProperties": values })
            }
            SchemaNode::Any | SchemaNode::Unknown => json!({}),
            SchemaNode::Ref { name, version } => self.convert_ref(name, version.as_deref()),
            SchemaNode::Unsupported => {
                tracing::warn!("unsupported schema node kind; emitting generic object schema");
                json!({ "type": "object" })
            }
        }
    }

    fn convert_ref(&mut self, name: &str, version: Option<&str>) -> Value {
        let resolved = self.registry.and_then(|registry| match version {
            Some(v) => registry.get_contract(name, v),
            None => registry.get_latest_contract(name),
        });
        match resolved {
            Some(contract) => self.component(contract),
            None => {
                tracing::warn!(contract = name, version = version.unwrap_or("latest"), "unresolved contract reference; emitting generic object schema");
                let label = match version {
                    Some(v) => format!("{}@{}", name, v),
                    None => name.to_string(),
                };
                json!({ "type": "object", "x-contract-ref": label })
            }
        }
    }
}

/// Attach a keyword to a schema. `$ref` siblings are ignored by OpenAPI 3.0,
/// so references are wrapped in `allOf` first.
fn annotate(schema: Value, key: &str, value: Value) -> Value {
    match schema {
        Value::Object(mut map) if !map.contains_key("$ref") => {
            map.insert(key.to_string(), value);
            Value::Object(map)
        }
        other => {
            let mut map = Map::new();
            map.insert("allOf".into(), json!([other]));
            map.insert(key.to_string(), value);
            Value::Object(map)
        }
    }
}

fn native_enum(members: &[NativeEnumMember]) -> Value {
    let values: Vec<&Value> = members.iter().map(|m| &m.value).collect();
    let mut s = Map::new();
    if values.iter().all(|v| v.is_string()) {
        s.insert("type".into(), json!("string"));
    } else if values.iter().all(|v| v.is_number()) {
        s.insert("type".into(), json!("number"));
    }
    s.insert("enum".into(), json!(values));
    Value::Object(s)
}

fn json_type(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) => Some("string"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("integer"),
        Value::Number(_) => Some("number"),
        Value::Bool(_) => Some("boolean"),
        _ => None,
    }
}

/// Whole numbers render without a fractional part
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn validation_error_schema() -> Value {
    json!({
        "type": "object",
        "required": ["error", "contract", "location", "message"],
        "properties": {
            "error": { "type": "string", "enum": [VALIDATION_ERROR_COMPONENT] },
            "contract": {
                "type": "object",
                "required": ["name", "version"],
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" }
                }
            },
            "location": { "type": "string", "enum": ["body", "query", "params"] },
            "message": { "type": "string" },
            "issues": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "message": { "type": "string" }
                    }
                }
            }
        }
    })
}

// =============================================================================
// Generator
// =============================================================================

/// Builds OpenAPI documents from contracts in a registry
pub struct OpenApiGenerator<'a> {
    registry: &'a ContractRegistry,
}

impl<'a> OpenApiGenerator<'a> {
    pub fn new(registry: &'a ContractRegistry) -> Self {
        Self { registry }
    }

    /// Assemble a full document for `endpoints`
    pub fn generate_openapi_spec(&self, endpoints: &[EndpointDefinition], info: &SpecInfo) -> OpenApiSpec {
        let mut converter = SchemaConverter::new(Some(self.registry));
        let mut paths: BTreeMap<String, BTreeMap<String, Operation>> = BTreeMap::new();
        let mut uses_validation_error = false;

        for endpoint in endpoints {
            let operation = self.build_operation(endpoint, &mut converter);
            uses_validation_error |= operation.responses.contains_key("400");
            let previous = paths
                .entry(endpoint.path.clone())
                .or_default()
                .insert(endpoint.method.as_key().to_string(), operation);
            if previous.is_some() {
                tracing::warn!(path = %endpoint.path, method = %endpoint.method, "duplicate endpoint; later definition wins");
            }
        }

        let mut schemas = converter.components;
        if uses_validation_error {
            schemas.insert(VALIDATION_ERROR_COMPONENT.to_string(), validation_error_schema());
        }

        tracing::info!(
            endpoints = endpoints.len(),
            components = schemas.len(),
            "generated OpenAPI document"
        );

        OpenApiSpec {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: info.title.clone(),
                version: info.version.clone(),
                description: info.description.clone(),
            },
            servers: info.servers.clone(),
            paths,
            components: Components { schemas },
        }
    }

    /// Standalone schema fragment for one contract version.
    ///
    /// Nested `Ref` nodes become `$ref` pointers into `components.schemas`.
    /// The referenced schemas are carried in the fragment's own
    /// `components.schemas`, so the pointers resolve against the fragment root.
    pub fn generate_contract_schema(&self, name: &str, version: &str) -> Option<Value> {
        let contract = self.registry.get_contract(name, version)?;
        let mut converter = SchemaConverter::new(Some(self.registry));
        let mut schema = converter.convert(&contract.schema);

        schema = annotate(schema, "title", json!(contract.name()));
        if let Some(description) = &contract.metadata.description {
            schema = annotate(schema, "description", json!(description));
        }
        schema = annotate(schema, "x-contract-version", json!(contract.version().version_string()));
        schema = annotate(schema, "x-contract-hash", json!(contract.hash.as_str()));
        if contract.is_deprecated() {
            schema = annotate(schema, "deprecated", json!(true));
        }
        if !converter.components.is_empty() {
            schema = annotate(schema, "components", json!({ "schemas": converter.components }));
        }
        Some(schema)
    }

    fn resolve(&self, reference: &ContractRef) -> Option<&'a Contract> {
        let found = match &reference.version {
            Some(v) => self.registry.get_contract(&reference.name, v),
            None => self.registry.get_latest_contract(&reference.name),
        };
        if found.is_none() {
            tracing::warn!(
                contract = %reference.name,
                version = reference.version.as_deref().unwrap_or("latest"),
                "unresolvable contract reference; omitting schema from endpoint"
            );
        }
        found
    }

    fn build_operation(&self, endpoint: &EndpointDefinition, converter: &mut SchemaConverter<'a>) -> Operation {
        let mut operation = Operation {
            summary: endpoint.summary.clone(),
            description: endpoint.description.clone(),
            operation_id: Some(endpoint.resolved_operation_id()),
            tags: endpoint.tags.clone(),
            security: endpoint.security.clone(),
            ..Operation::default()
        };

        for param in &endpoint.parameter_contracts {
            if let Some(contract) = self.resolve(&param.contract) {
                operation
                    .parameters
                    .extend(self.expand_parameters(contract, param.location, converter));
            }
        }

        if let Some(reference) = &endpoint.request_body_contract {
            if let Some(contract) = self.resolve(reference) {
                operation.request_body = Some(RequestBody {
                    required: true,
                    content: json_content(converter.component(contract)),
                });
            }
        }

        let (status, description) = match endpoint.method {
            HttpMethod::Post => ("201", "Created"),
            _ => ("200", "Successful response"),
        };
        let content = endpoint
            .response_contract
            .as_ref()
            .and_then(|reference| self.resolve(reference))
            .map(|contract| json_content(converter.component(contract)))
            .unwrap_or_default();
        operation.responses.insert(
            status.to_string(),
            Response {
                description: description.to_string(),
                content,
            },
        );

        if endpoint.request_body_contract.is_some() || !endpoint.parameter_contracts.is_empty() {
            operation.responses.insert(
                "400".to_string(),
                Response {
                    description: "Contract validation failed".to_string(),
                    content: json_content(component_pointer(VALIDATION_ERROR_COMPONENT)),
                },
            );
        }

        operation
    }

    /// Object contracts expand to one parameter per field; anything else is a
    /// single parameter named after the contract
    fn expand_parameters(
        &self,
        contract: &Contract,
        location: ParameterLocation,
        converter: &mut SchemaConverter<'a>,
    ) -> Vec<Parameter> {
        let always_required = location == ParameterLocation::Path;

        if let SchemaNode::Object(object) = contract.schema.unwrap_modifiers() {
            return object
                .fields
                .iter()
                .map(|field| Parameter {
                    name: field.name.clone(),
                    location,
                    required: always_required || !field.schema.is_optional(),
                    description: field.description.clone(),
                    schema: converter.convert(&field.schema),
                })
                .collect();
        }

        vec![Parameter {
            name: contract.name().to_string(),
            location,
            required: always_required || !contract.schema.is_optional(),
            description: contract.metadata.description.clone(),
            schema: converter.component(contract),
        }]
    }
}
