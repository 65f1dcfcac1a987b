//! TypeScript Generator
//!
//! Emits TypeScript declarations for registered contracts:
//!
//! - a declaration (`interface`, `type`, or `namespace`) per contract
//! - `import type` lines for contracts referenced through `Ref` nodes
//! - an optional fetch-based client class
//!
//! Output is cached per `(name, version, options)`. The cache is a shared
//! handle so the dev middleware can drop entries when contract files change.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::config::{ClientOperation, ClientResponse, ExportType, NamingConfig, OutputFormat, TypeGenOptions};
use super::names::{property_key, resource_path, to_kebab_case, to_pascal_case};
use crate::contract::Contract;
use crate::registry::ContractRegistry;
use crate::schema::SchemaNode;

const INDENT: &str = "  ";

// =============================================================================
// Output
// =============================================================================

/// Generated declarations for one contract version
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTypes {
    /// Declaration source, including any default-export statement
    pub types: String,
    /// `import type` lines for referenced contracts
    pub imports: Vec<String>,
    /// Exported identifiers (`default` for a default export)
    pub exports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_code: Option<String>,
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub contract_name: String,
    pub version: String,
    pub type_name: String,
    pub hash: String,
    pub generated_at: DateTime<Utc>,
    /// Contracts this one references, by name
    pub dependencies: Vec<String>,
    /// Fallbacks taken while generating
    pub warnings: Vec<String>,
}

// =============================================================================
// Cache
// =============================================================================

/// Shared cache of generated declarations keyed by `name@version#options`
#[derive(Debug, Clone, Default)]
pub struct TypeCache {
    entries: Arc<RwLock<HashMap<String, GeneratedTypes>>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(name: &str, version: &str, options: &TypeGenOptions) -> String {
        format!("{}@{}#{}", name, version, options.cache_fingerprint())
    }

    pub fn get(&self, key: &str) -> Option<GeneratedTypes> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: String, types: GeneratedTypes) {
        self.entries.write().insert(key, types);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drop entries whose contract name overlaps `fragment` (case-insensitive,
    /// either direction). Returns the number removed.
    pub fn invalidate_overlapping(&self, fragment: &str) -> usize {
        let fragment = fragment.to_lowercase();
        if fragment.is_empty() {
            return 0;
        }
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| {
            let name = key.split('@').next().unwrap_or(key).to_lowercase();
            !(name.contains(&fragment) || fragment.contains(&name))
        });
        before - entries.len()
    }
}

// =============================================================================
// Schema Rendering
// =============================================================================

/// Render a schema tree as a TypeScript type expression
pub fn schema_to_typescript(node: &SchemaNode) -> String {
    let naming = NamingConfig::default();
    TsEmitter::new(&naming, false).render(node, 0)
}

struct TsEmitter<'a> {
    naming: &'a NamingConfig,
    include_comments: bool,
    warnings: Vec<String>,
}

impl<'a> TsEmitter<'a> {
    fn new(naming: &'a NamingConfig, include_comments: bool) -> Self {
        Self {
            naming,
            include_comments,
            warnings: Vec::new(),
        }
    }

    fn render(&mut self, node: &SchemaNode, depth: usize) -> String {
        match node {
            SchemaNode::String(_) | SchemaNode::Date => "string".to_string(),
            SchemaNode::Number(_) => "number".to_string(),
            SchemaNode::Boolean => "boolean".to_string(),
            SchemaNode::Object(object) => {
                let pad = INDENT.repeat(depth + 1);
                let mut out = String::from("{\n");
                for field in &object.fields {
                    if self.include_comments {
                        if let Some(description) = &field.description {
                            out.push_str(&format!("{}/** {} */\n", pad, description));
                        }
                    }
                    let schema = match &field.schema {
                        SchemaNode::Optional { inner } => inner.as_ref(),
                        other => other,
                    };
                    let marker = if field.schema.is_optional() { "?" } else { "" };
                    let ty = self.render(schema, depth + 1);
                    out.push_str(&format!("{}{}{}: {};\n", pad, property_key(&field.name), marker, ty));
                }
                if object.unknown_keys == crate::schema::UnknownKeys::Passthrough {
                    out.push_str(&format!("{}[key: string]: unknown;\n", pad));
                }
                out.push_str(&INDENT.repeat(depth));
                out.push('}');
                out
            }
            SchemaNode::Array(array) => {
                let inner = self.render(&array.items, depth);
                if renders_bare_union(&array.items) {
                    format!("Array<{}>", inner)
                } else {
                    format!("{}[]", inner)
                }
            }
            SchemaNode::Enum { values } => literal_union(values.iter().map(|v| serde_json::Value::String(v.clone()))),
            SchemaNode::NativeEnum { members } => literal_union(members.iter().map(|m| m.value.clone())),
            SchemaNode::Union { options } => {
                if options.is_empty() {
                    return "never".to_string();
                }
                let parts: Vec<String> = options.iter().map(|o| self.render(o, depth)).collect();
                format!("({})", parts.join(" | "))
            }
            SchemaNode::Intersection { left, right } => {
                let left = self.render_operand(left, depth);
                let right = self.render_operand(right, depth);
                format!("({} & {})", left, right)
            }
            SchemaNode::Optional { inner } => format!("{} | undefined", self.render(inner, depth)),
            SchemaNode::Nullable { inner } => format!("{} | null", self.render(inner, depth)),
            SchemaNode::Default { inner, .. } => self.render(inner, depth),
            SchemaNode::Literal { value } => value.to_string(),
            SchemaNode::Record { values } => format!("Record<string, {}>", self.render(values, depth)),
            SchemaNode::Any => "any".to_string(),
            SchemaNode::Unknown => "unknown".to_string(),
            SchemaNode::Ref { name, .. } => to_pascal_case(name, self.naming),
            SchemaNode::Unsupported => {
                tracing::warn!("unsupported schema node kind; emitting unknown");
                self.warnings
                    .push("Unsupported schema node rendered as unknown".to_string());
                "unknown".to_string()
            }
        }
    }

    fn render_operand(&mut self, node: &SchemaNode, depth: usize) -> String {
        let ty = self.render(node, depth);
        if renders_bare_union(node) {
            format!("({})", ty)
        } else {
            ty
        }
    }
}

/// Nodes whose rendering is an unparenthesized union
fn renders_bare_union(node: &SchemaNode) -> bool {
    match node {
        SchemaNode::Optional { .. }
        | SchemaNode::Nullable { .. }
        | SchemaNode::Enum { .. }
        | SchemaNode::NativeEnum { .. } => true,
        SchemaNode::Default { inner, .. } => renders_bare_union(inner),
        _ => false,
    }
}

fn literal_union(values: impl Iterator<Item = serde_json::Value>) -> String {
    let parts: Vec<String> = values.map(|v| v.to_string()).collect();
    if parts.is_empty() {
        "never".to_string()
    } else {
        parts.join(" | ")
    }
}

fn indent_block(text: &str, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    text.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("{}{}", pad, line) })
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Generator
// =============================================================================

/// Generates TypeScript for contracts in a registry
#[derive(Debug, Clone, Default)]
pub struct TypeGenerator {
    cache: TypeCache,
}

impl TypeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator backed by an existing (possibly shared) cache
    pub fn with_cache(cache: TypeCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Declarations for one contract version; `None` when it is not registered
    pub fn generate_contract_types(
        &self,
        registry: &ContractRegistry,
        name: &str,
        version: &str,
        options: &TypeGenOptions,
    ) -> Option<GeneratedTypes> {
        let contract = registry.get_contract(name, version)?;
        let key = TypeCache::key(contract.name(), &contract.version().version_string(), options);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(contract = name, version, "type cache hit");
            return Some(cached);
        }

        let generated = self.build(registry, contract, options);
        self.cache.insert(key, generated.clone());
        Some(generated)
    }

    /// Declarations for the latest version of every registered contract
    pub fn generate_all_contract_types(
        &self,
        registry: &ContractRegistry,
        options: &TypeGenOptions,
    ) -> BTreeMap<String, GeneratedTypes> {
        registry
            .get_contract_names()
            .into_iter()
            .filter_map(|name| {
                let latest = registry.get_latest_contract(&name)?.version().version_string();
                let generated = self.generate_contract_types(registry, &name, &latest, options)?;
                Some((name, generated))
            })
            .collect()
    }

    /// A complete source file: header, imports, declarations, client
    pub fn generate_typescript_module(
        &self,
        registry: &ContractRegistry,
        name: &str,
        version: &str,
        options: &TypeGenOptions,
    ) -> Option<String> {
        let generated = self.generate_contract_types(registry, name, version, options)?;
        let meta = &generated.metadata;

        let mut out = String::new();
        out.push_str("/**\n");
        out.push_str(&format!(" * Types for contract {} v{}\n", meta.contract_name, meta.version));
        out.push_str(&format!(" * Contract hash: {}\n", meta.hash));
        out.push_str(&format!(" * Generated at: {}\n", meta.generated_at.to_rfc3339()));
        out.push_str(" *\n * Generated from the contract registry - DO NOT EDIT\n */\n\n");

        if !generated.imports.is_empty() {
            out.push_str(&generated.imports.join("\n"));
            out.push_str("\n\n");
        }

        out.push_str(&generated.types);
        out.push('\n');

        if let Some(client) = &generated.client_code {
            out.push('\n');
            out.push_str(client);
            out.push('\n');
        }

        Some(out)
    }

    fn build(&self, registry: &ContractRegistry, contract: &Contract, options: &TypeGenOptions) -> GeneratedTypes {
        let naming = &options.naming;
        let type_name = to_pascal_case(contract.name(), naming);
        let version = contract.version().version_string();
        let mut emitter = TsEmitter::new(naming, options.include_comments);

        let mut format = options.output_format;
        if format == OutputFormat::Interface && !matches!(contract.schema, SchemaNode::Object(_)) {
            tracing::warn!(
                contract = contract.name(),
                kind = contract.schema.kind_name(),
                "interface output requires an object root; emitting a type alias"
            );
            emitter.warnings.push(format!(
                "Root is {}, not object; emitted a type alias instead of an interface",
                contract.schema.kind_name()
            ));
            format = OutputFormat::Type;
        }

        let export = match options.export_type {
            ExportType::Named => "export ",
            ExportType::Default => "",
        };

        let mut types = String::new();
        if options.include_comments {
            types.push_str(&doc_comment(contract));
        }

        match format {
            OutputFormat::Interface => {
                let body = emitter.render(&contract.schema, 0);
                types.push_str(&format!("{}interface {} {}", export, type_name, body));
            }
            OutputFormat::Type => {
                let body = emitter.render(&contract.schema, 0);
                types.push_str(&format!("{}type {} = {};", export, type_name, body));
            }
            OutputFormat::Namespace => {
                let body = emitter.render(&contract.schema, 1);
                types.push_str(&format!(
                    "{}namespace {} {{\n{}export type Schema = {};\n{}export const version = \"{}\";\n}}",
                    export, type_name, INDENT, body, INDENT, version
                ));
            }
        }

        let exports = match options.export_type {
            ExportType::Named => vec![type_name.clone()],
            ExportType::Default => {
                types.push('\n');
                if format == OutputFormat::Namespace {
                    types.push_str(&format!("export default {};", type_name));
                } else {
                    types.push_str(&format!("export type {{ {} as default }};", type_name));
                }
                vec!["default".to_string()]
            }
        };

        let dependencies = self.dependencies(registry, contract);
        let imports = if options.include_imports {
            dependencies
                .iter()
                .map(|dep| {
                    format!(
                        "import type {{ {} }} from './{}';",
                        to_pascal_case(dep, naming),
                        to_kebab_case(dep)
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        let type_ref = match format {
            OutputFormat::Namespace => format!("{}.Schema", type_name),
            _ => type_name.clone(),
        };
        let client_code = options
            .client_api_generation
            .then(|| generate_client(contract, &type_name, &type_ref, options));

        let mut exports = exports;
        if client_code.is_some() {
            exports.push(format!("{}Client", type_name));
        }

        GeneratedTypes {
            types,
            imports,
            exports,
            client_code,
            metadata: GenerationMetadata {
                contract_name: contract.name().to_string(),
                version,
                type_name,
                hash: contract.hash.as_str().to_string(),
                generated_at: Utc::now(),
                dependencies,
                warnings: emitter.warnings,
            },
        }
    }

    /// Names of other contracts referenced from this one
    fn dependencies(&self, registry: &ContractRegistry, contract: &Contract) -> Vec<String> {
        let mut deps: Vec<String> = contract
            .schema
            .references()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name != contract.name())
            .collect();
        deps.dedup();
        for dep in &deps {
            if registry.get_latest_contract(dep).is_none() {
                tracing::warn!(contract = contract.name(), dependency = %dep, "referenced contract is not registered");
            }
        }
        deps
    }
}

fn doc_comment(contract: &Contract) -> String {
    let mut out = String::from("/**\n");
    match &contract.metadata.description {
        Some(description) => out.push_str(&format!(" * {}\n", description)),
        None => out.push_str(&format!(" * Contract {}\n", contract.name())),
    }
    out.push_str(&format!(" * @version {}\n", contract.version()));
    if contract.is_deprecated() {
        match contract.metadata.deprecation_date {
            Some(date) => out.push_str(&format!(" * @deprecated since {}\n", date.format("%Y-%m-%d"))),
            None => out.push_str(" * @deprecated\n"),
        }
    }
    out.push_str(" */\n");
    out
}

// =============================================================================
// Client
// =============================================================================

fn generate_client(contract: &Contract, type_name: &str, type_ref: &str, options: &TypeGenOptions) -> String {
    let operations = options
        .operations
        .clone()
        .unwrap_or_else(|| ClientOperation::crud(&resource_path(contract.name())));

    let mut out = String::new();
    out.push_str(&format!("export class {}Client {{\n", type_name));
    out.push_str(&format!(
        "  constructor(private readonly baseUrl: string = {}) {{}}\n\n",
        serde_json::Value::String(options.base_url.clone())
    ));
    out.push_str(&indent_block(REQUEST_HELPER, 1));
    out.push('\n');

    for op in &operations {
        out.push('\n');
        out.push_str(&indent_block(&client_method(op, type_ref), 1));
        out.push('\n');
    }
    out.push('}');
    out
}

const REQUEST_HELPER: &str = r#"private async request<T>(method: string, path: string, body?: unknown): Promise<T> {
  const response = await fetch(`${this.baseUrl}${path}`, {
    method,
    headers: { 'Content-Type': 'application/json' },
    body: body === undefined ? undefined : JSON.stringify(body),
  });
  if (!response.ok) {
    throw new Error(`${method} ${path} failed with status ${response.status}`);
  }
  if (response.status === 204) {
    return undefined as T;
  }
  return (await response.json()) as T;
}"#;

fn client_method(op: &ClientOperation, type_ref: &str) -> String {
    let mut args: Vec<String> = op
        .path_params()
        .iter()
        .map(|p| format!("{}: string | number", p))
        .collect();
    if op.body {
        args.push(format!("body: {}", type_ref));
    }

    let returns = match op.response {
        ClientResponse::One => type_ref.to_string(),
        ClientResponse::Many => format!("{}[]", type_ref),
        ClientResponse::Nothing => "void".to_string(),
    };

    let mut path = String::new();
    for (i, segment) in op.path.split('/').enumerate() {
        if i > 0 {
            path.push('/');
        }
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(param) => path.push_str(&format!("${{encodeURIComponent(String({}))}}", param)),
            None => path.push_str(segment),
        }
    }

    let body_arg = if op.body { ", body" } else { "" };
    format!(
        "async {}({}): Promise<{}> {{\n  return this.request<{}>('{}', `{}`{});\n}}",
        op.name,
        args.join(", "),
        returns,
        returns,
        op.method,
        path,
        body_arg
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::HttpMethod;
    use crate::contract::MetadataOverrides;

    fn registry() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry.register_contract(
            "Task",
            "1.0.0",
            SchemaNode::object([
                ("title", SchemaNode::string()),
                ("notes", SchemaNode::string().optional()),
                ("due-date", SchemaNode::date().nullable()),
                ("tags", SchemaNode::array(SchemaNode::enumeration(["home", "work"]))),
            ]),
            MetadataOverrides::described("A unit of work"),
        );
        registry
    }

    #[test]
    fn test_interface_output() {
        let registry = registry();
        let generated = TypeGenerator::new()
            .generate_contract_types(&registry, "Task", "1.0.0", &TypeGenOptions::default())
            .expect("registered");

        assert!(generated.types.contains("/**\n * A unit of work\n * @version 1.0.0\n */"));
        assert!(generated.types.contains("export interface Task {"));
        assert!(generated.types.contains("  title: string;"));
        assert!(generated.types.contains("  notes?: string;"));
        assert!(generated.types.contains("  \"due-date\": string | null;"));
        assert!(generated.types.contains("  tags: Array<\"home\" | \"work\">;"));
        assert_eq!(generated.exports, vec!["Task".to_string()]);
    }

    #[test]
    fn test_interface_falls_back_for_non_object_root() {
        let mut registry = ContractRegistry::new();
        registry.register_contract(
            "Status",
            "1.0.0",
            SchemaNode::enumeration(["open", "closed"]),
            MetadataOverrides::default(),
        );
        let options = TypeGenOptions {
            include_comments: false,
            ..TypeGenOptions::default()
        };
        let generated = TypeGenerator::new()
            .generate_contract_types(&registry, "Status", "1.0.0", &options)
            .expect("registered");
        assert_eq!(generated.types, "export type Status = \"open\" | \"closed\";");
        assert_eq!(generated.metadata.warnings.len(), 1);
    }

    #[test]
    fn test_namespace_and_default_export() {
        let registry = registry();
        let options = TypeGenOptions {
            include_comments: false,
            export_type: ExportType::Default,
            output_format: OutputFormat::Namespace,
            ..TypeGenOptions::default()
        };
        let generated = TypeGenerator::new()
            .generate_contract_types(&registry, "Task", "1.0.0", &options)
            .expect("registered");
        assert!(generated.types.starts_with("namespace Task {\n  export type Schema = {"));
        assert!(generated.types.contains("export const version = \"1.0.0\";"));
        assert!(generated.types.ends_with("export default Task;"));
        assert_eq!(generated.exports, vec!["default".to_string()]);
    }

    #[test]
    fn test_missing_contract_is_none() {
        let registry = registry();
        let generated = TypeGenerator::new().generate_contract_types(
            &registry,
            "Task",
            "9.9.9",
            &TypeGenOptions::default(),
        );
        assert!(generated.is_none());
    }

    #[test]
    fn test_cache_hits_and_invalidation() {
        let registry = registry();
        let generator = TypeGenerator::new();
        let options = TypeGenOptions::default();

        let first = generator
            .generate_contract_types(&registry, "Task", "1.0.0", &options)
            .expect("registered");
        let second = generator
            .generate_contract_types(&registry, "Task", "1.0.0", &options)
            .expect("registered");
        assert_eq!(first.metadata.generated_at, second.metadata.generated_at);
        assert_eq!(generator.cache().len(), 1);

        let other = TypeGenOptions {
            include_imports: false,
            ..TypeGenOptions::default()
        };
        generator.generate_contract_types(&registry, "Task", "1.0.0", &other);
        assert_eq!(generator.cache().len(), 2);

        assert_eq!(generator.cache().invalidate_overlapping("widget"), 0);
        assert_eq!(generator.cache().invalidate_overlapping("task"), 2);
        assert!(generator.cache().is_empty());
    }

    #[test]
    fn test_dependencies_become_imports() {
        let mut registry = registry();
        registry.register_contract(
            "TaskList",
            "1.0.0",
            SchemaNode::object([("items", SchemaNode::array(SchemaNode::reference("Task", None)))]),
            MetadataOverrides::default(),
        );
        let generated = TypeGenerator::new()
            .generate_contract_types(&registry, "TaskList", "1.0.0", &TypeGenOptions::default())
            .expect("registered");
        assert_eq!(generated.metadata.dependencies, vec!["Task".to_string()]);
        assert_eq!(generated.imports, vec!["import type { Task } from './task';".to_string()]);
        assert!(generated.types.contains("items: Task[];"));
    }

    #[test]
    fn test_client_generation() {
        let registry = registry();
        let options = TypeGenOptions {
            client_api_generation: true,
            ..TypeGenOptions::default()
        };
        let module = TypeGenerator::new()
            .generate_typescript_module(&registry, "Task", "1.0.0", &options)
            .expect("registered");

        assert!(module.contains("Types for contract Task v1.0.0"));
        assert!(module.contains("export class TaskClient {"));
        assert!(module.contains("constructor(private readonly baseUrl: string = \"/api\") {}"));
        assert!(module.contains("await fetch(`${this.baseUrl}${path}`"));
        assert!(module.contains("async list(): Promise<Task[]> {"));
        assert!(module.contains("async update(id: string | number, body: Task): Promise<Task> {"));
        assert!(module.contains("this.request<Task>('GET', `/tasks/${encodeURIComponent(String(id))}`);"));
    }

    #[test]
    fn test_custom_operations() {
        let registry = registry();
        let options = TypeGenOptions {
            client_api_generation: true,
            operations: Some(vec![ClientOperation::new(
                "complete",
                HttpMethod::Post,
                "/tasks/{id}/complete",
                false,
                ClientResponse::Nothing,
            )]),
            ..TypeGenOptions::default()
        };
        let generated = TypeGenerator::new()
            .generate_contract_types(&registry, "Task", "1.0.0", &options)
            .expect("registered");
        let client = generated.client_code.expect("client");
        assert!(client.contains("async complete(id: string | number): Promise<void> {"));
        assert!(!client.contains("async list("));
    }

    #[test]
    fn test_unsupported_renders_unknown() {
        assert_eq!(schema_to_typescript(&SchemaNode::Unsupported), "unknown");
        assert_eq!(
            schema_to_typescript(&SchemaNode::record(SchemaNode::number().nullable())),
            "Record<string, number | null>"
        );
    }

    #[test]
    fn test_intersection_groups_union_operands() {
        let node = SchemaNode::intersection(
            SchemaNode::object([("a", SchemaNode::string())]).nullable(),
            SchemaNode::enumeration(["x", "y"]),
        );
        assert_eq!(
            schema_to_typescript(&node),
            "(({\n  a: string;\n} | null) & (\"x\" | \"y\"))"
        );

        let plain = SchemaNode::intersection(SchemaNode::string(), SchemaNode::union(vec![SchemaNode::number()]));
        assert_eq!(schema_to_typescript(&plain), "(string & (number))");
    }
}
