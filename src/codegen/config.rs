//! Codegen Configuration
//!
//! - NamingConfig: language-agnostic naming rules shared by both generators
//! - TypeGenOptions: per-call options for TypeScript declaration output
//!
//! Options are part of the generated-types cache key, so every collection
//! here is ordered (BTreeSet, Vec) to keep the serialized key stable.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::HttpMethod;

// =============================================================================
// Naming
// =============================================================================

/// Naming configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Acronyms to preserve (e.g., ID, URL, UUID, API)
    pub acronyms: BTreeSet<String>,

    /// Whether to preserve all-caps words
    pub preserve_screaming_case: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            acronyms: ["ID", "URL", "UUID", "API", "HTTP", "JSON", "XML", "SQL", "URI", "UI", "IO"]
                .iter().map(|s| s.to_string()).collect(),
            preserve_screaming_case: true,
        }
    }
}

// =============================================================================
// TypeScript Options
// =============================================================================

/// How generated declarations are exported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    /// `export default Name;` after the declaration
    Default,
    /// `export` qualifier on the declaration itself
    #[default]
    Named,
}

/// Declaration form for the generated type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `interface Name { ... }`; only legal for object roots
    #[default]
    Interface,
    /// `type Name = ...;`
    Type,
    /// `namespace Name { export type Schema = ...; }`
    Namespace,
}

/// What a client operation returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientResponse {
    One,
    Many,
    Nothing,
}

/// One method on a generated client class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOperation {
    /// Method name on the client class
    pub name: String,
    pub method: HttpMethod,
    /// Path relative to the base URL; `{param}` segments become arguments
    pub path: String,
    /// Whether the operation sends the contract type as its body
    #[serde(default)]
    pub body: bool,
    pub response: ClientResponse,
}

impl ClientOperation {
    pub fn new(name: &str, method: HttpMethod, path: impl Into<String>, body: bool, response: ClientResponse) -> Self {
        Self {
            name: name.to_string(),
            method,
            path: path.into(),
            body,
            response,
        }
    }

    /// Standard list/get/create/update/remove over a resource collection
    pub fn crud(resource_path: &str) -> Vec<Self> {
        let item = format!("{}/{{id}}", resource_path);
        vec![
            Self::new("list", HttpMethod::Get, resource_path, false, ClientResponse::Many),
            Self::new("get", HttpMethod::Get, item.clone(), false, ClientResponse::One),
            Self::new("create", HttpMethod::Post, resource_path, true, ClientResponse::One),
            Self::new("update", HttpMethod::Put, item.clone(), true, ClientResponse::One),
            Self::new("remove", HttpMethod::Delete, item, false, ClientResponse::Nothing),
        ]
    }

    /// Names of `{param}` path segments, in order
    pub fn path_params(&self) -> Vec<&str> {
        self.path
            .split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
            .collect()
    }
}

/// Options for TypeScript generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeGenOptions {
    /// Emit `import type` lines for referenced contracts
    pub include_imports: bool,
    /// Emit doc comments for declarations and described fields
    pub include_comments: bool,
    pub export_type: ExportType,
    pub output_format: OutputFormat,
    /// Emit a fetch-based client class
    pub client_api_generation: bool,
    pub base_url: String,
    /// Client operations; CRUD over the contract's resource path when unset
    pub operations: Option<Vec<ClientOperation>>,
    pub naming: NamingConfig,
}

impl Default for TypeGenOptions {
    fn default() -> Self {
        Self {
            include_imports: true,
            include_comments: true,
            export_type: ExportType::Named,
            output_format: OutputFormat::Interface,
            client_api_generation: false,
            base_url: "/api".to_string(),
            operations: None,
            naming: NamingConfig::default(),
        }
    }
}

impl TypeGenOptions {
    /// Stable string form used in cache keys
    pub fn cache_fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud_operations() {
        let ops = ClientOperation::crud("/widgets");
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[1].path, "/widgets/{id}");
        assert_eq!(ops[1].path_params(), vec!["id"]);
        assert!(ops[0].path_params().is_empty());
    }

    #[test]
    fn test_fingerprint_is_stable_and_option_sensitive() {
        let a = TypeGenOptions::default();
        let b = TypeGenOptions::default();
        assert_eq!(a.cache_fingerprint(), b.cache_fingerprint());

        let c = TypeGenOptions {
            output_format: OutputFormat::Type,
            ..TypeGenOptions::default()
        };
        assert_ne!(a.cache_fingerprint(), c.cache_fingerprint());
    }
}
