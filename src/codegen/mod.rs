//! Code Generation
//!
//! Structural recursions over [`SchemaNode`](crate::schema::SchemaNode) that
//! derive artifacts from registered contracts:
//!
//! - `openapi`: OpenAPI 3.0 documents and single-contract schema fragments
//! - `typescript`: TypeScript declarations, modules, and fetch clients
//!
//! Generators are total. A node kind they cannot express degrades to a
//! generic type with a warning instead of aborting the pass.

pub mod config;
pub mod names;
pub mod openapi;
pub mod typescript;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use config::{ClientOperation, ClientResponse, ExportType, NamingConfig, OutputFormat, TypeGenOptions};
pub use openapi::{
    schema_to_openapi, ContractRef, EndpointDefinition, OpenApiGenerator, OpenApiSpec, ParameterContract,
    ParameterLocation, ServerInfo, SpecInfo,
};
pub use typescript::{schema_to_typescript, GeneratedTypes, GenerationMetadata, TypeCache, TypeGenerator};

// =============================================================================
// HTTP Methods
// =============================================================================

/// HTTP method of an endpoint or client operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Lowercase form used as the OpenAPI path-item key
    pub fn as_key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key().to_uppercase())
    }
}
