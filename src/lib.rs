//! Contract Registry
//!
//! A runtime registry of named, versioned schemas ("contracts") for
//! contract-driven development.
//!
//! ## Features
//!
//! - **Immutable Registrations**: each `(name, version)` is stored once with a SHA256 hash
//! - **Semantic Versioning**: strict `MAJOR.MINOR.PATCH` ordering and compatibility rules
//! - **Code Generation**: OpenAPI 3.0 documents and TypeScript declarations from contracts
//! - **Version Lifecycle**: policies, migration strategies, upgrade plans, compliance audits
//! - **Validation Gateway**: request validation for axum, with a dev middleware and hot reload
//!
//! ## Architecture
//!
//! ```text
//! contracts/                      ContractRegistry ──► OpenApiGenerator ──► openapi.json
//! ├── task.contract.json   ──►         │          └──► TypeGenerator   ──► task.ts
//! └── user.contract.json               │
//!                                      ├──► VersionManager (policies, plans, audits)
//!                                      └──► ValidationPipe / DevValidation (axum)
//! ```

pub mod checksum;
pub mod codegen;
pub mod compatibility;
pub mod config;
pub mod contract;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod registry;
pub mod schema;
pub mod version;
pub mod version_manager;

pub use checksum::Checksum;
pub use codegen::{OpenApiGenerator, TypeGenOptions, TypeGenerator};
pub use compatibility::CompatibilityResult;
pub use config::ContractsConfig;
pub use contract::{Contract, ContractMetadata, MetadataOverrides};
pub use error::{ContractError, Result};
pub use gateway::{DevValidation, ValidationPipe};
pub use registry::{ContractFilter, ContractRegistry, SharedRegistry, ValidationOutcome};
pub use schema::SchemaNode;
pub use version::ContractVersion;
pub use version_manager::VersionManager;
