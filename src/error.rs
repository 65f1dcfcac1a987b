//! Error types for the contract registry

use thiserror::Error;

/// Result type for contract operations
pub type Result<T> = std::result::Result<T, ContractError>;

/// Contract registry errors
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Contract immutability violation: {name} v{version} is already registered with a different schema")]
    ImmutabilityViolation { name: String, version: String },

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    #[error("Invalid schema description: {0}")]
    InvalidSchema(String),

    #[error("Invalid version policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid migration strategy: {0}")]
    InvalidMigration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}
