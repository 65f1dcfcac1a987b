//! Contract records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::schema::SchemaNode;
use crate::version::ContractVersion;

/// A named, versioned, immutable schema registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub schema: SchemaNode,
    /// Structural fingerprint of `schema`
    pub hash: Checksum,
    pub metadata: ContractMetadata,
}

impl Contract {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &ContractVersion {
        &self.metadata.version
    }

    /// Whether this record explicitly lists `version` as compatible
    pub fn lists_compatible(&self, version: &ContractVersion) -> bool {
        self.metadata
            .compatible_versions
            .iter()
            .any(|v| ContractVersion::parse(v).map(|v| &v == version).unwrap_or(false))
    }

    pub fn is_deprecated(&self) -> bool {
        self.metadata.deprecated
    }
}

/// Descriptive and lifecycle metadata of a contract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    pub name: String,
    pub version: ContractVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_date: Option<DateTime<Utc>>,
    /// Explicit compatibility allow-list
    #[serde(default)]
    pub compatible_versions: Vec<String>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Caller-supplied metadata applied over the registration defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataOverrides {
    pub description: Option<String>,
    pub deprecated: Option<bool>,
    pub deprecation_date: Option<DateTime<Utc>>,
    pub compatible_versions: Option<Vec<String>>,
}

impl MetadataOverrides {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn compatible_with<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_versions = Some(versions.into_iter().map(Into::into).collect());
        self
    }
}

/// `name:version`
pub fn contract_key(name: &str, version: &str) -> String {
    format!("{}:{}", name, version)
}
