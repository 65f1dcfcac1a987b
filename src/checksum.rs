//! Structural fingerprints for contract schemas

use sha2::{Sha256, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::SchemaNode;

/// SHA256 checksum of a contract schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from JSON value.
    ///
    /// `serde_json::Value` objects keep their keys sorted, so the compact
    /// serialization is canonical.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_bytes(canonical.as_bytes())
    }

    /// Compute the structural fingerprint of a schema tree
    pub fn of_schema(schema: &SchemaNode) -> Self {
        match serde_json::to_value(schema) {
            Ok(value) => Self::from_json(&value),
            // Schema nodes only hold JSON-representable data
            Err(_) => Self::from_bytes(format!("{:?}", schema).as_bytes()),
        }
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in logs and generated headers
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;

    #[test]
    fn test_checksum_consistency() {
        let schema = SchemaNode::object([("name", SchemaNode::string())]);
        assert_eq!(Checksum::of_schema(&schema), Checksum::of_schema(&schema.clone()));
    }

    #[test]
    fn test_checksum_different_content() {
        let a = SchemaNode::object([("name", SchemaNode::string())]);
        let b = SchemaNode::object([("title", SchemaNode::string())]);
        assert_ne!(Checksum::of_schema(&a), Checksum::of_schema(&b));
    }

    #[test]
    fn test_checksum_format() {
        let schema = SchemaNode::array(SchemaNode::number());
        let checksum = Checksum::of_schema(&schema);
        assert_eq!(checksum.as_str().len(), 64);
        assert_eq!(checksum.short().len(), 12);
    }
}
