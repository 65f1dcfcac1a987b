//! Contract versioning utilities

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ContractError;

/// A contract version: a plain `MAJOR.MINOR.PATCH` triple.
///
/// Pre-release and build suffixes are rejected; ordering is by
/// (major, minor, patch).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractVersion(Version);

impl ContractVersion {
    /// Create a version from its components
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse a version string, stripping a leading 'v' if present
    pub fn parse(version_str: &str) -> Result<Self, ContractError> {
        let trimmed = version_str.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let version = Version::parse(trimmed)?;
        if !version.pre.is_empty() || !version.build.is_empty() {
            return Err(ContractError::InvalidVersion(format!(
                "'{}' must be a plain MAJOR.MINOR.PATCH version",
                version_str
            )));
        }
        Ok(Self(version))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.0.to_string()
    }

    /// Check if this is a minor version bump from another version
    pub fn is_minor_bump_from(&self, other: &ContractVersion) -> bool {
        self.major() == other.major() && self.minor() > other.minor()
    }

    /// Check if this is a patch version bump from another version
    pub fn is_patch_bump_from(&self, other: &ContractVersion) -> bool {
        self.major() == other.major()
            && self.minor() == other.minor()
            && self.patch() > other.patch()
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContractVersion {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContractVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.version_string())
    }
}

impl<'de> Deserialize<'de> for ContractVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = ContractVersion::parse("1.2.3").unwrap();
        assert_eq!(v.version_string(), "1.2.3");
        assert_eq!((v.major(), v.minor(), v.patch()), (1, 2, 3));
    }

    #[test]
    fn test_version_with_v_prefix() {
        let v = ContractVersion::parse("v1.2.3").unwrap();
        assert_eq!(v.version_string(), "1.2.3");
    }

    #[test]
    fn test_rejects_prerelease_and_garbage() {
        assert!(ContractVersion::parse("1.0.0-beta.1").is_err());
        assert!(ContractVersion::parse("1.0").is_err());
        assert!(ContractVersion::parse("latest").is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let mut versions: Vec<ContractVersion> = ["1.2.0", "1.10.0", "2.0.0", "1.9.9"]
            .iter()
            .map(|v| ContractVersion::parse(v).unwrap())
            .collect();
        versions.sort();
        let sorted: Vec<String> = versions.iter().map(|v| v.version_string()).collect();
        assert_eq!(sorted, vec!["1.2.0", "1.9.9", "1.10.0", "2.0.0"]);
    }

    #[test]
    fn test_version_increase_kinds() {
        let v = ContractVersion::new(1, 2, 3);
        assert!(ContractVersion::new(1, 5, 0).is_minor_bump_from(&v));
        assert!(!ContractVersion::new(2, 5, 0).is_minor_bump_from(&v));
        assert!(ContractVersion::new(1, 2, 4).is_patch_bump_from(&v));
        assert!(!ContractVersion::new(1, 3, 4).is_patch_bump_from(&v));
        assert!(!v.is_patch_bump_from(&v));
    }

    #[test]
    fn test_serde_as_string() {
        let v = ContractVersion::new(3, 1, 4);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"3.1.4\"");
        let back: ContractVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
