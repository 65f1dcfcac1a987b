//! Contract Registry
//!
//! In-memory store of named, versioned contracts. Registrations are
//! append-only: a `(name, version)` pair is bound to one schema for the life
//! of the registry, and the only mutation afterwards is deprecation.
//!
//! Lookups never fail loudly. Misses return `None` (with a warning logged),
//! registration failures return `false`, and validation reports through
//! [`ValidationOutcome`], leaving protocol-level errors to the gateway.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::Checksum;
use crate::compatibility::CompatibilityResult;
use crate::contract::{contract_key, Contract, ContractMetadata, MetadataOverrides};
use crate::error::{ContractError, Result};
use crate::schema::{ContractResolver, SchemaNode, ValidationIssue};
use crate::version::ContractVersion;

/// Registry handle shared between the gateway, the watcher, and handlers
pub type SharedRegistry = Arc<RwLock<ContractRegistry>>;

/// Filters for [`ContractRegistry::search_contracts`]; all set filters must match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractFilter {
    pub name: Option<String>,
    pub version: Option<String>,
    pub deprecated: Option<bool>,
    /// Keep contracts compatible with this version of the same name
    pub compatible_with: Option<String>,
}

/// Result of validating data against a contract
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            issues: Vec::new(),
        }
    }

    fn failed(error: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            issues,
        }
    }
}

/// The contract registry
#[derive(Debug, Default)]
pub struct ContractRegistry {
    /// name -> version -> contract
    contracts: BTreeMap<String, BTreeMap<ContractVersion, Contract>>,
    /// `name:version` -> schema hash
    hashes: HashMap<String, Checksum>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap this registry in a shareable handle
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Register a contract.
    ///
    /// Returns `false` (and logs the cause) when the record is invalid or the
    /// version is already bound to a different schema. Registering the same
    /// schema again is a no-op success.
    pub fn register_contract(
        &mut self,
        name: &str,
        version: &str,
        schema: SchemaNode,
        overrides: MetadataOverrides,
    ) -> bool {
        match self.try_register(name, version, schema, overrides) {
            Ok(hash) => {
                tracing::info!(contract = name, version, hash = hash.short(), "registered contract");
                true
            }
            Err(e) => {
                tracing::error!(contract = name, version, error = %e, "failed to register contract");
                false
            }
        }
    }

    /// Register a contract from an untyped schema description
    pub fn register_contract_json(
        &mut self,
        name: &str,
        version: &str,
        schema: &Value,
        overrides: MetadataOverrides,
    ) -> bool {
        match serde_json::from_value::<SchemaNode>(schema.clone()) {
            Ok(node) => self.register_contract(name, version, node, overrides),
            Err(e) => {
                let err = ContractError::InvalidSchema(e.to_string());
                tracing::error!(contract = name, version, error = %err, "failed to register contract");
                false
            }
        }
    }

    fn try_register(
        &mut self,
        name: &str,
        version: &str,
        schema: SchemaNode,
        overrides: MetadataOverrides,
    ) -> Result<Checksum> {
        validate_name(name)?;
        let parsed = ContractVersion::parse(version)?;

        let compatible_versions = overrides.compatible_versions.unwrap_or_default();
        for v in &compatible_versions {
            ContractVersion::parse(v).map_err(|_| {
                ContractError::InvalidContract(format!("compatible version '{}' is not MAJOR.MINOR.PATCH", v))
            })?;
        }

        let hash = Checksum::of_schema(&schema);
        let key = contract_key(name, &parsed.version_string());

        if let Some(existing) = self.hashes.get(&key) {
            if *existing != hash {
                return Err(ContractError::ImmutabilityViolation {
                    name: name.to_string(),
                    version: parsed.version_string(),
                });
            }
            tracing::debug!(contract = name, version, "contract already registered with identical schema");
            return Ok(hash);
        }

        let now = Utc::now();
        let deprecated = overrides.deprecated.unwrap_or(false);
        let deprecation_date = match (deprecated, overrides.deprecation_date) {
            (true, None) => Some(now),
            (_, date) => date,
        };

        let contract = Contract {
            schema,
            hash: hash.clone(),
            metadata: ContractMetadata {
                name: name.to_string(),
                version: parsed.clone(),
                description: overrides.description,
                deprecated,
                deprecation_date,
                compatible_versions,
                created: now,
                last_modified: now,
            },
        };

        self.hashes.insert(key, hash.clone());
        self.contracts
            .entry(name.to_string())
            .or_default()
            .insert(parsed, contract);
        Ok(hash)
    }

    /// Exact `(name, version)` lookup
    pub fn get_contract(&self, name: &str, version: &str) -> Option<&Contract> {
        let Some(versions) = self.contracts.get(name) else {
            self.warn_missing_name(name);
            return None;
        };
        let found = ContractVersion::parse(version)
            .ok()
            .and_then(|v| versions.get(&v));
        if found.is_none() {
            tracing::warn!(contract = name, version, "contract version not found");
        }
        found
    }

    /// Highest registered version by (major, minor, patch)
    pub fn get_latest_contract(&self, name: &str) -> Option<&Contract> {
        let latest = self
            .contracts
            .get(name)
            .and_then(|versions| versions.values().next_back());
        if latest.is_none() {
            self.warn_missing_name(name);
        }
        latest
    }

    /// All registered versions of a contract
    pub fn get_contract_versions(&self, name: &str) -> Vec<&Contract> {
        self.contracts
            .get(name)
            .map(|versions| versions.values().collect())
            .unwrap_or_default()
    }

    /// All registered contract names, sorted
    pub fn get_contract_names(&self) -> Vec<String> {
        self.contracts.keys().cloned().collect()
    }

    /// Every registered contract, by name then version
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.values().flat_map(|versions| versions.values())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Hash recorded for `(name, version)` at registration time
    pub fn hash_of(&self, name: &str, version: &str) -> Option<&Checksum> {
        let v = ContractVersion::parse(version).ok()?;
        self.hashes.get(&contract_key(name, &v.version_string()))
    }

    /// Search contracts; all provided filters must match
    pub fn search_contracts(&self, filter: &ContractFilter) -> Vec<&Contract> {
        let version = filter.version.as_deref().and_then(|v| ContractVersion::parse(v).ok());
        if filter.version.is_some() && version.is_none() {
            return Vec::new();
        }

        self.contracts()
            .filter(|c| filter.name.as_deref().map_or(true, |n| c.name() == n))
            .filter(|c| version.as_ref().map_or(true, |v| c.version() == v))
            .filter(|c| filter.deprecated.map_or(true, |d| c.is_deprecated() == d))
            .filter(|c| {
                filter.compatible_with.as_deref().map_or(true, |other| {
                    self.check_compatibility(c.name(), &c.version().version_string(), other)
                        .compatible
                })
            })
            .collect()
    }

    /// Compare two versions of a contract.
    ///
    /// An explicit `compatible_versions` entry on either record wins.
    /// Otherwise a major difference is breaking, and minor or patch
    /// differences produce warnings only.
    pub fn check_compatibility(&self, name: &str, source: &str, target: &str) -> CompatibilityResult {
        let source_contract = self.lookup_quiet(name, source);
        let target_contract = self.lookup_quiet(name, target);

        let (s, t) = match (source_contract, target_contract) {
            (Some(s), Some(t)) => (s, t),
            (None, t) => {
                let mut result = CompatibilityResult::failed(
                    source,
                    target,
                    format!("Source contract {} version {} not found", name, source),
                );
                if t.is_none() {
                    result.issues.push(format!("Target contract {} version {} not found", name, target));
                }
                return result;
            }
            (Some(_), None) => {
                return CompatibilityResult::failed(
                    source,
                    target,
                    format!("Target contract {} version {} not found", name, target),
                );
            }
        };

        let source_version = s.version();
        let target_version = t.version();
        let mut result = CompatibilityResult::compatible(
            source_version.version_string(),
            target_version.version_string(),
        );

        if s.lists_compatible(target_version) || t.lists_compatible(source_version) {
            return result;
        }

        if source_version.major() != target_version.major() {
            result.add_breaking(format!(
                "Major version change from {} to {}",
                source_version, target_version
            ));
        } else if target_version.minor() < source_version.minor() {
            result.add_warning(format!(
                "Minor version decrease from {} to {} may lose features",
                source_version, target_version
            ));
        } else if target_version.minor() > source_version.minor() {
            result.add_warning(format!(
                "Minor version increase from {} to {} adds backward-compatible features",
                source_version, target_version
            ));
        } else if target_version.patch() != source_version.patch() {
            result.add_warning(format!(
                "Patch version difference between {} and {}",
                source_version, target_version
            ));
        }

        result
    }

    /// Mark a contract deprecated. Returns `false` when it does not exist.
    pub fn mark_deprecated(&mut self, name: &str, version: &str, date: Option<DateTime<Utc>>) -> bool {
        let Ok(parsed) = ContractVersion::parse(version) else {
            tracing::warn!(contract = name, version, "cannot deprecate: invalid version");
            return false;
        };
        let Some(contract) = self.contracts.get_mut(name).and_then(|v| v.get_mut(&parsed)) else {
            tracing::warn!(contract = name, version, "cannot deprecate: contract not found");
            return false;
        };

        let now = Utc::now();
        contract.metadata.deprecated = true;
        contract.metadata.deprecation_date = Some(date.unwrap_or(now));
        contract.metadata.last_modified = now;
        tracing::info!(contract = name, version, "contract marked deprecated");
        true
    }

    /// Validate `data` against a contract, returning the coerced data
    pub fn validate_against_contract(&self, name: &str, version: &str, data: &Value) -> ValidationOutcome {
        let Some(contract) = self.get_contract(name, version) else {
            return ValidationOutcome::failed(
                format!("Contract {} version {} not found", name, version),
                Vec::new(),
            );
        };

        match contract.schema.parse_with(data, self) {
            Ok(parsed) => ValidationOutcome::ok(parsed),
            Err(failure) => {
                tracing::debug!(contract = name, version, error = %failure, "validation failed");
                ValidationOutcome::failed(failure.to_string(), failure.issues)
            }
        }
    }

    /// Closest registered name to `name`, for diagnostics
    pub fn suggest_name(&self, name: &str) -> Option<&str> {
        let matcher = SkimMatcherV2::default();
        self.contracts
            .keys()
            .filter_map(|candidate| {
                matcher
                    .fuzzy_match(candidate, name)
                    .or_else(|| matcher.fuzzy_match(name, candidate))
                    .map(|score| (score, candidate.as_str()))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, candidate)| candidate)
    }

    fn lookup_quiet(&self, name: &str, version: &str) -> Option<&Contract> {
        let v = ContractVersion::parse(version).ok()?;
        self.contracts.get(name)?.get(&v)
    }

    fn warn_missing_name(&self, name: &str) {
        match self.suggest_name(name) {
            Some(hint) => tracing::warn!(contract = name, suggestion = hint, "contract not found"),
            None => tracing::warn!(contract = name, "contract not found"),
        }
    }
}

impl ContractResolver for ContractRegistry {
    fn resolve(&self, name: &str, version: Option<&str>) -> Option<&SchemaNode> {
        let contract = match version {
            Some(v) => self.lookup_quiet(name, v),
            None => self.contracts.get(name).and_then(|v| v.values().next_back()),
        };
        contract.map(|c| &c.schema)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ContractError::InvalidContract("contract name must not be empty".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ContractError::InvalidContract(format!(
            "contract name '{}' may only contain letters, digits, '_', '-' and '.'",
            name
        )));
    }
    Ok(())
}
