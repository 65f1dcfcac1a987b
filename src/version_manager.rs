//! Version Manager
//!
//! Lifecycle tooling layered over the registry:
//!
//! - per-contract version policies (support windows, deprecation notice)
//! - a catalog of migration strategies, bucketed by contract name
//! - compatibility analysis with severity levels
//! - compliance auditing and upgrade-plan construction
//!
//! The registry is passed into each call rather than held, so one manager can
//! be used with a plain registry or through a [`SharedRegistry`](crate::registry::SharedRegistry) guard.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Months, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::compatibility::CompatibilityResult;
use crate::contract::{contract_key, Contract};
use crate::error::{ContractError, Result};
use crate::registry::ContractRegistry;
use crate::version::ContractVersion;

/// Notice period used when a contract has no policy
pub const DEFAULT_DEPRECATION_NOTICE_DAYS: u32 = 90;

// =============================================================================
// Policy & Strategy
// =============================================================================

/// Lifecycle rules for one contract name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VersionPolicy {
    /// Months a major line stays supported after its latest release
    pub major_version_lifetime: u32,
    /// Minor versions kept per supported major line
    pub minor_version_support: u32,
    /// Days between deprecation and end of life
    pub deprecation_notice_period: u32,
    pub forced_upgrade_allowed: bool,
    pub compatibility_guarantees: Vec<String>,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            major_version_lifetime: 12,
            minor_version_support: 3,
            deprecation_notice_period: DEFAULT_DEPRECATION_NOTICE_DAYS,
            forced_upgrade_allowed: false,
            compatibility_guarantees: Vec::new(),
        }
    }
}

impl VersionPolicy {
    fn validate(&self) -> Result<()> {
        if self.major_version_lifetime == 0 {
            return Err(ContractError::InvalidPolicy(
                "major version lifetime must be at least one month".to_string(),
            ));
        }
        if self.minor_version_support == 0 {
            return Err(ContractError::InvalidPolicy(
                "at least one minor version must be supported".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationKind {
    Manual,
    Automatic,
    Deprecated,
}

/// Documented procedure for moving consumers between two versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStrategy {
    pub from_version: String,
    pub to_version: String,
    pub strategy: MigrationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_script: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub breaking_changes: Vec<String>,
    #[serde(default)]
    pub migration_steps: Vec<String>,
}

impl MigrationStrategy {
    pub fn new(from: &str, to: &str, strategy: MigrationKind, description: impl Into<String>) -> Self {
        Self {
            from_version: from.to_string(),
            to_version: to.to_string(),
            strategy,
            migration_script: None,
            description: description.into(),
            estimated_duration: None,
            breaking_changes: Vec::new(),
            migration_steps: Vec::new(),
        }
    }

    fn matches(&self, from: &ContractVersion, to: &ContractVersion) -> bool {
        ContractVersion::parse(&self.from_version).map_or(false, |v| &v == from)
            && ContractVersion::parse(&self.to_version).map_or(false, |v| &v == to)
    }
}

// =============================================================================
// Derived Artifacts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Breaking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

/// Registry compatibility plus severity analysis and migration lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCompatibility {
    pub contract_name: String,
    pub from_version: String,
    pub to_version: String,
    /// The registry's verdict (explicit lists win)
    pub compatible: bool,
    pub migration_required: bool,
    pub issues: Vec<CompatibilityIssue>,
    pub registry_result: CompatibilityResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_strategy: Option<MigrationStrategy>,
}

impl VersionCompatibility {
    pub fn has_breaking(&self) -> bool {
        self.issues.iter().any(|i| i.severity == IssueSeverity::Breaking)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceIssueKind {
    ContractNotFound,
    DeprecationGracePeriodExceeded,
    VersionOutsidePolicyWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    pub kind: ComplianceIssueKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStatus {
    pub contract_name: String,
    pub version: String,
    pub compliant: bool,
    pub issues: Vec<ComplianceIssue>,
    pub checked_at: DateTime<Utc>,
}

impl ComplianceStatus {
    pub fn has(&self, kind: ComplianceIssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePhase {
    pub name: String,
    pub description: String,
    pub actions: Vec<String>,
    pub rollback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePlan {
    pub contract_name: String,
    pub from_version: String,
    pub to_version: String,
    pub compatibility: CompatibilityResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MigrationStrategy>,
    pub phases: Vec<UpgradePhase>,
    pub timeline: Vec<Milestone>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprecationRecord {
    pub contract_name: String,
    pub version: String,
    pub deprecated_at: DateTime<Utc>,
    pub end_of_life: DateTime<Utc>,
    pub reason: String,
    /// Latest version at deprecation time, when newer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

// =============================================================================
// Manager
// =============================================================================

#[derive(Debug)]
pub struct VersionManager {
    policies: HashMap<String, VersionPolicy>,
    /// contract name -> strategies
    strategies: HashMap<String, Vec<MigrationStrategy>>,
    /// `name:version` -> record
    deprecations: HashMap<String, DeprecationRecord>,
    compliance_cache: Mutex<HashMap<String, CachedCompliance>>,
    plan_cache: Mutex<HashMap<String, UpgradePlan>>,
    default_notice_days: u32,
}

#[derive(Debug)]
struct CachedCompliance {
    status: ComplianceStatus,
    expires_at: Option<DateTime<Utc>>,
}

/// Registered versions of `name` with their deprecation flags, e.g. `1.0.0~,1.1.0`
fn version_fingerprint(registry: &ContractRegistry, name: &str) -> String {
    registry
        .get_contract_versions(name)
        .iter()
        .map(|c| {
            let flag = if c.is_deprecated() { "~" } else { "" };
            format!("{}{}", c.version(), flag)
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl Default for VersionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionManager {
    pub fn new() -> Self {
        Self::with_default_notice_days(DEFAULT_DEPRECATION_NOTICE_DAYS)
    }

    /// Manager whose fallback notice period (no policy) is `days`
    pub fn with_default_notice_days(days: u32) -> Self {
        Self {
            policies: HashMap::new(),
            strategies: HashMap::new(),
            deprecations: HashMap::new(),
            compliance_cache: Mutex::new(HashMap::new()),
            plan_cache: Mutex::new(HashMap::new()),
            default_notice_days: days,
        }
    }

    /// Register or replace the policy for `name`
    pub fn register_version_policy(&mut self, name: &str, policy: VersionPolicy) -> bool {
        if let Err(e) = policy.validate() {
            tracing::error!(contract = name, error = %e, "rejected version policy");
            return false;
        }
        self.policies.insert(name.to_string(), policy);
        self.clear_caches();
        tracing::info!(contract = name, "registered version policy");
        true
    }

    pub fn get_policy(&self, name: &str) -> Option<&VersionPolicy> {
        self.policies.get(name)
    }

    /// Add a strategy for `contract_name`, replacing one with the same endpoints
    pub fn add_migration_strategy(&mut self, contract_name: &str, strategy: MigrationStrategy) -> bool {
        match self.try_add_strategy(contract_name, strategy) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(contract = contract_name, error = %e, "rejected migration strategy");
                false
            }
        }
    }

    fn try_add_strategy(&mut self, contract_name: &str, strategy: MigrationStrategy) -> Result<()> {
        if contract_name.trim().is_empty() {
            return Err(ContractError::InvalidMigration("contract name must not be empty".to_string()));
        }
        let from = ContractVersion::parse(&strategy.from_version)?;
        let to = ContractVersion::parse(&strategy.to_version)?;
        if from == to {
            return Err(ContractError::InvalidMigration(format!(
                "source and target are both {}",
                from
            )));
        }

        let bucket = self.strategies.entry(contract_name.to_string()).or_default();
        bucket.retain(|s| !s.matches(&from, &to));
        tracing::info!(
            contract = contract_name,
            from = %from,
            to = %to,
            kind = ?strategy.strategy,
            "registered migration strategy"
        );
        bucket.push(strategy);
        self.plan_cache.lock().clear();
        Ok(())
    }

    /// Strategy for exactly `from -> to`; no multi-hop search
    pub fn find_migration_strategy(&self, name: &str, from: &str, to: &str) -> Option<&MigrationStrategy> {
        let from = ContractVersion::parse(from).ok()?;
        let to = ContractVersion::parse(to).ok()?;
        self.strategies.get(name)?.iter().find(|s| s.matches(&from, &to))
    }

    pub fn migration_strategies(&self, name: &str) -> &[MigrationStrategy] {
        self.strategies.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Compatibility with severity levels and the matching migration strategy
    pub fn check_version_compatibility(
        &self,
        registry: &ContractRegistry,
        name: &str,
        from: &str,
        to: &str,
    ) -> VersionCompatibility {
        let registry_result = registry.check_compatibility(name, from, to);
        let mut issues: Vec<CompatibilityIssue> = registry_result
            .issues
            .iter()
            .map(|message| CompatibilityIssue {
                severity: IssueSeverity::Breaking,
                message: message.clone(),
            })
            .collect();

        if let (Ok(f), Ok(t)) = (ContractVersion::parse(from), ContractVersion::parse(to)) {
            issues.extend(severity_analysis(&f, &t));
        }

        for (label, version) in [("Source", from), ("Target", to)] {
            if registry
                .get_contract_versions(name)
                .iter()
                .any(|c| c.is_deprecated() && ContractVersion::parse(version).map_or(false, |v| c.version() == &v))
            {
                issues.push(CompatibilityIssue {
                    severity: IssueSeverity::Warning,
                    message: format!("{} version {} is deprecated", label, version),
                });
            }
        }

        let has_breaking = issues.iter().any(|i| i.severity == IssueSeverity::Breaking);
        VersionCompatibility {
            contract_name: name.to_string(),
            from_version: from.to_string(),
            to_version: to.to_string(),
            compatible: registry_result.compatible,
            migration_required: has_breaking || !registry_result.compatible,
            issues,
            migration_strategy: self.find_migration_strategy(name, from, to).cloned(),
            registry_result,
        }
    }

    /// Check one version against its policy.
    ///
    /// Results are cached against the set of registered versions of `name`
    /// (with their deprecation flags), and a compliant result expires when
    /// the grace period or the major-version lifetime it relied on runs out.
    pub fn validate_compliance(&self, registry: &ContractRegistry, name: &str, version: &str) -> ComplianceStatus {
        let contract = registry.get_contract(name, version);
        let cache_key = format!("{}|{}", contract_key(name, version), version_fingerprint(registry, name));
        let now = Utc::now();
        if let Some(cached) = self.compliance_cache.lock().get(&cache_key) {
            if cached.expires_at.map_or(true, |at| now < at) {
                tracing::debug!(contract = name, version, "compliance cache hit");
                return cached.status.clone();
            }
        }

        let mut issues = Vec::new();
        let mut expires_at = None;

        match contract {
            None => issues.push(ComplianceIssue {
                kind: ComplianceIssueKind::ContractNotFound,
                message: format!("Contract {} version {} not found", name, version),
            }),
            Some(contract) if contract.is_deprecated() => {
                let notice = self.notice_days(name);
                if let Some(date) = contract.metadata.deprecation_date {
                    let end_of_life = date + Duration::days(i64::from(notice));
                    if now <= end_of_life {
                        expires_at = Some(end_of_life);
                    } else {
                        issues.push(ComplianceIssue {
                            kind: ComplianceIssueKind::DeprecationGracePeriodExceeded,
                            message: format!(
                                "Deprecated on {}; the {}-day grace period ended {}",
                                date.format("%Y-%m-%d"),
                                notice,
                                end_of_life.format("%Y-%m-%d")
                            ),
                        });
                    }
                }
            }
            Some(contract) => {
                let supported = self.get_supported_versions(registry, name);
                if supported.iter().any(|c| c.version() == contract.version()) {
                    expires_at = self.major_line_end(registry, name, contract.version().major());
                } else {
                    issues.push(ComplianceIssue {
                        kind: ComplianceIssueKind::VersionOutsidePolicyWindow,
                        message: format!(
                            "Version {} is outside the supported window for {}",
                            contract.version(),
                            name
                        ),
                    });
                }
            }
        }

        let status = ComplianceStatus {
            contract_name: name.to_string(),
            version: version.to_string(),
            compliant: issues.is_empty(),
            issues,
            checked_at: now,
        };
        self.compliance_cache.lock().insert(
            cache_key,
            CachedCompliance {
                status: status.clone(),
                expires_at,
            },
        );
        status
    }

    /// When the policy stops supporting major line `major` of `name`
    fn major_line_end(&self, registry: &ContractRegistry, name: &str, major: u64) -> Option<DateTime<Utc>> {
        let policy = self.policies.get(name)?;
        let newest = registry
            .get_contract_versions(name)
            .into_iter()
            .filter(|c| c.version().major() == major)
            .max_by(|a, b| a.version().cmp(b.version()))?
            .metadata
            .created;
        newest.checked_add_months(Months::new(policy.major_version_lifetime))
    }

    /// Compliance of every registered contract version
    pub fn audit_compliance(&self, registry: &ContractRegistry) -> Vec<ComplianceStatus> {
        let statuses: Vec<ComplianceStatus> = registry
            .contracts()
            .map(|c| self.validate_compliance(registry, c.name(), &c.version().version_string()))
            .collect();
        let failing = statuses.iter().filter(|s| !s.compliant).count();
        tracing::info!(checked = statuses.len(), failing, "compliance audit complete");
        statuses
    }

    /// Three-phase upgrade plan, or `None` when the versions are neither
    /// compatible nor covered by a migration strategy
    pub fn create_upgrade_plan(
        &self,
        registry: &ContractRegistry,
        name: &str,
        from: &str,
        to: &str,
        timeline: Option<Vec<Milestone>>,
    ) -> Option<UpgradePlan> {
        let cache_key = format!("{}->{}", contract_key(name, from), to);
        if timeline.is_none() {
            if let Some(cached) = self.plan_cache.lock().get(&cache_key) {
                tracing::debug!(contract = name, from, to, "upgrade plan cache hit");
                return Some(cached.clone());
            }
        }

        let compatibility = registry.check_compatibility(name, from, to);
        let strategy = self.find_migration_strategy(name, from, to).cloned();
        if !compatibility.compatible && strategy.is_none() {
            tracing::warn!(
                contract = name,
                from,
                to,
                "no upgrade path: versions are incompatible and no migration strategy exists"
            );
            return None;
        }

        let now = Utc::now();
        let explicit_timeline = timeline.is_some();
        let plan = UpgradePlan {
            contract_name: name.to_string(),
            from_version: from.to_string(),
            to_version: to.to_string(),
            phases: upgrade_phases(name, from, to, strategy.as_ref()),
            timeline: timeline.unwrap_or_else(|| default_timeline(now)),
            compatibility,
            strategy,
            created_at: now,
        };

        if !explicit_timeline {
            self.plan_cache.lock().insert(cache_key, plan.clone());
        }
        Some(plan)
    }

    /// Deprecate a version, record its end of life, and register a manual
    /// migration to the latest version when a newer one exists
    pub fn deprecate_version(
        &mut self,
        registry: &mut ContractRegistry,
        name: &str,
        version: &str,
        date: Option<DateTime<Utc>>,
        reason: &str,
    ) -> bool {
        let deprecated_at = date.unwrap_or_else(Utc::now);
        if !registry.mark_deprecated(name, version, Some(deprecated_at)) {
            return false;
        }

        let notice = self.notice_days(name);
        let end_of_life = deprecated_at + Duration::days(i64::from(notice));

        let replacement = match (registry.get_latest_contract(name), ContractVersion::parse(version)) {
            (Some(latest), Ok(current)) if latest.version() > &current => Some(latest.version().version_string()),
            _ => None,
        };

        if let Some(target) = &replacement {
            let mut strategy = MigrationStrategy::new(
                version,
                target,
                MigrationKind::Manual,
                format!("Migrate from deprecated version {} to {}", version, target),
            );
            strategy.breaking_changes.push(reason.to_string());
            strategy.migration_steps = vec![
                format!("Review changes between {} and {}", version, target),
                format!("Update clients to send and accept {} payloads", target),
                "Run contract validation against the new version".to_string(),
                format!("Remove usage of {} before {}", version, end_of_life.format("%Y-%m-%d")),
            ];
            self.add_migration_strategy(name, strategy);
        }

        let record = DeprecationRecord {
            contract_name: name.to_string(),
            version: version.to_string(),
            deprecated_at,
            end_of_life,
            reason: reason.to_string(),
            replacement,
        };
        self.deprecations.insert(contract_key(name, version), record);
        self.clear_caches();
        tracing::info!(contract = name, version, end_of_life = %end_of_life, reason, "deprecated contract version");
        true
    }

    pub fn deprecation_info(&self, name: &str, version: &str) -> Option<&DeprecationRecord> {
        self.deprecations.get(&contract_key(name, version))
    }

    /// Versions still supported, highest first.
    ///
    /// Without a policy every non-deprecated version is supported. With one,
    /// a major line is kept while its latest release is younger than the
    /// lifetime, and at most `minor_version_support` minors survive per line.
    pub fn get_supported_versions<'r>(&self, registry: &'r ContractRegistry, name: &str) -> Vec<&'r Contract> {
        let versions = registry.get_contract_versions(name);
        let Some(policy) = self.policies.get(name) else {
            let mut active: Vec<&Contract> = versions.into_iter().filter(|c| !c.is_deprecated()).collect();
            active.sort_by(|a, b| b.version().cmp(a.version()));
            return active;
        };

        let cutoff = Utc::now().checked_sub_months(Months::new(policy.major_version_lifetime));

        let mut by_major: BTreeMap<u64, Vec<&Contract>> = BTreeMap::new();
        for contract in versions {
            by_major.entry(contract.version().major()).or_default().push(contract);
        }

        let mut supported = Vec::new();
        for (_, mut group) in by_major.into_iter().rev() {
            group.sort_by(|a, b| b.version().cmp(a.version()));
            let Some(latest) = group.first() else { continue };
            if cutoff.map_or(false, |cutoff| latest.metadata.created < cutoff) {
                continue;
            }

            let mut minors = BTreeSet::new();
            for contract in group.into_iter().filter(|c| !c.is_deprecated()) {
                let minor = contract.version().minor();
                if !minors.contains(&minor) {
                    if minors.len() as u32 >= policy.minor_version_support {
                        continue;
                    }
                    minors.insert(minor);
                }
                supported.push(contract);
            }
        }
        supported
    }

    pub fn clear_caches(&self) {
        self.compliance_cache.lock().clear();
        self.plan_cache.lock().clear();
    }

    fn notice_days(&self, name: &str) -> u32 {
        self.policies
            .get(name)
            .map_or(self.default_notice_days, |p| p.deprecation_notice_period)
    }
}

fn severity_analysis(from: &ContractVersion, to: &ContractVersion) -> Vec<CompatibilityIssue> {
    let mut issues = Vec::new();
    if from.major() != to.major() {
        issues.push(CompatibilityIssue {
            severity: IssueSeverity::Breaking,
            message: format!("Major version change from {} to {}", from, to),
        });
    }
    if to < from {
        issues.push(CompatibilityIssue {
            severity: IssueSeverity::Warning,
            message: format!("Downgrade from {} to {}", from, to),
        });
    } else if to.is_minor_bump_from(from) {
        issues.push(CompatibilityIssue {
            severity: IssueSeverity::Info,
            message: format!("Minor version increase from {} to {}", from, to),
        });
    } else if to.is_patch_bump_from(from) {
        issues.push(CompatibilityIssue {
            severity: IssueSeverity::Info,
            message: format!("Patch version increase from {} to {}", from, to),
        });
    }
    issues
}

fn upgrade_phases(name: &str, from: &str, to: &str, strategy: Option<&MigrationStrategy>) -> Vec<UpgradePhase> {
    let mut validation_actions = vec![
        format!("Validate representative {} payloads against version {}", name, to),
        format!("Review compatibility report for {} -> {}", from, to),
    ];
    if let Some(strategy) = strategy {
        validation_actions.extend(strategy.migration_steps.iter().cloned());
        if let Some(script) = &strategy.migration_script {
            validation_actions.push(format!("Dry-run migration script {}", script));
        }
    }

    vec![
        UpgradePhase {
            name: "Pre-upgrade validation".to_string(),
            description: format!("Confirm consumers of {} {} can handle {}", name, from, to),
            actions: validation_actions,
            rollback: "No changes deployed; abandon the plan".to_string(),
        },
        UpgradePhase {
            name: "Staged rollout".to_string(),
            description: "Deploy to non-production environments and monitor validation failures".to_string(),
            actions: vec![
                format!("Register {} {} in staging", name, to),
                "Enable contract validation in development and staging".to_string(),
                "Monitor validation error rates".to_string(),
            ],
            rollback: format!("Revert staging consumers to {}", from),
        },
        UpgradePhase {
            name: "Production rollout".to_string(),
            description: format!("Switch production consumers to {}", to),
            actions: vec![
                format!("Register {} {} in production", name, to),
                "Migrate consumers incrementally".to_string(),
                format!("Deprecate {} once traffic has moved", from),
            ],
            rollback: format!("Route consumers back to {} and keep it registered", from),
        },
    ]
}

fn default_timeline(now: DateTime<Utc>) -> Vec<Milestone> {
    [
        ("Pre-upgrade validation complete", 7),
        ("Staged rollout complete", 14),
        ("Production rollout complete", 21),
    ]
    .into_iter()
    .map(|(name, days)| Milestone {
        name: name.to_string(),
        date: now + Duration::days(days),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MetadataOverrides;
    use crate::schema::SchemaNode;

    fn registry_with(versions: &[&str]) -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        for (i, v) in versions.iter().enumerate() {
            let schema = SchemaNode::object([("field", SchemaNode::string()), ("rev", SchemaNode::literal(i as u64))]);
            assert!(registry.register_contract("Widget", v, schema, MetadataOverrides::default()));
        }
        registry
    }

    #[test]
    fn test_policy_validation() {
        let mut manager = VersionManager::new();
        let bad = VersionPolicy {
            minor_version_support: 0,
            ..VersionPolicy::default()
        };
        assert!(!manager.register_version_policy("Widget", bad));
        assert!(manager.register_version_policy("Widget", VersionPolicy::default()));
        assert!(manager.get_policy("Widget").is_some());
    }

    #[test]
    fn test_strategies_are_bucketed_per_contract() {
        let mut manager = VersionManager::new();
        let strategy = MigrationStrategy::new("1.0.0", "2.0.0", MigrationKind::Automatic, "rename field");
        assert!(manager.add_migration_strategy("Widget", strategy));
        assert!(!manager.add_migration_strategy(
            "Widget",
            MigrationStrategy::new("1.0.0", "1.0.0", MigrationKind::Manual, "noop")
        ));
        assert!(!manager.add_migration_strategy(
            "Widget",
            MigrationStrategy::new("one", "2.0.0", MigrationKind::Manual, "bad")
        ));

        assert!(manager.find_migration_strategy("Widget", "1.0.0", "2.0.0").is_some());
        assert!(manager.find_migration_strategy("Gadget", "1.0.0", "2.0.0").is_none());
        // exact match only
        assert!(manager.find_migration_strategy("Widget", "1.0.0", "3.0.0").is_none());
    }

    #[test]
    fn test_severity_analysis() {
        let registry = registry_with(&["1.0.0", "1.1.0", "2.0.0"]);
        let manager = VersionManager::new();

        let major = manager.check_version_compatibility(&registry, "Widget", "1.0.0", "2.0.0");
        assert!(!major.compatible);
        assert!(major.has_breaking());
        assert!(major.migration_required);

        let minor = manager.check_version_compatibility(&registry, "Widget", "1.0.0", "1.1.0");
        assert!(minor.compatible);
        assert!(!minor.migration_required);
        assert_eq!(minor.issues[0].severity, IssueSeverity::Info);

        let down = manager.check_version_compatibility(&registry, "Widget", "1.1.0", "1.0.0");
        assert!(down.issues.iter().any(|i| i.severity == IssueSeverity::Warning));
    }

    #[test]
    fn test_upgrade_plan_requires_compatibility_or_strategy() {
        let registry = registry_with(&["1.0.0", "1.1.0", "2.0.0"]);
        let mut manager = VersionManager::new();

        let plan = manager
            .create_upgrade_plan(&registry, "Widget", "1.0.0", "1.1.0", None)
            .expect("compatible versions");
        assert_eq!(plan.phases.len(), 3);
        let offsets: Vec<i64> = plan
            .timeline
            .iter()
            .map(|m| (m.date - plan.created_at).num_days())
            .collect();
        assert_eq!(offsets, vec![7, 14, 21]);

        assert!(manager.create_upgrade_plan(&registry, "Widget", "1.0.0", "2.0.0", None).is_none());

        manager.add_migration_strategy(
            "Widget",
            MigrationStrategy::new("1.0.0", "2.0.0", MigrationKind::Manual, "restructure"),
        );
        let plan = manager
            .create_upgrade_plan(&registry, "Widget", "1.0.0", "2.0.0", None)
            .expect("covered by strategy");
        assert!(plan.strategy.is_some());
    }

    #[test]
    fn test_explicit_timeline_is_used() {
        let registry = registry_with(&["1.0.0", "1.0.1"]);
        let manager = VersionManager::new();
        let milestone = Milestone {
            name: "Done".to_string(),
            date: Utc::now() + Duration::days(2),
        };
        let plan = manager
            .create_upgrade_plan(&registry, "Widget", "1.0.0", "1.0.1", Some(vec![milestone.clone()]))
            .expect("compatible");
        assert_eq!(plan.timeline, vec![milestone]);
    }

    #[test]
    fn test_deprecate_version_registers_migration() {
        let mut registry = registry_with(&["1.0.0", "1.1.0"]);
        let mut manager = VersionManager::new();

        assert!(manager.deprecate_version(&mut registry, "Widget", "1.0.0", None, "field removed"));
        assert!(!manager.deprecate_version(&mut registry, "Widget", "9.0.0", None, "missing"));

        let record = manager.deprecation_info("Widget", "1.0.0").expect("record");
        assert_eq!((record.end_of_life - record.deprecated_at).num_days(), 90);
        assert_eq!(record.replacement.as_deref(), Some("1.1.0"));

        let strategy = manager
            .find_migration_strategy("Widget", "1.0.0", "1.1.0")
            .expect("auto strategy");
        assert_eq!(strategy.strategy, MigrationKind::Manual);
        assert_eq!(strategy.breaking_changes, vec!["field removed".to_string()]);
        assert!(registry.get_contract("Widget", "1.0.0").map_or(false, |c| c.is_deprecated()));
    }

    #[test]
    fn test_supported_versions() {
        let mut registry = registry_with(&["1.0.0", "1.1.0", "1.2.0", "1.2.1", "2.0.0"]);
        registry.mark_deprecated("Widget", "2.0.0", None);

        let mut manager = VersionManager::new();
        let without_policy: Vec<String> = manager
            .get_supported_versions(&registry, "Widget")
            .iter()
            .map(|c| c.version().version_string())
            .collect();
        assert_eq!(without_policy, vec!["1.2.1", "1.2.0", "1.1.0", "1.0.0"]);

        manager.register_version_policy(
            "Widget",
            VersionPolicy {
                minor_version_support: 2,
                ..VersionPolicy::default()
            },
        );
        let with_policy: Vec<String> = manager
            .get_supported_versions(&registry, "Widget")
            .iter()
            .map(|c| c.version().version_string())
            .collect();
        assert_eq!(with_policy, vec!["1.2.1", "1.2.0", "1.1.0"]);
    }

    #[test]
    fn test_compliance() {
        let mut registry = registry_with(&["1.0.0", "1.1.0", "1.2.0"]);
        let mut manager = VersionManager::new();
        manager.register_version_policy(
            "Widget",
            VersionPolicy {
                minor_version_support: 1,
                deprecation_notice_period: 30,
                ..VersionPolicy::default()
            },
        );

        let missing = manager.validate_compliance(&registry, "Widget", "5.0.0");
        assert!(missing.has(ComplianceIssueKind::ContractNotFound));

        let outside = manager.validate_compliance(&registry, "Widget", "1.0.0");
        assert!(outside.has(ComplianceIssueKind::VersionOutsidePolicyWindow));

        assert!(manager.validate_compliance(&registry, "Widget", "1.2.0").compliant);

        let long_ago = Utc::now() - Duration::days(45);
        registry.mark_deprecated("Widget", "1.1.0", Some(long_ago));
        let expired = manager.validate_compliance(&registry, "Widget", "1.1.0");
        assert!(expired.has(ComplianceIssueKind::DeprecationGracePeriodExceeded));

        let audit = manager.audit_compliance(&registry);
        assert_eq!(audit.len(), 3);
        assert_eq!(audit.iter().filter(|s| s.compliant).count(), 1);
    }

    #[test]
    fn test_compliance_follows_newer_registrations() {
        let mut registry = registry_with(&["1.0.0", "1.1.0"]);
        let mut manager = VersionManager::new();
        manager.register_version_policy(
            "Widget",
            VersionPolicy {
                minor_version_support: 1,
                ..VersionPolicy::default()
            },
        );
        assert!(manager.validate_compliance(&registry, "Widget", "1.1.0").compliant);

        let schema = SchemaNode::object([("field", SchemaNode::string())]);
        assert!(registry.register_contract("Widget", "1.2.0", schema, MetadataOverrides::default()));

        let status = manager.validate_compliance(&registry, "Widget", "1.1.0");
        assert!(!status.compliant);
        assert!(status.has(ComplianceIssueKind::VersionOutsidePolicyWindow));
        assert!(manager.validate_compliance(&registry, "Widget", "1.2.0").compliant);
    }

    #[test]
    fn test_version_fingerprint_tracks_deprecation() {
        let mut registry = registry_with(&["1.0.0", "1.1.0"]);
        assert_eq!(version_fingerprint(&registry, "Widget"), "1.0.0,1.1.0");
        registry.mark_deprecated("Widget", "1.0.0", None);
        assert_eq!(version_fingerprint(&registry, "Widget"), "1.0.0~,1.1.0");
        assert_eq!(version_fingerprint(&registry, "Gadget"), "");
    }
}
