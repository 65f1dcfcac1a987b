//! Contract File Loading
//!
//! Registers contracts from `*.contract.json` files:
//!
//! ```json
//! {
//!   "name": "Task",
//!   "version": "1.0.0",
//!   "metadata": { "description": "A unit of work" },
//!   "schema": { "kind": "object", "fields": [] }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::contract::{contract_key, MetadataOverrides};
use crate::registry::ContractRegistry;

/// File suffix that marks a contract definition
pub const CONTRACT_FILE_SUFFIX: &str = ".contract.json";

/// Configuration for contract loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Skip files matching these path prefixes
    pub skip_prefixes: Vec<String>,
    /// Only load files matching these path prefixes
    pub include_prefixes: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
                "artifacts/".to_string(),
            ],
            include_prefixes: Vec::new(),
        }
    }
}

/// What a directory load did
#[derive(Debug, Default)]
pub struct LoadReport {
    /// `name:version` of each registered contract
    pub loaded: Vec<String>,
    /// Files that could not be read, parsed, or registered
    pub failed: Vec<(PathBuf, String)>,
    /// Contract files filtered out by prefix rules
    pub skipped: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// On-disk shape of a contract definition
#[derive(Debug, Deserialize)]
struct ContractFile {
    name: String,
    version: String,
    schema: serde_json::Value,
    #[serde(default)]
    metadata: MetadataOverrides,
}

/// Whether `path` names a contract definition file
pub fn is_contract_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.ends_with(CONTRACT_FILE_SUFFIX))
}

/// Load every contract file under `dir`. A bad file is reported in the
/// returned [`LoadReport`] and does not stop the walk.
pub fn load_contracts(registry: &mut ContractRegistry, dir: &Path, config: &LoadConfig) -> anyhow::Result<LoadReport> {
    if !dir.is_dir() {
        bail!("Contracts directory not found: {}", dir.display());
    }

    let mut report = LoadReport::default();
    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || !is_contract_file(path) {
            continue;
        }

        let relative = path.strip_prefix(dir)?.to_string_lossy().replace('\\', "/");
        if !config.include_prefixes.is_empty() && !config.include_prefixes.iter().any(|p| relative.starts_with(p)) {
            report.skipped += 1;
            continue;
        }
        if config.skip_prefixes.iter().any(|p| relative.starts_with(p)) {
            report.skipped += 1;
            continue;
        }

        match load_contract_file(registry, path) {
            Ok(key) => report.loaded.push(key),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping contract file");
                report.failed.push((path.to_path_buf(), format!("{:#}", e)));
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "loaded contracts"
    );
    Ok(report)
}

/// Load and register one contract file, returning its `name:version`
pub fn load_contract_file(registry: &mut ContractRegistry, path: &Path) -> anyhow::Result<String> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file: ContractFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse contract file {}", path.display()))?;

    if !registry.register_contract_json(&file.name, &file.version, &file.schema, file.metadata) {
        bail!(
            "Registration of {} v{} from {} was rejected",
            file.name,
            file.version,
            path.display()
        );
    }
    Ok(contract_key(&file.name, &file.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_contract_file_detection() {
        assert!(is_contract_file(Path::new("contracts/task.contract.json")));
        assert!(!is_contract_file(Path::new("contracts/task.json")));
        assert!(!is_contract_file(Path::new("contracts")));
    }

    #[test]
    fn test_load_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("widget.contract.json");
        fs::write(
            &path,
            r#"{"name":"Widget","version":"1.0.0","metadata":{"description":"A widget"},
                "schema":{"kind":"object","fields":[{"name":"name","schema":{"kind":"string"}}]}}"#,
        )
        .unwrap();

        let mut registry = ContractRegistry::new();
        let key = load_contract_file(&mut registry, &path).unwrap();
        assert_eq!(key, "Widget:1.0.0");
        let contract = registry.get_contract("Widget", "1.0.0").unwrap();
        assert_eq!(contract.metadata.description.as_deref(), Some("A widget"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let mut registry = ContractRegistry::new();
        let result = load_contracts(&mut registry, Path::new("/nonexistent/contracts"), &LoadConfig::default());
        assert!(result.is_err());
    }
}
