//! Contract compatibility results

use serde::{Deserialize, Serialize};

/// Outcome of comparing two versions of a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    /// Whether data valid under the source version is usable under the target
    pub compatible: bool,
    pub source_version: String,
    pub target_version: String,
    /// Problems that prevented a comparison (e.g. a missing contract)
    pub issues: Vec<String>,
    pub breaking_changes: Vec<String>,
    pub warnings: Vec<String>,
}

impl CompatibilityResult {
    /// Compatible result with no findings
    pub fn compatible(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            compatible: true,
            source_version: source.into(),
            target_version: target.into(),
            issues: Vec::new(),
            breaking_changes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Incompatible result carrying a single issue
    pub fn failed(source: impl Into<String>, target: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            compatible: false,
            issues: vec![issue.into()],
            ..Self::compatible(source, target)
        }
    }

    pub fn add_breaking(&mut self, change: impl Into<String>) {
        self.breaking_changes.push(change.into());
        self.compatible = false;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        if !self.issues.is_empty() {
            self.issues.join("; ")
        } else if self.compatible {
            if self.warnings.is_empty() {
                "No changes detected".to_string()
            } else {
                format!("Compatible with {} warning(s)", self.warnings.len())
            }
        } else {
            format!("{} breaking change(s) detected", self.breaking_changes.len())
        }
    }
}
