//! Configuration management for the contract registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (contracts.toml)
//! - Environment variables (CONTRACTS__*)
//!
//! ## Example config file (contracts.toml):
//! ```toml
//! [registry]
//! contracts_dir = "./contracts"
//!
//! [codegen]
//! output_dir = "./generated"
//! output_format = "interface"
//! export_type = "named"
//! base_url = "/api"
//!
//! [dev]
//! enabled = true
//! environment_variable = "APP_ENV"
//! skip_paths = ["/health", "/metrics"]
//! watch_paths = ["./contracts"]
//!
//! [dev.route_contracts]
//! "/api/tasks" = "TaskCreate"
//!
//! [versioning]
//! default_notice_days = 90
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codegen::{ExportType, OutputFormat, TypeGenOptions};
use crate::gateway::DevValidationConfig;
use crate::loader::LoadConfig;
use crate::version_manager::DEFAULT_DEPRECATION_NOTICE_DAYS;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub codegen: CodegenConfig,

    /// Development validation middleware
    #[serde(default)]
    pub dev: DevValidationConfig,

    #[serde(default)]
    pub versioning: VersioningConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding `*.contract.json` files
    #[serde(default = "default_contracts_dir")]
    pub contracts_dir: PathBuf,

    /// Path prefixes skipped while loading
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

/// Code generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default)]
    pub export_type: ExportType,

    #[serde(default = "default_true")]
    pub include_comments: bool,

    #[serde(default = "default_true")]
    pub include_imports: bool,

    #[serde(default)]
    pub client_api_generation: bool,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Pretty-print generated JSON documents
    #[serde(default = "default_true")]
    pub pretty: bool,
}

/// Version lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Deprecation notice period for contracts without a policy
    #[serde(default = "default_notice_days")]
    pub default_notice_days: u32,
}

// Default value functions
fn default_contracts_dir() -> PathBuf {
    PathBuf::from("contracts")
}

fn default_skip_prefixes() -> Vec<String> {
    LoadConfig::default().skip_prefixes
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_base_url() -> String {
    "/api".to_string()
}

fn default_notice_days() -> u32 {
    DEFAULT_DEPRECATION_NOTICE_DAYS
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            contracts_dir: default_contracts_dir(),
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_format: OutputFormat::default(),
            export_type: ExportType::default(),
            include_comments: true,
            include_imports: true,
            client_api_generation: false,
            base_url: default_base_url(),
            pretty: true,
        }
    }
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            default_notice_days: default_notice_days(),
        }
    }
}

impl ContractsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["contracts.toml", ".contracts.toml", "config/contracts.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "contracts") {
            let xdg_config = config_dir.config_dir().join("contracts.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CONTRACTS__DEV__ENABLED=false, CONTRACTS__CODEGEN__BASE_URL=...
        builder = builder.add_source(
            Environment::with_prefix("CONTRACTS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Contracts directory (resolves relative paths)
    pub fn contracts_dir(&self) -> PathBuf {
        resolve(&self.registry.contracts_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        resolve(&self.codegen.output_dir)
    }

    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            skip_prefixes: self.registry.skip_prefixes.clone(),
            ..LoadConfig::default()
        }
    }

    /// TypeScript options derived from the `[codegen]` section
    pub fn type_options(&self) -> TypeGenOptions {
        TypeGenOptions {
            include_imports: self.codegen.include_imports,
            include_comments: self.codegen.include_comments,
            export_type: self.codegen.export_type,
            output_format: self.codegen.output_format,
            client_api_generation: self.codegen.client_api_generation,
            base_url: self.codegen.base_url.clone(),
            ..TypeGenOptions::default()
        }
    }
}

fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContractsConfig::default();
        assert_eq!(config.registry.contracts_dir, PathBuf::from("contracts"));
        assert_eq!(config.dev.environment_variable, "APP_ENV");
        assert_eq!(config.versioning.default_notice_days, 90);
        assert_eq!(config.type_options().base_url, "/api");
    }

    #[test]
    fn test_serialize_config() {
        let config = ContractsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[codegen]"));
        assert!(toml_str.contains("[dev]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[codegen]\noutput_format = \"type\"\n\n[dev]\nenabled = false\n\n[dev.route_contracts]\n\"/api/tasks\" = \"TaskCreate\"\n",
        )
        .unwrap();

        let config = ContractsConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.codegen.output_format, OutputFormat::Type);
        assert!(!config.dev.enabled);
        assert_eq!(
            config.dev.route_contracts.get("/api/tasks").map(String::as_str),
            Some("TaskCreate")
        );
    }
}
