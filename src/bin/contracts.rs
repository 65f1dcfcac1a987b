//! Contract Registry CLI
//!
//! Loads `*.contract.json` files and exposes registry, generation, and
//! version-lifecycle operations on the command line.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use clap::{Parser, Subcommand, ValueEnum};
use contract_registry::codegen::{EndpointDefinition, SpecInfo, TypeCache};
use contract_registry::config::ContractsConfig;
use contract_registry::gateway::{dev_validation_middleware, stats_handler};
use contract_registry::loader::load_contracts;
use contract_registry::{ContractRegistry, DevValidation, OpenApiGenerator, TypeGenerator, VersionManager};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contracts")]
#[command(about = "Manage versioned contracts and generate OpenAPI/TypeScript artifacts")]
struct Cli {
    /// Config file (defaults to contracts.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Contracts directory (overrides config)
    #[arg(short = 'd', long)]
    contracts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered contracts and their versions
    List {
        /// Only show deprecated versions
        #[arg(long)]
        deprecated: bool,
    },

    /// Validate a JSON document against a contract
    Validate {
        name: String,
        /// JSON file to validate
        file: PathBuf,
        /// Contract version (defaults to latest)
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Check compatibility between two versions of a contract
    Check { name: String, from: String, to: String },

    /// Generate an OpenAPI document from endpoint definitions
    Openapi {
        /// JSON file holding an array of endpoint definitions
        #[arg(short, long)]
        endpoints: PathBuf,
        #[arg(long, default_value = "API")]
        title: String,
        #[arg(long, default_value = "1.0.0")]
        api_version: String,
        #[arg(short, long, value_enum, default_value = "json")]
        format: DocFormat,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate TypeScript modules
    Types {
        /// Contract name (all contracts when omitted)
        name: Option<String>,
        #[arg(short, long)]
        version: Option<String>,
        /// Emit a fetch-based client class
        #[arg(long)]
        client: bool,
        /// Write one `<name>.ts` per contract into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Line diff of generated declarations between two versions
    Diff { name: String, from: String, to: String },

    /// Create an upgrade plan between two versions
    Plan { name: String, from: String, to: String },

    /// Audit every registered version for policy compliance
    Audit,

    /// Show the effective configuration, or write it to a file
    Config {
        #[arg(long)]
        init: Option<PathBuf>,
    },

    /// Run a development gateway that validates and echoes request bodies
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:4010")]
        addr: SocketAddr,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DocFormat {
    Json,
    Yaml,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ContractsConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.contracts {
        config.registry.contracts_dir = dir;
    }

    match cli.command {
        Commands::Config { init } => show_config(&config, init.as_deref()),
        command => execute(command, config),
    }
}

fn execute(command: Commands, config: ContractsConfig) -> anyhow::Result<()> {
    let registry = open_registry(&config)?;
    let manager = VersionManager::with_default_notice_days(config.versioning.default_notice_days);

    match command {
        Commands::List { deprecated } => {
            for name in registry.get_contract_names() {
                let versions: Vec<_> = registry
                    .get_contract_versions(&name)
                    .into_iter()
                    .filter(|c| !deprecated || c.is_deprecated())
                    .collect();
                if versions.is_empty() {
                    continue;
                }
                println!("{}", name);
                for contract in versions {
                    let marker = if contract.is_deprecated() { " (deprecated)" } else { "" };
                    println!("  {} {}{}", contract.version(), contract.hash.short(), marker);
                }
            }
            Ok(())
        }

        Commands::Validate { name, file, version } => {
            let data: Value = read_json(&file)?;
            let version = resolve_version(&registry, &name, version)?;
            let outcome = registry.validate_against_contract(&name, &version, &data);
            if outcome.success {
                println!("✅ valid against {} v{}", name, version);
                println!("{}", serde_json::to_string_pretty(&outcome.data)?);
                Ok(())
            } else {
                println!("❌ invalid against {} v{}", name, version);
                for issue in &outcome.issues {
                    println!("   └─ {}: {}", issue.path, issue.message);
                }
                std::process::exit(1);
            }
        }

        Commands::Check { name, from, to } => {
            let report = manager.check_version_compatibility(&registry, &name, &from, &to);
            println!("🔍 {} {} -> {}: {}", name, from, to, report.registry_result.summary());
            for issue in &report.issues {
                println!("   [{:?}] {}", issue.severity, issue.message);
            }
            if report.migration_required {
                println!("   migration required");
            }
            if !report.compatible {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Openapi {
            endpoints,
            title,
            api_version,
            format,
            output,
        } => {
            let endpoints: Vec<EndpointDefinition> =
                serde_json::from_value(read_json(&endpoints)?).context("parsing endpoint definitions")?;
            let spec = OpenApiGenerator::new(&registry).generate_openapi_spec(&endpoints, &SpecInfo::new(title, api_version));
            let rendered = match format {
                DocFormat::Json if config.codegen.pretty => spec.to_json()?,
                DocFormat::Json => serde_json::to_string(&spec)?,
                DocFormat::Yaml => spec.to_yaml()?,
            };
            write_or_print(output.as_deref(), &rendered)
        }

        Commands::Types {
            name,
            version,
            client,
            output,
        } => {
            let mut options = config.type_options();
            options.client_api_generation |= client;
            let generator = TypeGenerator::new();

            let targets = match name {
                Some(name) => {
                    let version = resolve_version(&registry, &name, version)?;
                    vec![(name, version)]
                }
                None => registry
                    .get_contract_names()
                    .into_iter()
                    .filter_map(|name| {
                        let latest = registry.get_latest_contract(&name)?.version().version_string();
                        Some((name, latest))
                    })
                    .collect(),
            };

            for (name, version) in targets {
                let module = generator
                    .generate_typescript_module(&registry, &name, &version, &options)
                    .with_context(|| format!("contract {} v{} not found", name, version))?;
                match &output {
                    Some(dir) => {
                        std::fs::create_dir_all(dir)?;
                        let path = dir.join(format!("{}.ts", contract_registry::codegen::names::to_kebab_case(&name)));
                        std::fs::write(&path, module)?;
                        println!("✅ {} v{} -> {}", name, version, path.display());
                    }
                    None => println!("{}", module),
                }
            }
            Ok(())
        }

        Commands::Diff { name, from, to } => {
            let generator = TypeGenerator::new();
            let options = config.type_options();
            let render = |version: &str| {
                generator
                    .generate_contract_types(&registry, &name, version, &options)
                    .map(|g| g.types)
                    .with_context(|| format!("contract {} v{} not found", name, version))
            };
            let (old, new) = (render(&from)?, render(&to)?);

            let diff = TextDiff::from_lines(&old, &new);
            for change in diff.iter_all_changes() {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                print!("{}{}", sign, change);
            }
            Ok(())
        }

        Commands::Plan { name, from, to } => {
            let plan = manager
                .create_upgrade_plan(&registry, &name, &from, &to, None)
                .with_context(|| format!("no upgrade path for {} {} -> {}", name, from, to))?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }

        Commands::Audit => {
            let statuses = manager.audit_compliance(&registry);
            let mut failing = 0;
            for status in &statuses {
                if status.compliant {
                    println!("✅ {} v{}", status.contract_name, status.version);
                } else {
                    failing += 1;
                    println!("❌ {} v{}", status.contract_name, status.version);
                    for issue in &status.issues {
                        println!("   └─ {}", issue.message);
                    }
                }
            }
            println!();
            println!("{} version(s) audited, {} non-compliant", statuses.len(), failing);
            if failing > 0 {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Serve { addr } => serve(registry, config, addr),

        Commands::Config { init } => show_config(&config, init.as_deref()),
    }
}

fn open_registry(config: &ContractsConfig) -> anyhow::Result<ContractRegistry> {
    let dir = config.contracts_dir();
    let mut registry = ContractRegistry::new();
    let report = load_contracts(&mut registry, &dir, &config.load_config())?;
    for (path, error) in &report.failed {
        eprintln!("⚠️  {}: {}", path.display(), error);
    }
    tracing::debug!(loaded = report.loaded.len(), skipped = report.skipped, "contracts loaded");
    Ok(registry)
}

fn resolve_version(registry: &ContractRegistry, name: &str, version: Option<String>) -> anyhow::Result<String> {
    match version {
        Some(v) => Ok(v),
        None => match registry.get_latest_contract(name) {
            Some(c) => Ok(c.version().version_string()),
            None => bail!("contract {} is not registered", name),
        },
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn write_or_print(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
            println!("✅ wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn show_config(config: &ContractsConfig, init: Option<&Path>) -> anyhow::Result<()> {
    match init {
        Some(path) => {
            config.save(path)?;
            println!("✅ wrote {}", path.display());
        }
        None => println!("{}", toml::to_string_pretty(config)?),
    }
    Ok(())
}

fn serve(registry: ContractRegistry, config: ContractsConfig, addr: SocketAddr) -> anyhow::Result<()> {
    // `serve` is a development tool; validate regardless of APP_ENV
    let dev = DevValidation::with_development_mode(registry.into_shared(), TypeCache::new(), config.dev.clone(), true);
    if !dev.watch(&config.dev.watch_paths)? {
        tracing::warn!("hot reload disabled");
    }

    let app = Router::new()
        .route("/__contracts/stats", get(stats_handler))
        .fallback(echo)
        .layer(from_fn_with_state(dev.clone(), dev_validation_middleware))
        .with_state(dev);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "development gateway listening");
        axum::serve(listener, app).await?;
        Ok::<_, anyhow::Error>(())
    })
}

/// Echo the (sanitized) request body back to the caller
async fn echo(body: axum::body::Bytes) -> Json<Value> {
    Json(serde_json::from_slice(&body).unwrap_or(Value::Null))
}
