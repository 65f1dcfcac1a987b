//! Development Validation Middleware
//!
//! Validates JSON bodies (`application/json` or `+json`) of
//! `POST`/`PUT`/`PATCH` requests against a contract
//! inferred from the route, and enriches 400 responses with developer hints.
//! Outside development mode the middleware is a pass-through.
//!
//! Contract resolution:
//! 1. explicit route table (`route_contracts`, longest prefix wins)
//! 2. first meaningful path segment (skipping `api` and `v<N>`), matched
//!    case-insensitively against registered names; an exact or singular
//!    match wins, otherwise the first substring match in name order

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use notify::RecommendedWatcher;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::pipe::ContractValidationError;
use super::ValidationLocation;
use crate::checksum::Checksum;
use crate::codegen::TypeCache;
use crate::registry::{SharedRegistry, ValidationOutcome};

/// Largest request body buffered for validation
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Validations reported by [`DevValidation::validation_stats`]
const STATS_WINDOW: usize = 10;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevValidationConfig {
    pub enabled: bool,
    /// Environment variable naming the runtime mode
    pub environment_variable: String,
    /// Value of `environment_variable` that means development
    pub development_value: String,
    /// Path prefixes never validated
    pub skip_paths: Vec<String>,
    /// Directories watched for contract changes
    pub watch_paths: Vec<PathBuf>,
    /// Route prefix -> contract name
    pub route_contracts: BTreeMap<String, String>,
    /// Recent validations retained for stats; also bounds the outcome cache
    pub history_size: usize,
}

impl Default for DevValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            environment_variable: "APP_ENV".to_string(),
            development_value: "development".to_string(),
            skip_paths: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/static".to_string(),
                "/favicon.ico".to_string(),
            ],
            watch_paths: vec![PathBuf::from("contracts")],
            route_contracts: BTreeMap::new(),
            history_size: 100,
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// One validation performed by the middleware
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub contract: String,
    pub version: String,
    pub success: bool,
    pub cached: bool,
    pub duration_micros: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub enabled: bool,
    pub is_development_mode: bool,
    pub watcher_active: bool,
    pub cached_results: usize,
    pub last_validations: Vec<ValidationRecord>,
}

/// Shared handle to the dev middleware's state
#[derive(Clone)]
pub struct DevValidation {
    inner: Arc<DevState>,
}

pub(crate) struct DevState {
    pub(crate) config: DevValidationConfig,
    pub(crate) registry: SharedRegistry,
    pub(crate) type_cache: TypeCache,
    validation_cache: RwLock<ValidationCache>,
    recent: Mutex<VecDeque<ValidationRecord>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    development_override: Option<bool>,
}

impl DevValidation {
    pub fn new(registry: SharedRegistry, type_cache: TypeCache, config: DevValidationConfig) -> Self {
        Self::build(registry, type_cache, config, None)
    }

    /// Ignore the environment and force development mode on or off
    pub fn with_development_mode(
        registry: SharedRegistry,
        type_cache: TypeCache,
        config: DevValidationConfig,
        development: bool,
    ) -> Self {
        Self::build(registry, type_cache, config, Some(development))
    }

    fn build(
        registry: SharedRegistry,
        type_cache: TypeCache,
        config: DevValidationConfig,
        development_override: Option<bool>,
    ) -> Self {
        let capacity = config.history_size;
        Self {
            inner: Arc::new(DevState {
                config,
                registry,
                type_cache,
                validation_cache: RwLock::new(ValidationCache::new(capacity)),
                recent: Mutex::new(VecDeque::new()),
                watcher: Mutex::new(None),
                development_override,
            }),
        }
    }

    pub(crate) fn from_state(inner: Arc<DevState>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<DevState> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &DevValidationConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.inner.registry
    }

    pub fn type_cache(&self) -> &TypeCache {
        &self.inner.type_cache
    }

    pub fn is_development_mode(&self) -> bool {
        self.inner.development_override.unwrap_or_else(|| {
            std::env::var(&self.inner.config.environment_variable)
                .map_or(false, |v| v == self.inner.config.development_value)
        })
    }

    /// Enabled, in development mode, and not skip-listed
    pub fn should_validate(&self, path: &str) -> bool {
        self.inner.config.enabled
            && self.is_development_mode()
            && !self.inner.config.skip_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Contract that governs requests to `path`, if any
    pub fn resolve_contract(&self, path: &str) -> Option<String> {
        let routed = self
            .inner
            .config
            .route_contracts
            .iter()
            .filter(|(prefix, _)| matches_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, name)| name.clone());
        if routed.is_some() {
            return routed;
        }

        let segment = path
            .split('/')
            .filter(|s| !s.is_empty())
            .find(|s| !is_prefix_segment(s))?
            .to_lowercase();
        let singular = segment.strip_suffix('s').unwrap_or(&segment).to_string();

        let names = self.inner.registry.read().get_contract_names();
        if let Some(exact) = names.iter().find(|n| {
            let n = n.to_lowercase();
            n == segment || n == singular
        }) {
            return Some(exact.clone());
        }
        names.into_iter().find(|n| {
            let n = n.to_lowercase();
            n.contains(&segment) || segment.contains(&n)
        })
    }

    fn validate_cached(&self, name: &str, version: &str, body: &Value, raw: &[u8]) -> (ValidationOutcome, bool) {
        let key = format!("{}:{}:{}", name, version, Checksum::from_bytes(raw));
        if let Some(hit) = self.inner.validation_cache.read().get(&key) {
            return (hit, true);
        }
        let outcome = self.inner.registry.read().validate_against_contract(name, version, body);
        self.inner.validation_cache.write().insert(key, outcome.clone());
        (outcome, false)
    }

    fn record(&self, record: ValidationRecord) {
        let mut recent = self.inner.recent.lock();
        recent.push_back(record);
        while recent.len() > self.inner.config.history_size.max(1) {
            recent.pop_front();
        }
    }

    /// Drop all cached validation outcomes
    pub fn clear_validation_cache(&self) -> usize {
        self.inner.validation_cache.write().clear()
    }

    pub fn validation_stats(&self) -> ValidationStats {
        let recent = self.inner.recent.lock();
        let skip = recent.len().saturating_sub(STATS_WINDOW);
        ValidationStats {
            enabled: self.inner.config.enabled,
            is_development_mode: self.is_development_mode(),
            watcher_active: self.inner.watcher.lock().is_some(),
            cached_results: self.inner.validation_cache.read().len(),
            last_validations: recent.iter().skip(skip).cloned().collect(),
        }
    }

    /// Watch `paths` for contract changes. Returns `false` without watching
    /// when the middleware is disabled or not in development mode.
    pub fn watch(&self, paths: &[PathBuf]) -> crate::Result<bool> {
        if !self.inner.config.enabled || !self.is_development_mode() {
            tracing::debug!("contract watcher not started outside development mode");
            return Ok(false);
        }
        let watcher = super::watcher::spawn(self, paths)?;
        *self.inner.watcher.lock() = Some(watcher);
        Ok(true)
    }

    /// Stop watching; dropping the watcher ends its thread
    pub fn unwatch(&self) {
        if self.inner.watcher.lock().take().is_some() {
            tracing::info!("contract watcher stopped");
        }
    }

    async fn inspect(&self, request: Request) -> Result<Result<Request, Response>, DevMiddlewareError> {
        let path = request.uri().path().to_string();
        let method = request.method().clone();

        let Some(name) = self.resolve_contract(&path) else {
            tracing::debug!(%path, "no contract inferred for route");
            return Ok(Ok(request));
        };
        let Some(version) = self
            .inner
            .registry
            .read()
            .get_latest_contract(&name)
            .map(|c| c.version().version_string())
        else {
            return Ok(Ok(request));
        };

        let (mut parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| DevMiddlewareError::Body(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Ok(Request::from_parts(parts, Body::empty())));
        }

        let started = Instant::now();
        let payload: Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                let error = ContractValidationError::invalid(
                    &name,
                    &version,
                    ValidationLocation::Body,
                    format!("Request body is not valid JSON: {}", e),
                    Vec::new(),
                );
                return Ok(Err(self.reject(error)));
            }
        };

        let (outcome, cached) = self.validate_cached(&name, &version, &payload, &bytes);
        self.record(ValidationRecord {
            timestamp: Utc::now(),
            method: method.to_string(),
            path: path.clone(),
            contract: name.clone(),
            version: version.clone(),
            success: outcome.success,
            cached,
            duration_micros: started.elapsed().as_micros() as u64,
        });

        if !outcome.success {
            tracing::info!(%path, contract = %name, %version, "dev validation rejected request body");
            let error = ContractValidationError::invalid(
                &name,
                &version,
                ValidationLocation::Body,
                outcome.error.unwrap_or_else(|| "Validation failed".to_string()),
                outcome.issues,
            );
            return Ok(Err(self.reject(error)));
        }

        let sanitized = serde_json::to_vec(&outcome.data.unwrap_or(Value::Null))?;
        parts.headers.remove(header::CONTENT_LENGTH);
        Ok(Ok(Request::from_parts(parts, Body::from(sanitized))))
    }

    fn reject(&self, error: ContractValidationError) -> Response {
        let mut body = error.body();
        body["devHints"] = json!({
            "notice": "This validation error is reported by development-only middleware and is not produced in production",
            "contract": error.contract.name,
            "version": error.contract.version,
            "suggestion": format!(
                "Compare the request body with contract {} v{}, or regenerate client types with `contracts types {}`",
                error.contract.name, error.contract.version, error.contract.name
            ),
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Outcomes keyed by `name:version:body-hash`, oldest evicted first
struct ValidationCache {
    entries: HashMap<String, ValidationOutcome>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ValidationCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &str) -> Option<ValidationOutcome> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, outcome: ValidationOutcome) {
        if self.entries.insert(key.clone(), outcome).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        self.order.clear();
        cleared
    }
}

/// `application/json` or any `+json` media type; parameters are ignored
fn is_json_content_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.strip_prefix(prefix).map_or(false, |rest| rest.starts_with('/'))
}

/// `api` and version segments like `v1`
fn is_prefix_segment(segment: &str) -> bool {
    segment.eq_ignore_ascii_case("api")
        || segment
            .strip_prefix(['v', 'V'])
            .map_or(false, |n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

// =============================================================================
// Middleware
// =============================================================================

#[derive(Debug, Error)]
enum DevMiddlewareError {
    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("failed to re-encode validated body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for DevMiddlewareError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "dev validation middleware failed");
        let body = json!({
            "error": "DevValidationMiddlewareError",
            "message": "Contract validation middleware failed",
            "detail": self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Axum middleware; install with `axum::middleware::from_fn_with_state`
pub async fn dev_validation_middleware(State(dev): State<DevValidation>, request: Request, next: Next) -> Response {
    if !dev.should_validate(request.uri().path()) {
        return next.run(request).await;
    }
    // Query validation is not implemented; only bodies are checked
    if !matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH) {
        return next.run(request).await;
    }
    // Uploads, forms and other non-JSON payloads belong to their handlers
    let json_body = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, is_json_content_type);
    if !json_body {
        return next.run(request).await;
    }

    match dev.inspect(request).await {
        Ok(Ok(request)) => next.run(request).await,
        Ok(Err(rejection)) => rejection,
        Err(e) => e.into_response(),
    }
}

/// Handler exposing [`ValidationStats`] as JSON
pub async fn stats_handler(State(dev): State<DevValidation>) -> Json<ValidationStats> {
    Json(dev.validation_stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MetadataOverrides;
    use crate::registry::ContractRegistry;
    use crate::schema::SchemaNode;

    fn dev(config: DevValidationConfig) -> DevValidation {
        let mut registry = ContractRegistry::new();
        for name in ["Task", "TaskCreate", "Project"] {
            registry.register_contract(
                name,
                "1.0.0",
                SchemaNode::object([("title", SchemaNode::string())]),
                MetadataOverrides::default(),
            );
        }
        DevValidation::with_development_mode(registry.into_shared(), TypeCache::new(), config, true)
    }

    #[test]
    fn test_heuristic_resolution() {
        let dev = dev(DevValidationConfig::default());
        assert_eq!(dev.resolve_contract("/api/v1/tasks").as_deref(), Some("Task"));
        assert_eq!(dev.resolve_contract("/projects/12").as_deref(), Some("Project"));
        assert_eq!(dev.resolve_contract("/api/taskcreate").as_deref(), Some("TaskCreate"));
        assert_eq!(dev.resolve_contract("/api/users"), None);
        assert_eq!(dev.resolve_contract("/api"), None);
    }

    #[test]
    fn test_route_table_wins() {
        let mut config = DevValidationConfig::default();
        config.route_contracts.insert("/api/tasks".to_string(), "TaskCreate".to_string());
        let dev = dev(config);
        assert_eq!(dev.resolve_contract("/api/tasks").as_deref(), Some("TaskCreate"));
        assert_eq!(dev.resolve_contract("/api/tasks/7").as_deref(), Some("TaskCreate"));
        // prefix must end on a segment boundary
        assert_eq!(dev.resolve_contract("/api/tasksx").as_deref(), Some("Task"));
    }

    #[test]
    fn test_skip_paths_and_mode() {
        let dev = dev(DevValidationConfig::default());
        assert!(dev.should_validate("/api/tasks"));
        assert!(!dev.should_validate("/health/live"));

        let registry = ContractRegistry::new().into_shared();
        let prod = DevValidation::with_development_mode(registry, TypeCache::new(), DevValidationConfig::default(), false);
        assert!(!prod.should_validate("/api/tasks"));
        assert!(!prod.watch(&[]).unwrap());
    }

    #[test]
    fn test_prefix_segments() {
        assert!(is_prefix_segment("api"));
        assert!(is_prefix_segment("v2"));
        assert!(!is_prefix_segment("v"));
        assert!(!is_prefix_segment("videos"));
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/merge-patch+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("multipart/form-data; boundary=x"));
        assert!(!is_json_content_type("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_validation_cache_is_bounded() {
        let config = DevValidationConfig {
            history_size: 2,
            ..DevValidationConfig::default()
        };
        let dev = dev(config);
        for title in ["a", "b", "c"] {
            let body = json!({ "title": title });
            let raw = serde_json::to_vec(&body).unwrap();
            let (outcome, cached) = dev.validate_cached("Task", "1.0.0", &body, &raw);
            assert!(outcome.success);
            assert!(!cached);
        }
        assert_eq!(dev.validation_stats().cached_results, 2);

        // "a" was evicted, "c" is still cached
        let first = json!({"title": "a"});
        let (_, cached) = dev.validate_cached("Task", "1.0.0", &first, &serde_json::to_vec(&first).unwrap());
        assert!(!cached);
        let last = json!({"title": "c"});
        let (_, cached) = dev.validate_cached("Task", "1.0.0", &last, &serde_json::to_vec(&last).unwrap());
        assert!(cached);

        assert_eq!(dev.clear_validation_cache(), 2);
        assert_eq!(dev.validation_stats().cached_results, 0);
    }
}
