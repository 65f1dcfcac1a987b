//! Validation Gateway Integration Tests
//!
//! Drives the pipe and the dev middleware through real axum routers.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use contract_registry::codegen::TypeCache;
use contract_registry::gateway::dev::MAX_BODY_BYTES;
use contract_registry::gateway::{
    dev_validation_middleware, stats_handler, ArgumentMetadata, ContractValidationError, DevValidationConfig,
};
use contract_registry::{ContractRegistry, DevValidation, MetadataOverrides, SchemaNode, SharedRegistry, ValidationPipe};

fn shared_registry() -> SharedRegistry {
    let mut registry = ContractRegistry::new();
    registry.register_contract(
        "Task",
        "1.0.0",
        SchemaNode::object([
            ("title", SchemaNode::string().min_length(1)),
            ("priority", SchemaNode::integer().with_default(3)),
        ]),
        MetadataOverrides::default(),
    );
    registry.into_shared()
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn upload(body: String) -> String {
    format!("received {} bytes", body.len())
}

async fn read_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn dev_app(dev: DevValidation) -> Router {
    Router::new()
        .route("/api/v1/tasks", post(echo))
        .route("/api/v1/tasks/upload", post(upload))
        .route("/health", post(echo))
        .route("/__contracts/stats", get(stats_handler))
        .layer(from_fn_with_state(dev.clone(), dev_validation_middleware))
        .with_state(dev)
}

// =============================================================================
// Pipe
// =============================================================================

async fn create_task(
    State(pipe): State<ValidationPipe>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ContractValidationError> {
    let task = pipe.transform(&body, &ArgumentMetadata::body("Task"))?;
    Ok((StatusCode::CREATED, Json(task)))
}

fn pipe_app() -> Router {
    Router::new()
        .route("/tasks", post(create_task))
        .with_state(ValidationPipe::new(shared_registry()))
}

#[tokio::test]
async fn test_pipe_handler_receives_coerced_body() {
    let resp = pipe_app()
        .oneshot(post_json("/tasks", json!({"title": "Ship it", "owner": "ops"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(read_json(resp).await, json!({"title": "Ship it", "priority": 3}));
}

#[tokio::test]
async fn test_pipe_rejection_is_structured() {
    let resp = pipe_app()
        .oneshot(post_json("/tasks", json!({"title": ""})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = read_json(resp).await;
    assert_eq!(body["error"], "ContractValidationError");
    assert_eq!(body["contract"], json!({"name": "Task", "version": "1.0.0"}));
    assert_eq!(body["location"], "body");
    assert_eq!(body["issues"][0]["path"], "title");
}

// =============================================================================
// Dev Middleware
// =============================================================================

#[tokio::test]
async fn test_dev_middleware_sanitizes_valid_body() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), true);
    let resp = dev_app(dev.clone())
        .oneshot(post_json("/api/v1/tasks", json!({"title": "Write tests", "debug": true})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await, json!({"title": "Write tests", "priority": 3}));

    let stats = dev.validation_stats();
    assert_eq!(stats.last_validations.len(), 1);
    assert_eq!(stats.last_validations[0].contract, "Task");
    assert!(stats.last_validations[0].success);
}

#[tokio::test]
async fn test_dev_middleware_rejects_with_hints() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), true);
    let resp = dev_app(dev)
        .oneshot(post_json("/api/v1/tasks", json!({"priority": 1})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = read_json(resp).await;
    assert_eq!(body["error"], "ContractValidationError");
    assert_eq!(body["devHints"]["contract"], "Task");
    assert_eq!(body["devHints"]["version"], "1.0.0");
}

#[tokio::test]
async fn test_dev_middleware_rejects_malformed_json() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), true);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = dev_app(dev).oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = read_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("not valid JSON"));
}

#[tokio::test]
async fn test_dev_middleware_ignores_non_json_bodies() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), true);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks/upload")
        .header("content-type", "text/plain")
        .body(Body::from("title,priority\nShip it,1\n"))
        .unwrap();
    let resp = dev_app(dev.clone()).oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"received 25 bytes");
    assert!(dev.validation_stats().last_validations.is_empty());
}

#[tokio::test]
async fn test_dev_middleware_validates_json_suffix_types() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), true);
    let request = Request::builder()
        .method("PATCH")
        .uri("/api/v1/tasks")
        .header("content-type", "application/merge-patch+json; charset=utf-8")
        .body(Body::from(json!({"priority": 2}).to_string()))
        .unwrap();
    let resp = Router::new()
        .route("/api/v1/tasks", patch(echo))
        .layer(from_fn_with_state(dev, dev_validation_middleware))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(resp).await["devHints"]["contract"], "Task");
}

#[tokio::test]
async fn test_dev_middleware_reports_oversized_body() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), true);
    let oversized = format!("{{\"title\": \"{}\"}}", "x".repeat(MAX_BODY_BYTES));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks")
        .header("content-type", "application/json")
        .body(Body::from(oversized))
        .unwrap();
    let resp = dev_app(dev).oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(resp).await;
    assert_eq!(body["error"], "DevValidationMiddlewareError");
    assert!(body["detail"].as_str().unwrap().contains("failed to read request body"));
}

#[tokio::test]
async fn test_dev_middleware_passes_through_outside_development() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), false);
    let resp = dev_app(dev)
        .oneshot(post_json("/api/v1/tasks", json!({"priority": 1})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await, json!({"priority": 1}));
}

#[tokio::test]
async fn test_dev_middleware_skips_health() {
    let mut registry = ContractRegistry::new();
    registry.register_contract(
        "Health",
        "1.0.0",
        SchemaNode::object([("status", SchemaNode::string())]),
        MetadataOverrides::default(),
    );
    let dev = DevValidation::with_development_mode(registry.into_shared(), TypeCache::new(), DevValidationConfig::default(), true);
    let resp = dev_app(dev)
        .oneshot(post_json("/health", json!({"unexpected": true})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let dev = DevValidation::with_development_mode(shared_registry(), TypeCache::new(), DevValidationConfig::default(), true);
    let request = Request::builder().uri("/__contracts/stats").body(Body::empty()).unwrap();
    let resp = dev_app(dev).oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await;
    assert_eq!(body["enabled"], true);
    assert_eq!(body["isDevelopmentMode"], true);
    assert_eq!(body["watcherActive"], false);
}
