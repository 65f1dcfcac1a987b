//! Validation Pipe
//!
//! Handlers run each extracted argument through [`ValidationPipe::transform`]
//! and continue with the coerced value it returns, never the raw input.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::ValidationLocation;
use crate::registry::SharedRegistry;
use crate::schema::ValidationIssue;

/// Where a handler argument was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamOrigin {
    Body,
    Query,
    Param,
}

impl ParamOrigin {
    pub fn location(&self) -> ValidationLocation {
        match self {
            ParamOrigin::Body => ValidationLocation::Body,
            ParamOrigin::Query => ValidationLocation::Query,
            ParamOrigin::Param => ValidationLocation::Params,
        }
    }
}

/// The contract a handler argument must satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentMetadata {
    pub origin: ParamOrigin,
    pub contract_name: String,
    /// Latest registered version when unset
    pub version: Option<String>,
    /// Reported location, when it should differ from the origin's
    pub location_override: Option<ValidationLocation>,
}

impl ArgumentMetadata {
    pub fn new(origin: ParamOrigin, contract_name: impl Into<String>) -> Self {
        Self {
            origin,
            contract_name: contract_name.into(),
            version: None,
            location_override: None,
        }
    }

    pub fn body(contract_name: impl Into<String>) -> Self {
        Self::new(ParamOrigin::Body, contract_name)
    }

    pub fn query(contract_name: impl Into<String>) -> Self {
        Self::new(ParamOrigin::Query, contract_name)
    }

    pub fn param(contract_name: impl Into<String>) -> Self {
        Self::new(ParamOrigin::Param, contract_name)
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn location(mut self, location: ValidationLocation) -> Self {
        self.location_override = Some(location);
        self
    }

    pub fn resolved_location(&self) -> ValidationLocation {
        self.location_override.unwrap_or_else(|| self.origin.location())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractIdentity {
    pub name: String,
    /// Empty when no version could be resolved
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No registered version matched the request (500)
    ContractNotFound,
    /// The value does not satisfy the contract (400)
    InvalidData,
}

/// Structured validation failure returned to the client
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ContractValidationError {
    pub kind: FailureKind,
    pub contract: ContractIdentity,
    pub location: ValidationLocation,
    pub message: String,
    pub issues: Vec<ValidationIssue>,
}

impl ContractValidationError {
    pub fn contract_not_found(name: &str, version: Option<&str>, location: ValidationLocation) -> Self {
        let message = match version {
            Some(v) => format!("Contract {} version {} not found", name, v),
            None => format!("Contract {} not found", name),
        };
        Self {
            kind: FailureKind::ContractNotFound,
            contract: ContractIdentity {
                name: name.to_string(),
                version: version.unwrap_or_default().to_string(),
            },
            location,
            message,
            issues: Vec::new(),
        }
    }

    pub fn invalid(
        name: &str,
        version: &str,
        location: ValidationLocation,
        message: impl Into<String>,
        issues: Vec<ValidationIssue>,
    ) -> Self {
        Self {
            kind: FailureKind::InvalidData,
            contract: ContractIdentity {
                name: name.to_string(),
                version: version.to_string(),
            },
            location,
            message: message.into(),
            issues,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            FailureKind::ContractNotFound => StatusCode::INTERNAL_SERVER_ERROR,
            FailureKind::InvalidData => StatusCode::BAD_REQUEST,
        }
    }

    /// JSON body sent to the client
    pub fn body(&self) -> Value {
        let error = match self.kind {
            FailureKind::ContractNotFound => "ContractNotFound",
            FailureKind::InvalidData => "ContractValidationError",
        };
        let mut body = json!({
            "error": error,
            "contract": self.contract,
            "location": self.location,
            "message": self.message,
        });
        if !self.issues.is_empty() {
            body["issues"] = json!(self.issues);
        }
        body
    }
}

impl IntoResponse for ContractValidationError {
    fn into_response(self) -> Response {
        match self.kind {
            FailureKind::ContractNotFound => {
                tracing::error!(contract = %self.contract.name, error = %self, "validation contract missing")
            }
            FailureKind::InvalidData => {
                tracing::debug!(contract = %self.contract.name, error = %self, "request rejected by contract")
            }
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// Validates handler arguments against registered contracts
#[derive(Clone)]
pub struct ValidationPipe {
    registry: SharedRegistry,
}

impl ValidationPipe {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Validate `value` and return the coerced data
    pub fn transform(&self, value: &Value, metadata: &ArgumentMetadata) -> Result<Value, ContractValidationError> {
        let name = metadata.contract_name.as_str();
        let location = metadata.resolved_location();
        let registry = self.registry.read();

        let version = match &metadata.version {
            Some(v) if registry.get_contract(name, v).is_some() => v.clone(),
            Some(v) => return Err(ContractValidationError::contract_not_found(name, Some(v), location)),
            None => match registry.get_latest_contract(name) {
                Some(contract) => contract.version().version_string(),
                None => return Err(ContractValidationError::contract_not_found(name, None, location)),
            },
        };

        let outcome = registry.validate_against_contract(name, &version, value);
        if outcome.success {
            return Ok(outcome.data.unwrap_or(Value::Null));
        }
        Err(ContractValidationError::invalid(
            name,
            &version,
            location,
            outcome.error.unwrap_or_else(|| "Validation failed".to_string()),
            outcome.issues,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MetadataOverrides;
    use crate::registry::ContractRegistry;
    use crate::schema::SchemaNode;

    fn pipe() -> ValidationPipe {
        let mut registry = ContractRegistry::new();
        registry.register_contract(
            "TaskCreate",
            "1.0.0",
            SchemaNode::object([
                ("title", SchemaNode::string().min_length(1)),
                ("done", SchemaNode::boolean().with_default(false)),
            ]),
            MetadataOverrides::default(),
        );
        ValidationPipe::new(registry.into_shared())
    }

    #[test]
    fn test_transform_returns_coerced_data() {
        let out = pipe()
            .transform(&json!({"title": "Write docs", "extra": 1}), &ArgumentMetadata::body("TaskCreate"))
            .unwrap();
        assert_eq!(out, json!({"title": "Write docs", "done": false}));
    }

    #[test]
    fn test_invalid_body() {
        let err = pipe()
            .transform(&json!({"title": ""}), &ArgumentMetadata::body("TaskCreate"))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.contract.version, "1.0.0");
        let body = err.body();
        assert_eq!(body["error"], "ContractValidationError");
        assert_eq!(body["location"], "body");
        assert_eq!(body["issues"][0]["path"], "title");
    }

    #[test]
    fn test_location_inference_and_override() {
        assert_eq!(ArgumentMetadata::param("X").resolved_location(), ValidationLocation::Params);
        assert_eq!(ArgumentMetadata::query("X").resolved_location(), ValidationLocation::Query);
        assert_eq!(
            ArgumentMetadata::body("X").location(ValidationLocation::Query).resolved_location(),
            ValidationLocation::Query
        );
    }

    #[test]
    fn test_unknown_contract() {
        let err = pipe()
            .transform(&json!({}), &ArgumentMetadata::body("Nope"))
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::ContractNotFound);
        assert_eq!(err.body()["error"], "ContractNotFound");

        let err = pipe()
            .transform(&json!({}), &ArgumentMetadata::body("TaskCreate").version("2.0.0"))
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::ContractNotFound);
    }
}
