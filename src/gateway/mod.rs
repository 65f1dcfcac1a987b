//! Validation Gateway
//!
//! Enforces contracts at HTTP request boundaries.
//!
//! - `pipe`: explicit per-argument validation for handlers
//! - `dev`: development-only axum middleware with inferred contracts
//! - `watcher`: filesystem hot reload driving the dev middleware's caches

pub mod dev;
pub mod pipe;
pub mod watcher;

use serde::{Deserialize, Serialize};

pub use dev::{dev_validation_middleware, stats_handler, DevValidation, DevValidationConfig, ValidationRecord, ValidationStats};
pub use pipe::{ArgumentMetadata, ContractIdentity, ContractValidationError, ParamOrigin, ValidationPipe};

/// Part of the request a validated value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLocation {
    Body,
    Query,
    Params,
}

impl std::fmt::Display for ValidationLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValidationLocation::Body => "body",
            ValidationLocation::Query => "query",
            ValidationLocation::Params => "params",
        })
    }
}
