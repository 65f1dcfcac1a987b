//! Registry Scenario Tests
//!
//! End-to-end behavior of registration, lookup, compatibility, deprecation,
//! and OpenAPI generation through the public API.

use chrono::Utc;
use contract_registry::codegen::{ContractRef, EndpointDefinition, HttpMethod, SpecInfo, TypeGenOptions};
use contract_registry::version_manager::{ComplianceIssueKind, VersionPolicy};
use contract_registry::{
    ContractFilter, ContractRegistry, MetadataOverrides, OpenApiGenerator, SchemaNode, TypeGenerator, VersionManager,
};
use serde_json::json;

fn widget_v1() -> SchemaNode {
    SchemaNode::object([("name", SchemaNode::string())])
}

fn widget_v2() -> SchemaNode {
    SchemaNode::object([
        ("name", SchemaNode::string()),
        ("color", SchemaNode::string().optional()),
    ])
}

fn widget_registry() -> ContractRegistry {
    let mut registry = ContractRegistry::new();
    assert!(registry.register_contract("Widget", "1.0.0", widget_v1(), MetadataOverrides::default()));
    assert!(registry.register_contract(
        "Widget",
        "2.0.0",
        widget_v2(),
        MetadataOverrides::default().compatible_with(["1.0.0"]),
    ));
    registry
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_missing_required_field_is_reported() {
    let registry = widget_registry();
    let outcome = registry.validate_against_contract("Widget", "1.0.0", &json!({}));

    assert!(!outcome.success);
    assert!(outcome.data.is_none());
    let message = outcome.error.unwrap();
    assert!(message.contains("name"), "message was: {}", message);
    assert!(message.contains("Required"), "message was: {}", message);
}

#[test]
fn test_explicit_compatibility_list_overrides_major_rule() {
    let registry = widget_registry();
    let result = registry.check_compatibility("Widget", "1.0.0", "2.0.0");

    assert!(result.compatible);
    assert!(result.breaking_changes.is_empty());
}

#[test]
fn test_major_change_without_list_is_breaking() {
    let mut registry = widget_registry();
    registry.register_contract("Widget", "3.0.0", widget_v2(), MetadataOverrides::default());

    let result = registry.check_compatibility("Widget", "2.0.0", "3.0.0");
    assert!(!result.compatible);
    assert_eq!(result.breaking_changes.len(), 1);
}

#[test]
fn test_mark_deprecated_sets_date() {
    let mut registry = widget_registry();
    let before = Utc::now();
    assert!(registry.mark_deprecated("Widget", "1.0.0", None));

    let contract = registry.get_contract("Widget", "1.0.0").unwrap();
    assert!(contract.metadata.deprecated);
    let date = contract.metadata.deprecation_date.unwrap();
    assert!(date >= before);
    assert!(date <= Utc::now());
}

#[test]
fn test_shared_contract_becomes_one_component() {
    let registry = widget_registry();
    let endpoints = vec![
        EndpointDefinition::new(HttpMethod::Post, "/widgets").request_body(ContractRef::pinned("Widget", "1.0.0")),
        EndpointDefinition::new(HttpMethod::Get, "/widgets/{id}").response(ContractRef::pinned("Widget", "1.0.0")),
    ];

    let spec = OpenApiGenerator::new(&registry).generate_openapi_spec(&endpoints, &SpecInfo::new("Widgets", "1.0.0"));

    let widget_keys: Vec<_> = spec.components.schemas.keys().filter(|k| k.starts_with("Widget")).collect();
    assert_eq!(widget_keys, vec!["Widget_1.0.0"]);

    let pointer = json!({"$ref": "#/components/schemas/Widget_1.0.0"});
    let post = spec.operation("/widgets", HttpMethod::Post).unwrap();
    assert_eq!(post.request_body.as_ref().unwrap().content["application/json"].schema, pointer);
    let get = spec.operation("/widgets/{id}", HttpMethod::Get).unwrap();
    assert_eq!(get.responses["200"].content["application/json"].schema, pointer);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_latest_is_numeric_maximum() {
    let mut registry = ContractRegistry::new();
    for version in ["1.2.0", "1.10.0", "2.0.0", "1.9.9"] {
        assert!(registry.register_contract("Widget", version, widget_v1(), MetadataOverrides::default()));
    }
    let latest = registry.get_latest_contract("Widget").unwrap();
    assert_eq!(latest.version().version_string(), "2.0.0");
}

#[test]
fn test_reregistration_keeps_hash_stable() {
    let mut registry = widget_registry();
    let hash = registry.hash_of("Widget", "1.0.0").cloned().unwrap();

    assert!(registry.register_contract("Widget", "1.0.0", widget_v1(), MetadataOverrides::default()));
    assert_eq!(registry.hash_of("Widget", "1.0.0"), Some(&hash));

    // same version, different schema
    assert!(!registry.register_contract("Widget", "1.0.0", widget_v2(), MetadataOverrides::default()));
    assert_eq!(registry.hash_of("Widget", "1.0.0"), Some(&hash));
}

#[test]
fn test_validation_is_idempotent() {
    let registry = widget_registry();
    let first = registry.validate_against_contract("Widget", "2.0.0", &json!({"name": "gear", "size": 3}));
    let data = first.data.clone().unwrap();
    let second = registry.validate_against_contract("Widget", "2.0.0", &data);

    assert_eq!(data, json!({"name": "gear"}));
    assert_eq!(second.data, Some(data));
}

#[test]
fn test_search_by_compatibility() {
    let registry = widget_registry();
    let found = registry.search_contracts(&ContractFilter {
        name: Some("Widget".to_string()),
        compatible_with: Some("1.0.0".to_string()),
        ..ContractFilter::default()
    });
    let versions: Vec<_> = found.iter().map(|c| c.version().version_string()).collect();
    assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
}

#[test]
fn test_generators_are_total_over_registry() {
    let mut registry = widget_registry();
    registry.register_contract(
        "Order",
        "1.0.0",
        SchemaNode::object([
            ("widget", SchemaNode::reference("Widget", None)),
            ("placed", SchemaNode::date()),
            ("lines", SchemaNode::array(SchemaNode::record(SchemaNode::number()))),
            ("status", SchemaNode::enumeration(["open", "closed"])),
        ]),
        MetadataOverrides::default(),
    );

    let generated = TypeGenerator::new().generate_all_contract_types(&registry, &TypeGenOptions::default());
    assert_eq!(generated.len(), 2);
    assert!(generated["Order"].types.contains("widget: Widget;"));
    assert_eq!(generated["Order"].metadata.dependencies, vec!["Widget".to_string()]);

    let schema = OpenApiGenerator::new(&registry).generate_contract_schema("Order", "1.0.0").unwrap();
    assert_eq!(schema["x-contract-version"], "1.0.0");
    assert_eq!(schema["properties"]["placed"]["format"], "date-time");
}

// =============================================================================
// Version Lifecycle
// =============================================================================

#[test]
fn test_deprecation_lifecycle() {
    let mut registry = widget_registry();
    let mut manager = VersionManager::new();
    assert!(manager.register_version_policy("Widget", VersionPolicy::default()));

    let long_ago = Utc::now() - chrono::Duration::days(200);
    assert!(manager.deprecate_version(&mut registry, "Widget", "1.0.0", Some(long_ago), "superseded by 2.0.0"));

    let strategy = manager.find_migration_strategy("Widget", "1.0.0", "2.0.0").unwrap();
    assert!(strategy.breaking_changes.iter().any(|c| c.contains("superseded")));

    let status = manager.validate_compliance(&registry, "Widget", "1.0.0");
    assert!(!status.compliant);
    assert!(status.has(ComplianceIssueKind::DeprecationGracePeriodExceeded));

    let supported: Vec<_> = manager
        .get_supported_versions(&registry, "Widget")
        .iter()
        .map(|c| c.version().version_string())
        .collect();
    assert_eq!(supported, vec!["2.0.0"]);

    let plan = manager.create_upgrade_plan(&registry, "Widget", "1.0.0", "2.0.0", None).unwrap();
    assert_eq!(plan.phases.len(), 3);
    assert_eq!(plan.timeline.len(), 3);
}
