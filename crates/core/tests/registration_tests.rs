//! Integration tests for binding conflict resolution and list aggregation
//!
//! Exercises the registration driver end to end: ordering independence of
//! narrowing, ambiguity detection, environment filtering and list policies.

use std::collections::BTreeSet;

use anchorage_core::{
    ComponentDescriptor, ComponentId, EnvironmentTag, ListDeclaration, RegistrationDriver,
    RegistrationError, RegistryConfig, TypeGraph,
};

fn id(name: &str) -> ComponentId {
    ComponentId::new(name)
}

fn graph() -> TypeGraph {
    let mut graph = TypeGraph::new();
    graph
        .contract("ContractX")
        .contract("Handler")
        .concrete_extending("Base", ["ContractX"])
        .concrete_extending("Derived", ["Base"])
        .concrete_extending("Other", ["ContractX"])
        .concrete_extending("AuditHandler", ["Handler"])
        .concrete_extending("SignedAuditHandler", ["AuditHandler"])
        .concrete_extending("MetricsHandler", ["Handler"])
        .contract("Cache")
        .concrete_extending("MemoryCache", ["Cache"])
        .concrete_extending("RedisCache", ["Cache"]);
    graph
}

fn driver() -> RegistrationDriver {
    RegistrationDriver::new(graph(), RegistryConfig::default()).unwrap()
}

fn winner(driver: &RegistrationDriver, contract: &str) -> Option<ComponentId> {
    driver
        .bindings()
        .get(&id(contract))
        .map(|binding| binding.implementation.clone())
}

#[test]
fn test_narrowing_wins_in_either_order() {
    let mut forward = driver();
    forward
        .process([
            ComponentDescriptor::new("Base").singleton(),
            ComponentDescriptor::new("Derived").singleton(),
        ])
        .unwrap();

    let mut backward = driver();
    backward
        .process([
            ComponentDescriptor::new("Derived").singleton(),
            ComponentDescriptor::new("Base").singleton(),
        ])
        .unwrap();

    assert_eq!(winner(&forward, "ContractX"), Some(id("Derived")));
    assert_eq!(winner(&backward, "ContractX"), Some(id("Derived")));
    // Base is not a contract, so Derived never competes for it
    assert_eq!(winner(&forward, "Base"), Some(id("Base")));
    assert_eq!(winner(&forward, "Derived"), Some(id("Derived")));
}

#[test]
fn test_narrowing_across_batches() {
    let mut driver = driver();
    driver
        .process([ComponentDescriptor::new("Base").singleton()])
        .unwrap();
    let summary = driver
        .process([ComponentDescriptor::new("Derived").singleton()])
        .unwrap();

    assert_eq!(summary.bound, 1);
    assert_eq!(summary.replaced, 1);
    assert_eq!(winner(&driver, "ContractX"), Some(id("Derived")));
}

#[test]
fn test_unrelated_implementations_are_ambiguous_in_either_order() {
    for (first, second) in [("Base", "Other"), ("Other", "Base")] {
        let mut driver = driver();
        let error = driver
            .process([
                ComponentDescriptor::new(first).singleton(),
                ComponentDescriptor::new(second).singleton(),
            ])
            .unwrap_err();

        assert_eq!(
            error,
            RegistrationError::AmbiguousBinding {
                contract: id("ContractX"),
                implementation: id(second),
                existing: id(first),
            }
        );
        assert!(driver.bindings().is_empty());
    }
}

#[test]
fn test_explicit_override_resolves_ambiguity() {
    let mut driver = driver();
    driver
        .process([
            ComponentDescriptor::new("Base").singleton(),
            ComponentDescriptor::new("Other").singleton().overrides("Base"),
        ])
        .unwrap();
    assert_eq!(winner(&driver, "ContractX"), Some(id("Other")));

    let mut reversed = self::driver();
    let summary = reversed
        .process([
            ComponentDescriptor::new("Other").singleton().overrides("Base"),
            ComponentDescriptor::new("Base").singleton(),
        ])
        .unwrap();
    assert_eq!(summary.rejected, 1);
    assert_eq!(winner(&reversed, "ContractX"), Some(id("Other")));
}

#[test]
fn test_reprocessing_same_batch_is_idempotent() {
    let batch = vec![
        ComponentDescriptor::new("Derived").singleton(),
        ComponentDescriptor::new("AuditHandler")
            .transient()
            .in_list(ListDeclaration::new(["Handler"])),
    ];

    let mut driver = driver();
    driver.process(batch.clone()).unwrap();
    let summary = driver.process(batch).unwrap();

    assert_eq!(summary.bound, 0);
    assert_eq!(summary.replaced, 0);
    assert_eq!(driver.lists().members(&id("Handler")), vec![id("AuditHandler")]);
}

#[test]
fn test_environment_restriction_filters_candidates() {
    let descriptors = vec![
        ComponentDescriptor::new("Base")
            .singleton()
            .restrict_to(["production"]),
        ComponentDescriptor::new("Other")
            .singleton()
            .restrict_to(["development", "test"]),
    ];

    let production: BTreeSet<EnvironmentTag> = [EnvironmentTag::new("production")].into_iter().collect();
    let mut driver = driver();
    let summary = driver
        .process_for_environment(descriptors.clone(), &production)
        .unwrap();
    assert_eq!(summary.skipped_environment, 1);
    assert_eq!(winner(&driver, "ContractX"), Some(id("Base")));

    let config = RegistryConfig::with_tags(["test"]);
    let mut driver = RegistrationDriver::new(graph(), config).unwrap();
    driver.process(descriptors).unwrap();
    assert_eq!(winner(&driver, "ContractX"), Some(id("Other")));
}

#[test]
fn test_list_with_replacing_base_keeps_only_subtype() {
    let mut driver = driver();
    driver
        .process([
            ComponentDescriptor::new("AuditHandler")
                .transient()
                .bind_as("AuditHandler")
                .in_list(ListDeclaration::new(["Handler"]).replacing_supertypes()),
            ComponentDescriptor::new("SignedAuditHandler")
                .transient()
                .bind_as("SignedAuditHandler")
                .in_list(ListDeclaration::new(["Handler"])),
            ComponentDescriptor::new("MetricsHandler")
                .transient()
                .bind_as("MetricsHandler")
                .in_list(ListDeclaration::new(["Handler"])),
        ])
        .unwrap();

    assert!(driver.bindings().get(&id("Handler")).is_none());
    assert_eq!(
        driver.lists().members(&id("Handler")),
        vec![id("MetricsHandler"), id("SignedAuditHandler")]
    );
}

#[test]
fn test_list_membership_must_be_satisfied() {
    let mut driver = driver();
    let error = driver
        .process([ComponentDescriptor::new("Base")
            .singleton()
            .in_list(ListDeclaration::new(["Handler"]))])
        .unwrap_err();

    assert_eq!(
        error,
        RegistrationError::ContractNotSatisfied {
            contract: id("Handler"),
            implementation: id("Base"),
            usage: " for list injection",
        }
    );
}

#[test]
fn test_anchored_contract_cannot_move_between_anchor_types() {
    let mut driver = driver();
    let error = driver
        .process([
            ComponentDescriptor::new("Base").scoped_to("Tenant"),
            ComponentDescriptor::new("Derived").scoped_to("Session"),
        ])
        .unwrap_err();

    assert!(error.is_anchor_conflict());
    assert_eq!(error.contract(), Some(&id("ContractX")));
}

#[test]
fn test_unrelated_implementations_on_different_anchor_types_conflict() {
    let mut driver = driver();
    let error = driver
        .process([
            ComponentDescriptor::new("MemoryCache")
                .scoped_to("Tenant")
                .bind_as("Cache"),
            ComponentDescriptor::new("RedisCache")
                .scoped_to("Session")
                .bind_as("Cache"),
        ])
        .unwrap_err();

    assert_eq!(
        error,
        RegistrationError::AnchorConflict {
            contract: id("Cache"),
            implementation: id("RedisCache"),
            anchor_type: id("Session"),
            existing: id("MemoryCache"),
            existing_anchor: id("Tenant"),
        }
    );
    assert!(driver.bindings().is_empty());
}

#[test]
fn test_unknown_implementation_is_reported() {
    let mut driver = driver();
    let error = driver
        .process([ComponentDescriptor::new("Ghost").singleton()])
        .unwrap_err();
    assert!(matches!(error, RegistrationError::UnknownComponent { .. }));
}
