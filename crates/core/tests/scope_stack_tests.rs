//! Integration tests for scope stack lifetime management
//!
//! Covers anchored singleton round trips, cascading pops, purge semantics
//! and concurrent materialization of scoped cells.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anchorage_core::{
    AnchorInstance, ComponentContainer, ComponentDescriptor, ComponentId, ComponentRegistry,
    FactoryContainer, Injector, RegistrationDriver, RegistryConfig, ResolveError, ScopeError,
    ScopeStack, TypeGraph,
};

#[derive(Debug)]
struct Connection {
    serial: usize,
}

fn id(name: &str) -> ComponentId {
    ComponentId::new(name)
}

struct Fixture {
    registry: Arc<ComponentRegistry>,
    container: Arc<dyn ComponentContainer>,
    created: Arc<AtomicUsize>,
}

impl Fixture {
    fn new(delay: Option<Duration>) -> Self {
        let mut graph = TypeGraph::new();
        graph
            .contract("Database")
            .contract("Cache")
            .concrete_extending("TenantDatabase", ["Database"])
            .concrete_extending("MemoryCache", ["Cache"])
            .concrete_extending("SessionCache", ["Cache"]);

        let mut driver = RegistrationDriver::new(graph, RegistryConfig::default()).unwrap();
        driver
            .process([
                ComponentDescriptor::new("TenantDatabase").scoped_to("Tenant"),
                ComponentDescriptor::new("MemoryCache").singleton(),
                ComponentDescriptor::new("SessionCache")
                    .scoped_to("Session")
                    .bind_as("Cache"),
            ])
            .unwrap();

        let created = Arc::new(AtomicUsize::new(0));
        let mut container = FactoryContainer::new();
        for name in ["TenantDatabase", "MemoryCache", "SessionCache"] {
            let created = Arc::clone(&created);
            container.register_constructor(name, move |_| {
                if let Some(delay) = delay {
                    std::thread::sleep(delay);
                }
                Ok(Connection {
                    serial: created.fetch_add(1, Ordering::SeqCst),
                })
            });
        }

        let registry = driver.seal(&mut container).unwrap();
        Self {
            registry,
            container: Arc::new(container),
            created,
        }
    }

    fn injector(&self) -> Injector {
        Injector::new(Arc::clone(&self.registry), Arc::clone(&self.container))
    }
}

#[test]
fn test_scope_round_trip_with_purge() {
    let fixture = Fixture::new(None);
    let mut injector = fixture.injector();
    let tenant = id("Tenant");

    let first_anchor = AnchorInstance::new("tenant-1".to_string());
    injector.push_scope(tenant.clone(), first_anchor.clone()).unwrap();
    let first = injector.resolve_as::<Connection>(&id("Database")).unwrap();
    let again = injector.resolve_as::<Connection>(&id("Database")).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    injector.pop_scope_and_purge(&tenant, &first_anchor).unwrap();
    assert!(!fixture.registry.cells().holds(&first_anchor));

    let second_anchor = AnchorInstance::new("tenant-2".to_string());
    injector.push_scope(tenant.clone(), second_anchor).unwrap();
    let second = injector.resolve_as::<Connection>(&id("Database")).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(fixture.created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_plain_pop_keeps_cells_for_the_same_anchor() {
    let fixture = Fixture::new(None);
    let mut injector = fixture.injector();
    let tenant = id("Tenant");
    let anchor = AnchorInstance::new(7u64);

    injector.push_scope(tenant.clone(), anchor.clone()).unwrap();
    let first = injector.resolve_as::<Connection>(&id("Database")).unwrap();
    injector.pop_scope(&tenant).unwrap();

    let error = injector.resolve(&id("Database")).unwrap_err();
    assert!(matches!(error, ResolveError::OutOfScope { .. }));

    injector.push_scope(tenant.clone(), anchor.clone()).unwrap();
    let second = injector.resolve_as::<Connection>(&id("Database")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // Another stack sees the same singleton for the same anchor instance
    let mut other = fixture.injector();
    other.push_scope(tenant, anchor).unwrap();
    let third = other.resolve_as::<Connection>(&id("Database")).unwrap();
    assert!(Arc::ptr_eq(&first, &third));
}

#[test]
fn test_plain_pop_releases_dropped_anchors() {
    let fixture = Fixture::new(None);
    let first = Arc::new(String::from("tenant-0"));
    let watch = Arc::downgrade(&first);

    for round in 0..500 {
        let mut injector = fixture.injector();
        let anchor = if round == 0 {
            AnchorInstance::from_arc(Arc::clone(&first))
        } else {
            AnchorInstance::new(format!("tenant-{}", round))
        };
        injector.push_scope("Tenant", anchor).unwrap();
        injector.resolve(&id("Database")).unwrap();
        injector.pop_scope(&id("Tenant")).unwrap();
    }
    // The first anchor is still held here, so its cells survived every pop
    assert_eq!(fixture.registry.cells().len(), 2);
    assert_eq!(fixture.registry.cells().anchors(), 1);

    drop(first);
    assert!(watch.upgrade().is_none());
    assert_eq!(fixture.registry.cells().prune(), 2);
    assert!(fixture.registry.cells().is_empty());
    assert_eq!(fixture.created.load(Ordering::SeqCst), 500);
}

#[test]
fn test_cascade_pop_empties_stack() {
    let fixture = Fixture::new(None);
    let mut stack = ScopeStack::new(Arc::clone(&fixture.registry));

    stack.push(id("A"), AnchorInstance::new(1u8)).unwrap();
    stack.push(id("B"), AnchorInstance::new(2u8)).unwrap();
    stack.push(id("C"), AnchorInstance::new(3u8)).unwrap();
    assert_eq!(stack.active_anchor_types(), vec![id("A"), id("B"), id("C")]);

    stack.pop(&id("A")).unwrap();
    assert_eq!(stack.depth(), 0);
    assert!(stack.push(id("A"), AnchorInstance::new(4u8)).is_ok());
}

#[test]
fn test_pop_of_middle_frame_cascades() {
    let fixture = Fixture::new(None);
    let mut stack = ScopeStack::new(Arc::clone(&fixture.registry));

    stack.push(id("A"), AnchorInstance::new(1u8)).unwrap();
    stack.push(id("B"), AnchorInstance::new(2u8)).unwrap();
    stack.push(id("C"), AnchorInstance::new(3u8)).unwrap();

    stack.pop(&id("B")).unwrap();
    assert_eq!(stack.active_anchor_types(), vec![id("A")]);
    assert_eq!(
        stack.pop(&id("C")),
        Err(ScopeError::ScopeNotActive { anchor_type: id("C") })
    );
}

#[test]
fn test_duplicate_anchor_type_is_rejected() {
    let fixture = Fixture::new(None);
    let mut injector = fixture.injector();

    injector.push_scope("Tenant", AnchorInstance::new(1u8)).unwrap();
    let error = injector
        .push_scope("Tenant", AnchorInstance::new(2u8))
        .unwrap_err();
    assert_eq!(error, ScopeError::ScopeAlreadyActive { anchor_type: id("Tenant") });
    assert_eq!(injector.stack().depth(), 1);
}

#[test]
fn test_purge_with_foreign_anchor_leaves_stack_untouched() {
    let fixture = Fixture::new(None);
    let mut injector = fixture.injector();
    let anchor = AnchorInstance::new(1u8);
    let stranger = AnchorInstance::new(1u8);

    injector.push_scope("Tenant", anchor.clone()).unwrap();
    let error = injector
        .pop_scope_and_purge(&id("Tenant"), &stranger)
        .unwrap_err();
    assert_eq!(error, ScopeError::AnchorInstanceMismatch { anchor_type: id("Tenant") });
    assert!(injector.is_scoped_for(&id("Tenant")));

    injector.pop_scope_and_purge(&id("Tenant"), &anchor).unwrap();
    assert!(!injector.is_scoped_for(&id("Tenant")));
}

#[test]
fn test_innermost_scope_shadows_unscoped_binding() {
    let fixture = Fixture::new(None);
    let mut injector = fixture.injector();

    let global = injector.resolve_as::<Connection>(&id("Cache")).unwrap();
    let session = AnchorInstance::new("session".to_string());
    injector.push_scope("Session", session.clone()).unwrap();

    let scoped = injector.resolve_as::<Connection>(&id("Cache")).unwrap();
    assert!(!Arc::ptr_eq(&global, &scoped));

    let anchor = injector.resolve_as::<String>(&id("Session")).unwrap();
    assert_eq!(anchor.as_str(), "session");

    injector.pop_scope_and_purge(&id("Session"), &session).unwrap();
    let after = injector.resolve_as::<Connection>(&id("Cache")).unwrap();
    assert!(Arc::ptr_eq(&global, &after));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scopes_share_one_instance_per_anchor() {
    let fixture = Arc::new(Fixture::new(Some(Duration::from_millis(20))));
    let anchor = AnchorInstance::new("shared-tenant".to_string());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let fixture = Arc::clone(&fixture);
        let anchor = anchor.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let mut injector = fixture.injector();
            injector.push_scope("Tenant", anchor).unwrap();
            injector
                .resolve_as::<Connection>(&ComponentId::new("Database"))
                .unwrap()
        }));
    }

    let mut serials = Vec::new();
    for handle in handles {
        serials.push(handle.await.unwrap().serial);
    }

    assert!(serials.iter().all(|serial| *serial == serials[0]));
    assert_eq!(fixture.created.load(Ordering::SeqCst), 1);
}
