use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::container::binding::{Binding, BindingTable};
use crate::container::hierarchy::TypeGraph;
use crate::container::identity::ComponentId;
use crate::container::known_types::KnownTypeMap;
use crate::container::list::ListAggregator;
use crate::container::scope::ScopeRegistry;
use crate::container::scope_stack::ScopeCellStore;

/// Sealed result of registration.
///
/// Everything except the scope cell store is immutable, so one registry is
/// shared behind an `Arc` by every injector built from it.
#[derive(Debug)]
pub struct ComponentRegistry {
    id: Uuid,
    config: RegistryConfig,
    graph: TypeGraph,
    bindings: BindingTable,
    lists: ListAggregator,
    scopes: ScopeRegistry,
    known_types: KnownTypeMap,
    cells: ScopeCellStore,
}

impl ComponentRegistry {
    pub(crate) fn new(
        config: RegistryConfig,
        graph: TypeGraph,
        bindings: BindingTable,
        lists: ListAggregator,
        known_types: KnownTypeMap,
    ) -> Self {
        let scopes = ScopeRegistry::from_bindings(bindings.anchored());
        Self {
            id: Uuid::new_v4(),
            config,
            graph,
            bindings,
            lists,
            scopes,
            known_types,
            cells: ScopeCellStore::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn lists(&self) -> &ListAggregator {
        &self.lists
    }

    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    pub fn known_types(&self) -> &KnownTypeMap {
        &self.known_types
    }

    pub fn cells(&self) -> &ScopeCellStore {
        &self.cells
    }

    /// Unscoped winner for a contract
    pub fn binding(&self, contract: &ComponentId) -> Option<&Binding> {
        self.bindings.get(contract)
    }

    pub fn resolve_known_type(&self, contract: &ComponentId) -> &[ComponentId] {
        self.known_types.resolve(contract)
    }

    /// Whether any anchored binding activates under `anchor_type`
    pub fn is_scope_anchor(&self, anchor_type: &ComponentId) -> bool {
        !self.scopes.bindings_for(anchor_type).is_empty()
    }
}
