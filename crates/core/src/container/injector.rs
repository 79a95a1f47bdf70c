use std::any::Any;
use std::sync::Arc;

use uuid::Uuid;

use crate::container::identity::ComponentId;
use crate::container::ioc_container::{ComponentContainer, Instance};
use crate::container::registry::ComponentRegistry;
use crate::container::resolver::{ListView, ResolutionContext};
use crate::container::scope_stack::{AnchorInstance, ScopeStack};
use crate::errors::{ResolveError, ScopeError};

/// Anchor value pushed by `Injector::begin_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    pub id: Uuid,
}

impl RequestScope {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolution entry point for one logical unit of work.
///
/// Owns its scope stack and shares the sealed registry and container with
/// every other injector built from them.
pub struct Injector {
    registry: Arc<ComponentRegistry>,
    container: Arc<dyn ComponentContainer>,
    stack: ScopeStack,
}

impl Injector {
    pub fn new(registry: Arc<ComponentRegistry>, container: Arc<dyn ComponentContainer>) -> Self {
        let stack = ScopeStack::new(Arc::clone(&registry));
        Self {
            registry,
            container,
            stack,
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn stack(&self) -> &ScopeStack {
        &self.stack
    }

    /// Open a scope for `anchor_type`
    pub fn push_scope(&mut self, anchor_type: impl Into<ComponentId>, anchor: AnchorInstance) -> Result<(), ScopeError> {
        self.stack.push(anchor_type.into(), anchor)
    }

    /// Open a scope anchored to `value`, using its type name as anchor type
    pub fn push_scope_value<T: Any + Send + Sync>(&mut self, value: T) -> Result<AnchorInstance, ScopeError> {
        let anchor = AnchorInstance::new(value);
        self.stack.push(ComponentId::of::<T>(), anchor.clone())?;
        Ok(anchor)
    }

    pub fn pop_scope(&mut self, anchor_type: &ComponentId) -> Result<(), ScopeError> {
        self.stack.pop(anchor_type)
    }

    pub fn pop_scope_and_purge(&mut self, anchor_type: &ComponentId, anchor: &AnchorInstance) -> Result<(), ScopeError> {
        self.stack.pop_and_purge(anchor_type, anchor)
    }

    pub fn is_scoped_for(&self, anchor_type: &ComponentId) -> bool {
        self.stack.is_active(anchor_type)
    }

    /// Open a request scope under the configured request anchor type
    pub fn begin_request(&mut self) -> Result<AnchorInstance, ScopeError> {
        let anchor = AnchorInstance::new(RequestScope::new());
        let anchor_type = self.registry.config().request_anchor.clone();
        self.stack.push(anchor_type, anchor.clone())?;
        Ok(anchor)
    }

    /// Close the request scope and drop its request singletons
    pub fn end_request(&mut self, anchor: &AnchorInstance) -> Result<(), ScopeError> {
        let anchor_type = self.registry.config().request_anchor.clone();
        self.stack.pop_and_purge(&anchor_type, anchor)
    }

    fn context(&self) -> ResolutionContext<'_> {
        ResolutionContext::new(&self.registry, self.container.as_ref(), &self.stack)
    }

    pub fn resolve(&self, contract: &ComponentId) -> Result<Instance, ResolveError> {
        self.context().resolve(contract)
    }

    pub fn resolve_as<T: Any + Send + Sync>(&self, contract: &ComponentId) -> Result<Arc<T>, ResolveError> {
        self.context().resolve_as(contract)
    }

    /// Resolve `T` registered under its own type name
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ResolveError> {
        self.context().get()
    }

    /// Lazy view over the members of a list contract
    pub fn resolve_list(&self, list: &ComponentId) -> ListView<'_> {
        ListView::new(&self.registry, self.container.as_ref(), &self.stack, list)
    }

    /// Whether resolving `contract` can succeed in the current scopes
    pub fn is_registered(&self, contract: &ComponentId) -> bool {
        self.stack.lookup(contract).is_some() || self.registry.bindings().get(contract).is_some()
    }

    pub fn known_types(&self, contract: &ComponentId) -> &[ComponentId] {
        self.registry.resolve_known_type(contract)
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("registry", &self.registry.id())
            .field("scopes", &self.stack.active_anchor_types())
            .finish()
    }
}
