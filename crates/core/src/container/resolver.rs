use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::container::identity::ComponentId;
use crate::container::ioc_container::{ComponentContainer, Instance};
use crate::container::registry::ComponentRegistry;
use crate::container::scope_stack::{ScopeStack, ScopedSlot};
use crate::errors::ResolveError;

/// Contracts currently being resolved, outermost first
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    pub contracts: Vec<ComponentId>,
}

impl ResolutionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, contract: ComponentId) {
        self.contracts.push(contract);
    }

    pub fn pop(&mut self) -> Option<ComponentId> {
        self.contracts.pop()
    }

    /// Check if the path contains a contract (for cycle detection)
    pub fn contains(&self, contract: &ComponentId) -> bool {
        self.contracts.contains(contract)
    }

    pub fn depth(&self) -> usize {
        self.contracts.len()
    }

    /// Get the path as a string for error messages
    pub fn path_string(&self) -> String {
        self.contracts
            .iter()
            .map(ComponentId::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// State of one top-level resolution.
///
/// Factories receive the context to resolve their own dependencies; those
/// lookups see the same scope stack and share the per-resolve cache, and the
/// resolution path catches circular dependencies.
pub struct ResolutionContext<'a> {
    registry: &'a ComponentRegistry,
    container: &'a dyn ComponentContainer,
    stack: &'a ScopeStack,
    path: RefCell<ResolutionPath>,
    per_resolve: RefCell<HashMap<ComponentId, Instance>>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        registry: &'a ComponentRegistry,
        container: &'a dyn ComponentContainer,
        stack: &'a ScopeStack,
    ) -> Self {
        Self {
            registry,
            container,
            stack,
            path: RefCell::new(ResolutionPath::new()),
            per_resolve: RefCell::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &'a ComponentRegistry {
        self.registry
    }

    pub fn stack(&self) -> &'a ScopeStack {
        self.stack
    }

    /// Resolve a contract, innermost scope first, then the container
    pub fn resolve(&self, contract: &ComponentId) -> Result<Instance, ResolveError> {
        {
            let mut path = self.path.borrow_mut();
            if path.contains(contract) {
                path.push(contract.clone());
                let error = ResolveError::CircularDependency {
                    path: path.path_string(),
                    contract: contract.clone(),
                };
                path.pop();
                return Err(error);
            }
            path.push(contract.clone());
        }

        let result = self.resolve_unchecked(contract);
        self.path.borrow_mut().pop();
        result
    }

    fn resolve_unchecked(&self, contract: &ComponentId) -> Result<Instance, ResolveError> {
        if let Some(slot) = self.stack.lookup(contract) {
            return match slot {
                ScopedSlot::Anchor(anchor) => Ok(anchor.value()),
                ScopedSlot::Binding(binding) => binding
                    .cell()
                    .get_or_try_init(|| self.container.construct(binding.implementation(), self))
                    .cloned(),
            };
        }

        if self.container.is_registered(contract) {
            return self.container.resolve(contract, self);
        }

        match self.registry.bindings().get_anchored(contract) {
            Some(binding) => Err(ResolveError::OutOfScope {
                contract: contract.clone(),
                anchor_type: binding.anchor.clone().unwrap_or_else(|| contract.clone()),
            }),
            None => Err(ResolveError::NotRegistered {
                contract: contract.clone(),
            }),
        }
    }

    /// Resolve and downcast to a concrete type
    pub fn resolve_as<T: Any + Send + Sync>(&self, contract: &ComponentId) -> Result<Arc<T>, ResolveError> {
        downcast(contract, self.resolve(contract)?)
    }

    /// Resolve `T` registered under its own type name
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ResolveError> {
        self.resolve_as(&ComponentId::of::<T>())
    }

    /// Resolve every member of a list contract
    pub fn resolve_list(&self, list: &ComponentId) -> Result<Vec<Instance>, ResolveError> {
        self.registry
            .lists()
            .members(list)
            .iter()
            .map(|member| self.resolve(member))
            .collect()
    }

    /// Cached instance for the duration of this resolution
    pub fn per_resolve_instance<F>(&self, contract: &ComponentId, create: F) -> Result<Instance, ResolveError>
    where
        F: FnOnce() -> Result<Instance, ResolveError>,
    {
        if let Some(instance) = self.per_resolve.borrow().get(contract) {
            return Ok(instance.clone());
        }

        let instance = create()?;
        Ok(self
            .per_resolve
            .borrow_mut()
            .entry(contract.clone())
            .or_insert(instance)
            .clone())
    }
}

pub(crate) fn downcast<T: Any + Send + Sync>(contract: &ComponentId, instance: Instance) -> Result<Arc<T>, ResolveError> {
    instance.downcast::<T>().map_err(|_| ResolveError::TypeMismatch {
        contract: contract.clone(),
        expected: std::any::type_name::<T>(),
    })
}

/// Lazy view over the members of a list contract.
///
/// Every call to `iter` starts a fresh resolution, so transient members are
/// constructed again on each pass.
pub struct ListView<'a> {
    registry: &'a ComponentRegistry,
    container: &'a dyn ComponentContainer,
    stack: &'a ScopeStack,
    members: Vec<ComponentId>,
}

impl<'a> ListView<'a> {
    pub(crate) fn new(
        registry: &'a ComponentRegistry,
        container: &'a dyn ComponentContainer,
        stack: &'a ScopeStack,
        list: &ComponentId,
    ) -> Self {
        Self {
            registry,
            container,
            stack,
            members: registry.lists().members(list),
        }
    }

    /// Implementation identities of the members
    pub fn members(&self) -> &[ComponentId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> ListIter<'_> {
        ListIter {
            context: ResolutionContext::new(self.registry, self.container, self.stack),
            members: self.members.iter(),
        }
    }

    /// Resolve every member and downcast it to `T`
    pub fn collect_as<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>, ResolveError> {
        let context = ResolutionContext::new(self.registry, self.container, self.stack);
        self.members
            .iter()
            .map(|member| context.resolve_as::<T>(member))
            .collect()
    }
}

pub struct ListIter<'a> {
    context: ResolutionContext<'a>,
    members: std::slice::Iter<'a, ComponentId>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Result<Instance, ResolveError>;

    fn next(&mut self) -> Option<Self::Item> {
        let member = self.members.next()?;
        Some(self.context.resolve(member))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.members.size_hint()
    }
}
