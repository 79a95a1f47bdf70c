use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::container::identity::ComponentId;
use crate::container::resolver::ResolutionContext;
use crate::container::scope::{Capabilities, ContainerLifetime, UnitOfWork};
use crate::errors::{RegistrationError, ResolveError};

/// A resolved component instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds an implementation, resolving its dependencies through the context
pub type ComponentFactory =
    Arc<dyn Fn(&ResolutionContext<'_>) -> Result<Instance, ResolveError> + Send + Sync>;

/// Object container the sealed registry emits its bindings to.
///
/// The registry decides which implementation serves a contract; the container
/// owns construction and caching for the unscoped lifetimes. Anchored
/// bindings are cached by the scope stack and only need `construct`.
pub trait ComponentContainer: Send + Sync {
    fn register_singleton(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
    ) -> Result<(), RegistrationError>;

    fn register_scoped(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
        anchor_type: &ComponentId,
    ) -> Result<(), RegistrationError>;

    fn register_transient(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
    ) -> Result<(), RegistrationError>;

    /// One instance per logical unit of work. Containers opt in by overriding
    /// this and advertising the lifetime in `capabilities`.
    fn register_per_unit_of_work(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
        unit: UnitOfWork,
    ) -> Result<(), RegistrationError> {
        Err(RegistrationError::unsupported_lifetime(
            contract,
            implementation,
            unit.lifetime().as_str(),
        ))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::basic()
    }

    fn is_registered(&self, contract: &ComponentId) -> bool;

    /// Resolve an unscoped contract
    fn resolve(
        &self,
        contract: &ComponentId,
        context: &ResolutionContext<'_>,
    ) -> Result<Instance, ResolveError>;

    /// Build a fresh instance of an implementation
    fn construct(
        &self,
        implementation: &ComponentId,
        context: &ResolutionContext<'_>,
    ) -> Result<Instance, ResolveError>;
}

#[derive(Debug, Clone)]
struct Registration {
    implementation: ComponentId,
    lifetime: ContainerLifetime,
}

type ThreadCache = DashMap<(ThreadId, ComponentId), Instance>;

/// Evicts one thread's entries from a thread cache when that thread exits
struct ThreadCacheGuard {
    thread: ThreadId,
    cache: Weak<ThreadCache>,
}

impl Drop for ThreadCacheGuard {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.retain(|(thread, _), _| *thread != self.thread);
        }
    }
}

thread_local! {
    static THREAD_CACHE_GUARDS: RefCell<Vec<ThreadCacheGuard>> = RefCell::new(Vec::new());
}

/// Make sure the current thread's entries leave `cache` when the thread ends
fn evict_on_thread_exit(cache: &Arc<ThreadCache>) {
    let thread = thread::current().id();
    // Fails only while the thread is already tearing down its locals
    let _ = THREAD_CACHE_GUARDS.try_with(|guards| {
        let mut guards = guards.borrow_mut();
        guards.retain(|guard| guard.cache.strong_count() > 0);
        if !guards.iter().any(|guard| Weak::as_ptr(&guard.cache) == Arc::as_ptr(cache)) {
            guards.push(ThreadCacheGuard {
                thread,
                cache: Arc::downgrade(cache),
            });
        }
    });
}

/// Container backed by one factory per implementation identity.
///
/// Thread singletons are cached per OS thread and evicted when that thread
/// exits.
#[derive(Default)]
pub struct FactoryContainer {
    factories: HashMap<ComponentId, ComponentFactory>,
    registrations: HashMap<ComponentId, Registration>,
    /// contract -> (implementation, anchor type)
    scoped: HashMap<ComponentId, (ComponentId, ComponentId)>,
    singletons: DashMap<ComponentId, Arc<OnceCell<Instance>>>,
    thread_instances: Arc<ThreadCache>,
}

impl FactoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread singletons currently cached across all live threads
    pub fn thread_cache_len(&self) -> usize {
        self.thread_instances.len()
    }

    /// Register a raw factory for an implementation
    pub fn register_factory(&mut self, implementation: impl Into<ComponentId>, factory: ComponentFactory) -> &mut Self {
        self.factories.insert(implementation.into(), factory);
        self
    }

    /// Register a typed constructor for an implementation
    pub fn register_constructor<T, F>(&mut self, implementation: impl Into<ComponentId>, constructor: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolutionContext<'_>) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        let factory: ComponentFactory = Arc::new(move |context: &ResolutionContext<'_>| {
            let instance: Instance = Arc::new(constructor(context)?);
            Ok(instance)
        });
        self.register_factory(implementation, factory)
    }

    /// Register `T::default()` as the constructor of `T`
    pub fn register_default<T>(&mut self) -> &mut Self
    where
        T: Any + Default + Send + Sync,
    {
        self.register_constructor(ComponentId::of::<T>(), |_| Ok(T::default()))
    }

    pub fn has_factory(&self, implementation: &ComponentId) -> bool {
        self.factories.contains_key(implementation)
    }

    fn register(&mut self, contract: &ComponentId, implementation: &ComponentId, lifetime: ContainerLifetime) {
        tracing::debug!(
            "Container registered '{}' for '{}' as {}",
            implementation,
            contract,
            lifetime
        );
        self.registrations.insert(
            contract.clone(),
            Registration {
                implementation: implementation.clone(),
                lifetime,
            },
        );
    }

    fn resolve_singleton(
        &self,
        contract: &ComponentId,
        implementation: &ComponentId,
        context: &ResolutionContext<'_>,
    ) -> Result<Instance, ResolveError> {
        // Clone the cell out so no map guard is held while constructing
        let cell = self
            .singletons
            .entry(contract.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        cell.get_or_try_init(|| self.construct(implementation, context))
            .cloned()
    }

    fn resolve_thread_local(
        &self,
        contract: &ComponentId,
        implementation: &ComponentId,
        context: &ResolutionContext<'_>,
    ) -> Result<Instance, ResolveError> {
        let key = (thread::current().id(), contract.clone());
        if let Some(instance) = self.thread_instances.get(&key) {
            return Ok(instance.value().clone());
        }

        let instance = self.construct(implementation, context)?;
        evict_on_thread_exit(&self.thread_instances);
        Ok(self
            .thread_instances
            .entry(key)
            .or_insert(instance)
            .value()
            .clone())
    }
}

impl ComponentContainer for FactoryContainer {
    fn register_singleton(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
    ) -> Result<(), RegistrationError> {
        self.register(contract, implementation, ContainerLifetime::Singleton);
        Ok(())
    }

    fn register_scoped(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
        anchor_type: &ComponentId,
    ) -> Result<(), RegistrationError> {
        self.scoped
            .insert(contract.clone(), (implementation.clone(), anchor_type.clone()));
        Ok(())
    }

    fn register_transient(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
    ) -> Result<(), RegistrationError> {
        self.register(contract, implementation, ContainerLifetime::Transient);
        Ok(())
    }

    fn register_per_unit_of_work(
        &mut self,
        contract: &ComponentId,
        implementation: &ComponentId,
        unit: UnitOfWork,
    ) -> Result<(), RegistrationError> {
        self.register(contract, implementation, unit.lifetime());
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn is_registered(&self, contract: &ComponentId) -> bool {
        self.registrations.contains_key(contract) || self.scoped.contains_key(contract)
    }

    fn resolve(
        &self,
        contract: &ComponentId,
        context: &ResolutionContext<'_>,
    ) -> Result<Instance, ResolveError> {
        let Some(registration) = self.registrations.get(contract) else {
            return Err(match self.scoped.get(contract) {
                Some((_, anchor_type)) => ResolveError::OutOfScope {
                    contract: contract.clone(),
                    anchor_type: anchor_type.clone(),
                },
                None => ResolveError::NotRegistered {
                    contract: contract.clone(),
                },
            });
        };

        let implementation = &registration.implementation;
        match registration.lifetime {
            ContainerLifetime::Singleton => self.resolve_singleton(contract, implementation, context),
            ContainerLifetime::Transient => self.construct(implementation, context),
            ContainerLifetime::Thread => self.resolve_thread_local(contract, implementation, context),
            ContainerLifetime::PerResolve => context
                .per_resolve_instance(contract, || self.construct(implementation, context)),
            ContainerLifetime::Scoped => Err(ResolveError::NotRegistered {
                contract: contract.clone(),
            }),
        }
    }

    fn construct(
        &self,
        implementation: &ComponentId,
        context: &ResolutionContext<'_>,
    ) -> Result<Instance, ResolveError> {
        let factory = self
            .factories
            .get(implementation)
            .ok_or_else(|| ResolveError::MissingFactory {
                implementation: implementation.clone(),
            })?;
        factory(context)
    }
}

impl std::fmt::Debug for FactoryContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryContainer")
            .field("factories", &self.factories.len())
            .field("registrations", &self.registrations.len())
            .field("scoped", &self.scoped.len())
            .field("singletons", &self.singletons.len())
            .field("thread_instances", &self.thread_instances.len())
            .finish()
    }
}
