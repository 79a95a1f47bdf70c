pub mod binding;
pub mod descriptor;
pub mod hierarchy;
pub mod identity;
pub mod injector;
pub mod ioc_container;
pub mod known_types;
pub mod list;
pub mod manifest;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod scope_stack;

pub use binding::{BindOutcome, Binding, BindingTable};
pub use descriptor::{ComponentDescriptor, LifetimeKind, ListDeclaration};
pub use hierarchy::{SerializationMarker, TypeGraph, TypeKind, TypeNode};
pub use identity::{ComponentId, EnvironmentTag};
pub use injector::{Injector, RequestScope};
pub use ioc_container::{ComponentContainer, ComponentFactory, FactoryContainer, Instance};
pub use known_types::KnownTypeMap;
pub use list::{ListAggregator, ListOutcome};
pub use manifest::{ComponentEntry, ListEntry, Manifest, SerializationEntry, TypeEntry};
pub use registration::{RegistrationDriver, RegistrationSummary};
pub use registry::ComponentRegistry;
pub use resolver::{ListIter, ListView, ResolutionContext, ResolutionPath};
pub use scope::{Capabilities, ContainerLifetime, ScopeRegistry, UnitOfWork};
pub use scope_stack::{AnchorInstance, AnchorKey, ScopeCellStore, ScopeStack, ScopedBinding, ScopedSlot};
