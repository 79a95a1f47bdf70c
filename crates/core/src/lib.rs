pub mod errors;
pub mod config;
pub mod container;

// Re-export key types for convenience
pub use errors::{CoreError, RegistrationError, ScopeError, ResolveError, ManifestError};
pub use config::{ConfigError, ConfigLoader, ConfigSource, RegistryConfig};
pub use container::{
    AnchorInstance, BindOutcome, Binding, BindingTable, Capabilities, ComponentContainer,
    ComponentDescriptor, ComponentFactory, ComponentId, ComponentRegistry, ContainerLifetime,
    EnvironmentTag, FactoryContainer, Injector, Instance, KnownTypeMap, LifetimeKind,
    ListAggregator, ListDeclaration, ListView, Manifest, RegistrationDriver, RegistrationSummary,
    RequestScope, ResolutionContext, ScopeRegistry, ScopeStack, TypeGraph, TypeKind, UnitOfWork,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
