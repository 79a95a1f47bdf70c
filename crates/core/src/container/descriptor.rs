use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::identity::{ComponentId, EnvironmentTag};
use crate::container::scope::ContainerLifetime;
use crate::errors::ManifestError;

/// Lifetime a component declares for its instances
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifetimeKind {
    /// New instance on every resolution
    Transient,
    /// One instance for the whole registry
    GlobalSingleton,
    /// One instance per active request scope
    RequestSingleton,
    /// One instance per OS thread
    ThreadSingleton,
    /// One instance per top-level resolution
    PerResolveSingleton,
    /// One instance per active scope opened with an instance of the anchor type
    InstanceScopedSingleton(ComponentId),
}

impl LifetimeKind {
    /// Anchored lifetimes only materialize inside a scope
    pub fn is_anchored(&self) -> bool {
        matches!(
            self,
            LifetimeKind::RequestSingleton | LifetimeKind::InstanceScopedSingleton(_)
        )
    }

    /// Anchor type for anchored lifetimes, resolving request scope to `request_anchor`
    pub fn anchor_type(&self, request_anchor: &ComponentId) -> Option<ComponentId> {
        match self {
            LifetimeKind::RequestSingleton => Some(request_anchor.clone()),
            LifetimeKind::InstanceScopedSingleton(anchor) => Some(anchor.clone()),
            _ => None,
        }
    }

    /// Container lifetime this declaration is emitted as
    pub fn container_lifetime(&self) -> ContainerLifetime {
        match self {
            LifetimeKind::Transient => ContainerLifetime::Transient,
            LifetimeKind::GlobalSingleton => ContainerLifetime::Singleton,
            LifetimeKind::RequestSingleton | LifetimeKind::InstanceScopedSingleton(_) => {
                ContainerLifetime::Scoped
            }
            LifetimeKind::ThreadSingleton => ContainerLifetime::Thread,
            LifetimeKind::PerResolveSingleton => ContainerLifetime::PerResolve,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifetimeKind::Transient => "transient",
            LifetimeKind::GlobalSingleton => "global_singleton",
            LifetimeKind::RequestSingleton => "request_singleton",
            LifetimeKind::ThreadSingleton => "thread_singleton",
            LifetimeKind::PerResolveSingleton => "per_resolve_singleton",
            LifetimeKind::InstanceScopedSingleton(_) => "instance_scoped_singleton",
        }
    }
}

impl fmt::Display for LifetimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifetimeKind::InstanceScopedSingleton(anchor) => write!(f, "{}({})", self.name(), anchor),
            _ => f.write_str(self.name()),
        }
    }
}

/// Parses the anchor-free lifetime names; instance scoping needs an anchor and
/// is built with `LifetimeKind::InstanceScopedSingleton` instead.
impl FromStr for LifetimeKind {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "transient" => Ok(LifetimeKind::Transient),
            "global_singleton" | "singleton" => Ok(LifetimeKind::GlobalSingleton),
            "request_singleton" | "request" => Ok(LifetimeKind::RequestSingleton),
            "thread_singleton" | "thread" => Ok(LifetimeKind::ThreadSingleton),
            "per_resolve_singleton" | "per_resolve" => Ok(LifetimeKind::PerResolveSingleton),
            _ => Err(ManifestError::invalid(
                "lifetime",
                format!(
                    "unknown lifetime '{}', expected transient, global_singleton, request_singleton, thread_singleton or per_resolve_singleton",
                    s
                ),
            )),
        }
    }
}

/// Membership of a component in one or more list contracts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListDeclaration {
    pub targets: Vec<ComponentId>,
    /// Displace members that are strict supertypes of this component
    #[serde(default)]
    pub replace_supertypes: bool,
}

impl ListDeclaration {
    pub fn new<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ComponentId>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            replace_supertypes: false,
        }
    }

    pub fn replacing_supertypes(mut self) -> Self {
        self.replace_supertypes = true;
        self
    }
}

/// Registration intent of one candidate implementation.
///
/// Descriptors are plain data: they may carry invalid combinations (two
/// lifetimes, two list declarations) which the registration driver rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub implementation: ComponentId,
    /// Declared contracts; empty means every contract the implementation satisfies
    pub contracts: Vec<ComponentId>,
    pub lifetimes: Vec<LifetimeKind>,
    pub explicit_overrides: BTreeSet<ComponentId>,
    /// Every non-empty group must share at least one tag with the environment
    pub restrictions: Vec<BTreeSet<EnvironmentTag>>,
    pub lists: Vec<ListDeclaration>,
}

impl ComponentDescriptor {
    pub fn new(implementation: impl Into<ComponentId>) -> Self {
        Self {
            implementation: implementation.into(),
            contracts: Vec::new(),
            lifetimes: Vec::new(),
            explicit_overrides: BTreeSet::new(),
            restrictions: Vec::new(),
            lists: Vec::new(),
        }
    }

    /// Descriptor for a Rust type, identified by its type name
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(ComponentId::of::<T>())
    }

    pub fn with_lifetime(mut self, lifetime: LifetimeKind) -> Self {
        self.lifetimes.push(lifetime);
        self
    }

    pub fn transient(self) -> Self {
        self.with_lifetime(LifetimeKind::Transient)
    }

    pub fn singleton(self) -> Self {
        self.with_lifetime(LifetimeKind::GlobalSingleton)
    }

    pub fn request_scoped(self) -> Self {
        self.with_lifetime(LifetimeKind::RequestSingleton)
    }

    pub fn scoped_to(self, anchor: impl Into<ComponentId>) -> Self {
        self.with_lifetime(LifetimeKind::InstanceScopedSingleton(anchor.into()))
    }

    pub fn bind_as(mut self, contract: impl Into<ComponentId>) -> Self {
        self.contracts.push(contract.into());
        self
    }

    pub fn overrides(mut self, implementation: impl Into<ComponentId>) -> Self {
        self.explicit_overrides.insert(implementation.into());
        self
    }

    /// Add a restriction group; the component is eligible if any tag matches
    pub fn restrict_to<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EnvironmentTag>,
    {
        self.restrictions.push(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn in_list(mut self, list: ListDeclaration) -> Self {
        self.lists.push(list);
        self
    }

    /// Check the restriction groups against the active environment tags
    pub fn is_eligible(&self, environment: &BTreeSet<EnvironmentTag>) -> bool {
        self.restrictions
            .iter()
            .filter(|group| !group.is_empty())
            .all(|group| group.iter().any(|tag| environment.contains(tag)))
    }

    /// The single lifetime declaration, if any
    pub fn lifetime(&self) -> Option<&LifetimeKind> {
        self.lifetimes.first()
    }

    /// The single list declaration, if any
    pub fn list(&self) -> Option<&ListDeclaration> {
        self.lists.first()
    }
}
