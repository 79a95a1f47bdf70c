use std::collections::{BTreeMap, BTreeSet};

use crate::container::binding::Binding;
use crate::container::identity::ComponentId;

/// Lifetime as seen by the component container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerLifetime {
    /// Single instance shared across the registry
    Singleton,
    /// Instance bound to an active scope anchor
    Scoped,
    /// New instance on every resolution
    Transient,
    /// One instance per OS thread
    Thread,
    /// One instance per top-level resolution
    PerResolve,
}

impl ContainerLifetime {
    pub fn is_singleton(&self) -> bool {
        matches!(self, ContainerLifetime::Singleton)
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, ContainerLifetime::Scoped)
    }

    /// Lifetimes that go through `register_per_unit_of_work`
    pub fn unit_of_work(&self) -> Option<UnitOfWork> {
        match self {
            ContainerLifetime::Thread => Some(UnitOfWork::Thread),
            ContainerLifetime::PerResolve => Some(UnitOfWork::Resolve),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerLifetime::Singleton => "singleton",
            ContainerLifetime::Scoped => "scoped",
            ContainerLifetime::Transient => "transient",
            ContainerLifetime::Thread => "thread",
            ContainerLifetime::PerResolve => "per_resolve",
        }
    }
}

impl std::fmt::Display for ContainerLifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logical unit of work a per-unit lifetime is cached for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWork {
    Thread,
    Resolve,
}

impl UnitOfWork {
    pub fn lifetime(&self) -> ContainerLifetime {
        match self {
            UnitOfWork::Thread => ContainerLifetime::Thread,
            UnitOfWork::Resolve => ContainerLifetime::PerResolve,
        }
    }
}

/// Lifetimes a container can honor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    supported: BTreeSet<ContainerLifetime>,
}

impl Capabilities {
    /// Every lifetime
    pub fn all() -> Self {
        Self {
            supported: [
                ContainerLifetime::Singleton,
                ContainerLifetime::Scoped,
                ContainerLifetime::Transient,
                ContainerLifetime::Thread,
                ContainerLifetime::PerResolve,
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Singleton, scoped and transient lifetimes only
    pub fn basic() -> Self {
        Self::all()
            .without(ContainerLifetime::Thread)
            .without(ContainerLifetime::PerResolve)
    }

    pub fn with(mut self, lifetime: ContainerLifetime) -> Self {
        self.supported.insert(lifetime);
        self
    }

    pub fn without(mut self, lifetime: ContainerLifetime) -> Self {
        self.supported.remove(&lifetime);
        self
    }

    pub fn supports(&self, lifetime: ContainerLifetime) -> bool {
        self.supported.contains(&lifetime)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::basic()
    }
}

/// Anchored bindings grouped by the anchor type that activates them
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    by_anchor: BTreeMap<ComponentId, Vec<Binding>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings<'a>(bindings: impl IntoIterator<Item = &'a Binding>) -> Self {
        let mut registry = Self::new();
        for binding in bindings {
            if let Some(anchor) = &binding.anchor {
                registry
                    .by_anchor
                    .entry(anchor.clone())
                    .or_default()
                    .push(binding.clone());
            }
        }
        registry
    }

    /// Bindings that materialize inside a scope anchored to `anchor_type`
    pub fn bindings_for(&self, anchor_type: &ComponentId) -> &[Binding] {
        self.by_anchor
            .get(anchor_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn anchor_types(&self) -> impl Iterator<Item = &ComponentId> {
        self.by_anchor.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.by_anchor.is_empty()
    }
}
