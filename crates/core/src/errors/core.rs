use thiserror::Error;

use crate::config::ConfigError;
use crate::container::identity::ComponentId;

/// Errors raised while processing a batch of component descriptors.
///
/// Every variant is fatal to the batch it was raised in: the driver discards
/// the staged state and leaves previously committed registrations untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Contract '{contract}' of '{implementation}' cannot be registered, since it is already registered to '{existing}', which is neither a supertype nor explicitly overridden")]
    AmbiguousBinding {
        contract: ComponentId,
        implementation: ComponentId,
        existing: ComponentId,
    },

    #[error("'{implementation}' cannot be registered for '{contract}'{usage}, since it does not implement this contract")]
    ContractNotSatisfied {
        contract: ComponentId,
        implementation: ComponentId,
        usage: &'static str,
    },

    #[error("'{implementation}' cannot be registered, since it declares {count} lifetimes; only one is allowed")]
    DuplicateLifetimeDeclaration {
        implementation: ComponentId,
        count: usize,
    },

    #[error("'{implementation}' cannot be registered, since it declares {count} list memberships; only one is allowed")]
    DuplicateListDeclaration {
        implementation: ComponentId,
        count: usize,
    },

    #[error("'{implementation}' cannot be registered for '{contract}', since the container does not support the '{lifetime}' lifetime")]
    UnsupportedLifetimeKind {
        contract: ComponentId,
        implementation: ComponentId,
        lifetime: String,
    },

    #[error("'{implementation}' cannot be registered for '{contract}' in scope '{anchor_type}', since the contract is already anchored to '{existing_anchor}' by '{existing}'")]
    AnchorConflict {
        contract: ComponentId,
        implementation: ComponentId,
        anchor_type: ComponentId,
        existing: ComponentId,
        existing_anchor: ComponentId,
    },

    #[error("'{component}' is referenced by '{referenced_by}' but is not declared in the type graph")]
    UnknownComponent {
        component: ComponentId,
        referenced_by: ComponentId,
    },

    #[error("Type graph contains an inheritance cycle through '{component}'")]
    CyclicHierarchy { component: ComponentId },

    #[error("Container rejected '{implementation}' for '{contract}': {message}")]
    Container {
        contract: ComponentId,
        implementation: ComponentId,
        message: String,
    },
}

impl RegistrationError {
    /// Create an unsupported lifetime error
    pub fn unsupported_lifetime(
        contract: &ComponentId,
        implementation: &ComponentId,
        lifetime: impl Into<String>,
    ) -> Self {
        Self::UnsupportedLifetimeKind {
            contract: contract.clone(),
            implementation: implementation.clone(),
            lifetime: lifetime.into(),
        }
    }

    /// Create a container error
    pub fn container(
        contract: &ComponentId,
        implementation: &ComponentId,
        message: impl Into<String>,
    ) -> Self {
        Self::Container {
            contract: contract.clone(),
            implementation: implementation.clone(),
            message: message.into(),
        }
    }

    /// The contract the failing registration targeted, if any
    pub fn contract(&self) -> Option<&ComponentId> {
        match self {
            Self::AmbiguousBinding { contract, .. }
            | Self::ContractNotSatisfied { contract, .. }
            | Self::UnsupportedLifetimeKind { contract, .. }
            | Self::AnchorConflict { contract, .. }
            | Self::Container { contract, .. } => Some(contract),
            _ => None,
        }
    }

    /// The implementation whose registration failed, if any
    pub fn implementation(&self) -> Option<&ComponentId> {
        match self {
            Self::AmbiguousBinding { implementation, .. }
            | Self::ContractNotSatisfied { implementation, .. }
            | Self::DuplicateLifetimeDeclaration { implementation, .. }
            | Self::DuplicateListDeclaration { implementation, .. }
            | Self::UnsupportedLifetimeKind { implementation, .. }
            | Self::AnchorConflict { implementation, .. }
            | Self::Container { implementation, .. } => Some(implementation),
            Self::UnknownComponent { referenced_by, .. } => Some(referenced_by),
            Self::CyclicHierarchy { component } => Some(component),
        }
    }

    /// Check if the error is an ambiguous binding
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousBinding { .. })
    }

    /// Check if the error is an anchor conflict
    pub fn is_anchor_conflict(&self) -> bool {
        matches!(self, Self::AnchorConflict { .. })
    }
}

/// Errors raised by scope stack operations.
///
/// These are recoverable: the stack is left exactly as it was before the
/// failing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("An instance was already added as scope for '{anchor_type}' on this stack")]
    ScopeAlreadyActive { anchor_type: ComponentId },

    #[error("No scope for '{anchor_type}' is active on this stack")]
    ScopeNotActive { anchor_type: ComponentId },

    #[error("The active scope for '{anchor_type}' was opened with a different anchor instance")]
    AnchorInstanceMismatch { anchor_type: ComponentId },
}

impl ScopeError {
    /// The anchor type the failing operation targeted
    pub fn anchor_type(&self) -> &ComponentId {
        match self {
            Self::ScopeAlreadyActive { anchor_type }
            | Self::ScopeNotActive { anchor_type }
            | Self::AnchorInstanceMismatch { anchor_type } => anchor_type,
        }
    }
}

/// Errors raised while resolving a contract to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No binding registered for '{contract}'")]
    NotRegistered { contract: ComponentId },

    #[error("'{contract}' is bound to scope '{anchor_type}', which is not active")]
    OutOfScope {
        contract: ComponentId,
        anchor_type: ComponentId,
    },

    #[error("No factory registered for implementation '{implementation}'")]
    MissingFactory { implementation: ComponentId },

    #[error("Circular dependency detected: {path} (cycle at: {contract})")]
    CircularDependency { path: String, contract: ComponentId },

    #[error("Instance resolved for '{contract}' is not a '{expected}'")]
    TypeMismatch {
        contract: ComponentId,
        expected: &'static str,
    },

    #[error("Construction of '{implementation}' failed: {message}")]
    ConstructionFailed {
        implementation: ComponentId,
        message: String,
    },
}

impl ResolveError {
    /// Create a construction failure for an implementation
    pub fn construction_failed(implementation: &ComponentId, message: impl Into<String>) -> Self {
        Self::ConstructionFailed {
            implementation: implementation.clone(),
            message: message.into(),
        }
    }

    /// Check if the error is a missing registration
    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered { .. })
    }
}

/// Errors raised while reading a component manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid manifest entry '{entry}': {message}")]
    Invalid { entry: String, message: String },
}

impl ManifestError {
    /// Create an invalid entry error
    pub fn invalid(entry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            entry: entry.into(),
            message: message.into(),
        }
    }
}

/// Umbrella error for callers that drive the whole registry lifecycle
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoreError {
    /// Check if the error happened during registration
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::Registration(_))
    }

    /// Check if the error came from a scope operation
    pub fn is_scope(&self) -> bool {
        matches!(self, Self::Scope(_))
    }
}
