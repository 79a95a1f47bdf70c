use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a contract or implementation.
///
/// Identities are plain names. `ComponentId::of::<T>()` derives one from a Rust
/// type so programmatic registrations and resolutions agree on the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity derived from a Rust type name
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Default anchor type for request-scoped singletons
    pub fn request_scope() -> Self {
        Self::new("anchorage::RequestScope")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ComponentId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque tag describing the environment the registry is built for
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentTag(String);

impl EnvironmentTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EnvironmentTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for EnvironmentTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn test_identity_from_type() {
        let id = ComponentId::of::<Marker>();
        assert!(id.as_str().ends_with("Marker"));
        assert_eq!(id, ComponentId::of::<Marker>());
    }

    #[test]
    fn test_identity_serializes_as_plain_string() {
        let id = ComponentId::new("app::Store");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"app::Store\"");
    }

    #[test]
    fn test_ordering_is_by_name() {
        let mut ids = vec![ComponentId::new("b"), ComponentId::new("a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
    }
}
