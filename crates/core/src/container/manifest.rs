use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::container::descriptor::{ComponentDescriptor, LifetimeKind, ListDeclaration};
use crate::container::hierarchy::{SerializationMarker, TypeGraph, TypeKind, TypeNode};
use crate::container::identity::{ComponentId, EnvironmentTag};
use crate::errors::ManifestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationEntry {
    Serializable,
    DataContract,
}

/// A type declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub id: ComponentId,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub extends: Vec<ComponentId>,
    #[serde(default)]
    pub serialization: Option<SerializationEntry>,
    #[serde(default)]
    pub known_types: Vec<ComponentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub targets: Vec<ComponentId>,
    #[serde(default)]
    pub replace_supertypes: bool,
}

/// A component registration declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub implementation: ComponentId,
    /// Lifetime name; `instance_scoped_singleton` needs `anchor`
    #[serde(default)]
    pub lifetime: Option<String>,
    #[serde(default)]
    pub anchor: Option<ComponentId>,
    #[serde(default)]
    pub contracts: Vec<ComponentId>,
    #[serde(default)]
    pub overrides: Vec<ComponentId>,
    #[serde(default)]
    pub restrict_to: Vec<Vec<EnvironmentTag>>,
    #[serde(default)]
    pub list: Option<ListEntry>,
}

/// YAML description of a type graph and the components registered over it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

impl Manifest {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Build the type graph; does not check parents, see `TypeGraph::validate`
    pub fn type_graph(&self) -> Result<TypeGraph, ManifestError> {
        let mut graph = TypeGraph::new();
        let mut seen = BTreeSet::new();

        for entry in &self.types {
            if !seen.insert(entry.id.clone()) {
                return Err(ManifestError::invalid(entry.id.as_str(), "type declared twice"));
            }

            let serialization = match entry.serialization {
                None if !entry.known_types.is_empty() => {
                    return Err(ManifestError::invalid(
                        entry.id.as_str(),
                        "known_types requires serialization: data_contract",
                    ))
                }
                None => SerializationMarker::None,
                Some(SerializationEntry::Serializable) if !entry.known_types.is_empty() => {
                    return Err(ManifestError::invalid(
                        entry.id.as_str(),
                        "known_types requires serialization: data_contract",
                    ))
                }
                Some(SerializationEntry::Serializable) => SerializationMarker::Serializable,
                Some(SerializationEntry::DataContract) => SerializationMarker::DataContract {
                    known_types: entry.known_types.clone(),
                },
            };

            graph.insert(TypeNode {
                id: entry.id.clone(),
                kind: entry.kind,
                extends: entry.extends.clone(),
                serialization,
            });
        }

        Ok(graph)
    }

    /// Component descriptors in declaration order
    pub fn descriptors(&self) -> Result<Vec<ComponentDescriptor>, ManifestError> {
        self.components.iter().map(ComponentEntry::to_descriptor).collect()
    }
}

impl ComponentEntry {
    fn lifetime_kind(&self) -> Result<Option<LifetimeKind>, ManifestError> {
        let entry = self.implementation.as_str();
        match (self.lifetime.as_deref(), &self.anchor) {
            (None, None) => Ok(None),
            (None, Some(anchor)) => Ok(Some(LifetimeKind::InstanceScopedSingleton(anchor.clone()))),
            (Some(name), anchor) if is_instance_scoped(name) => match anchor {
                Some(anchor) => Ok(Some(LifetimeKind::InstanceScopedSingleton(anchor.clone()))),
                None => Err(ManifestError::invalid(entry, "instance scoped lifetime requires an anchor")),
            },
            (Some(_), Some(_)) => Err(ManifestError::invalid(
                entry,
                "anchor is only valid with instance_scoped_singleton",
            )),
            (Some(name), None) => name
                .parse::<LifetimeKind>()
                .map(Some)
                .map_err(|error| ManifestError::invalid(entry, error.to_string())),
        }
    }

    pub fn to_descriptor(&self) -> Result<ComponentDescriptor, ManifestError> {
        let mut descriptor = ComponentDescriptor::new(self.implementation.clone());
        if let Some(lifetime) = self.lifetime_kind()? {
            descriptor = descriptor.with_lifetime(lifetime);
        }
        descriptor.contracts = self.contracts.clone();
        descriptor.explicit_overrides = self.overrides.iter().cloned().collect();
        descriptor.restrictions = self
            .restrict_to
            .iter()
            .map(|group| group.iter().cloned().collect())
            .collect();
        if let Some(list) = &self.list {
            descriptor = descriptor.in_list(ListDeclaration {
                targets: list.targets.clone(),
                replace_supertypes: list.replace_supertypes,
            });
        }
        Ok(descriptor)
    }
}

fn is_instance_scoped(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().replace('-', "_").as_str(),
        "instance_scoped_singleton" | "instance_scoped" | "scoped"
    )
}
