use std::collections::{BTreeMap, HashSet};

use crate::container::hierarchy::{SerializationMarker, TypeGraph};
use crate::container::identity::ComponentId;

/// Serializable implementations recorded under each of their supertypes.
///
/// Used by serializers to learn which concrete types may appear where a
/// contract is declared. Read-only once the registry is sealed.
#[derive(Debug, Clone, Default)]
pub struct KnownTypeMap {
    by_contract: BTreeMap<ComponentId, Vec<ComponentId>>,
}

impl KnownTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` and, for data contracts, its declared known types
    pub fn register(&mut self, graph: &TypeGraph, id: &ComponentId) {
        let mut visited = HashSet::new();
        self.register_recursive(graph, id, &mut visited);
    }

    fn register_recursive(&mut self, graph: &TypeGraph, id: &ComponentId, visited: &mut HashSet<ComponentId>) {
        if !visited.insert(id.clone()) {
            return;
        }
        let Some(node) = graph.node(id) else {
            return;
        };

        match &node.serialization {
            SerializationMarker::None => {}
            SerializationMarker::Serializable => self.record_under_ancestors(graph, id),
            SerializationMarker::DataContract { known_types } => {
                self.record_under_ancestors(graph, id);
                for known in known_types {
                    self.register_recursive(graph, known, visited);
                }
            }
        }
    }

    fn record_under_ancestors(&mut self, graph: &TypeGraph, id: &ComponentId) {
        for ancestor in graph.ancestors(id) {
            let known = self.by_contract.entry(ancestor).or_default();
            if !known.contains(id) {
                known.push(id.clone());
            }
        }
    }

    /// Known implementations for a contract, in registration order
    pub fn resolve(&self, contract: &ComponentId) -> &[ComponentId] {
        self.by_contract
            .get(contract)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ComponentId, &Vec<ComponentId>)> {
        self.by_contract.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.by_contract.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ComponentId {
        ComponentId::new(name)
    }

    #[test]
    fn test_serializable_type_is_known_under_all_ancestors() {
        let mut graph = TypeGraph::new();
        graph
            .contract("Message")
            .abstract_extending("Event", ["Message"])
            .concrete_extending("UserCreated", ["Event"])
            .mark_serializable(&id("UserCreated"));

        let mut known = KnownTypeMap::new();
        known.register(&graph, &id("UserCreated"));

        assert_eq!(known.resolve(&id("Message")), &[id("UserCreated")]);
        assert_eq!(known.resolve(&id("Event")), &[id("UserCreated")]);
        assert!(known.resolve(&id("UserCreated")).is_empty());
    }

    #[test]
    fn test_data_contract_follows_known_types() {
        let mut graph = TypeGraph::new();
        graph
            .contract("Shape")
            .concrete_extending("Circle", ["Shape"])
            .concrete_extending("Square", ["Shape"])
            .concrete_extending("Plain", ["Shape"])
            .mark_data_contract(&id("Circle"), ["Square", "Plain"])
            .mark_data_contract(&id("Square"), ["Circle"]);

        let mut known = KnownTypeMap::new();
        known.register(&graph, &id("Circle"));

        // Plain carries no marker, so it is not recorded
        assert_eq!(known.resolve(&id("Shape")), &[id("Circle"), id("Square")]);
    }

    #[test]
    fn test_repeated_registration_does_not_duplicate() {
        let mut graph = TypeGraph::new();
        graph
            .contract("Shape")
            .concrete_extending("Circle", ["Shape"])
            .mark_serializable(&id("Circle"));

        let mut known = KnownTypeMap::new();
        known.register(&graph, &id("Circle"));
        known.register(&graph, &id("Circle"));
        assert_eq!(known.resolve(&id("Shape")).len(), 1);
    }
}
