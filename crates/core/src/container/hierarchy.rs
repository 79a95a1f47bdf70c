use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::container::identity::ComponentId;
use crate::errors::RegistrationError;

/// What a node in the type graph stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// An abstract contract other components are bound to
    Contract,
    /// A base type that cannot be instantiated itself
    Abstract,
    #[default]
    Concrete,
}

/// Serialization marker carried by a type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SerializationMarker {
    #[default]
    None,
    Serializable,
    /// Data contract with additional known types that may appear in its place
    DataContract { known_types: Vec<ComponentId> },
}

impl SerializationMarker {
    pub fn is_serializable(&self) -> bool {
        !matches!(self, SerializationMarker::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    pub id: ComponentId,
    pub kind: TypeKind,
    pub extends: Vec<ComponentId>,
    pub serialization: SerializationMarker,
}

impl TypeNode {
    pub fn new(id: impl Into<ComponentId>, kind: TypeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            extends: Vec::new(),
            serialization: SerializationMarker::None,
        }
    }
}

/// Precomputed subtype relation over component identities.
///
/// Every edge points from a type to a direct supertype (base type or
/// implemented contract). Subtype checks walk these edges, so the graph must
/// stay acyclic; `validate` enforces that.
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    nodes: BTreeMap<ComponentId, TypeNode>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node
    pub fn insert(&mut self, node: TypeNode) -> &mut Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn contract(&mut self, id: impl Into<ComponentId>) -> &mut Self {
        self.insert(TypeNode::new(id, TypeKind::Contract))
    }

    pub fn contract_extending<I, P>(&mut self, id: impl Into<ComponentId>, parents: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ComponentId>,
    {
        self.node_with_parents(id, TypeKind::Contract, parents)
    }

    pub fn abstract_type(&mut self, id: impl Into<ComponentId>) -> &mut Self {
        self.insert(TypeNode::new(id, TypeKind::Abstract))
    }

    pub fn abstract_extending<I, P>(&mut self, id: impl Into<ComponentId>, parents: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ComponentId>,
    {
        self.node_with_parents(id, TypeKind::Abstract, parents)
    }

    pub fn concrete(&mut self, id: impl Into<ComponentId>) -> &mut Self {
        self.insert(TypeNode::new(id, TypeKind::Concrete))
    }

    pub fn concrete_extending<I, P>(&mut self, id: impl Into<ComponentId>, parents: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ComponentId>,
    {
        self.node_with_parents(id, TypeKind::Concrete, parents)
    }

    /// Mark an already declared type as serializable. Unknown ids are ignored.
    pub fn mark_serializable(&mut self, id: &ComponentId) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(id) {
            node.serialization = SerializationMarker::Serializable;
        }
        self
    }

    /// Mark an already declared type as a data contract with known types
    pub fn mark_data_contract<I, K>(&mut self, id: &ComponentId, known_types: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ComponentId>,
    {
        if let Some(node) = self.nodes.get_mut(id) {
            node.serialization = SerializationMarker::DataContract {
                known_types: known_types.into_iter().map(Into::into).collect(),
            };
        }
        self
    }

    fn node_with_parents<I, P>(&mut self, id: impl Into<ComponentId>, kind: TypeKind, parents: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ComponentId>,
    {
        let mut node = TypeNode::new(id, kind);
        node.extends = parents.into_iter().map(Into::into).collect();
        self.insert(node)
    }

    pub fn node(&self, id: &ComponentId) -> Option<&TypeNode> {
        self.nodes.get(id)
    }

    pub fn kind(&self, id: &ComponentId) -> Option<TypeKind> {
        self.nodes.get(id).map(|node| node.kind)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TypeNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Strict subtype check: `sub` reaches `sup` through at least one edge
    pub fn is_subtype(&self, sub: &ComponentId, sup: &ComponentId) -> bool {
        if sub == sup {
            return false;
        }

        let mut visited: HashSet<&ComponentId> = HashSet::new();
        let mut queue: VecDeque<&ComponentId> = VecDeque::new();
        queue.push_back(sub);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for parent in &node.extends {
                if parent == sup {
                    return true;
                }
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        false
    }

    /// Whether `implementation` can stand in for `contract`
    pub fn satisfies(&self, implementation: &ComponentId, contract: &ComponentId) -> bool {
        implementation == contract || self.is_subtype(implementation, contract)
    }

    /// Every supertype of `id` in depth-first declaration order, without `id`
    pub fn ancestors(&self, id: &ComponentId) -> Vec<ComponentId> {
        let mut seen: HashSet<ComponentId> = HashSet::new();
        let mut result = Vec::new();
        seen.insert(id.clone());
        self.collect_ancestors(id, &mut seen, &mut result);
        result
    }

    fn collect_ancestors(&self, id: &ComponentId, seen: &mut HashSet<ComponentId>, out: &mut Vec<ComponentId>) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        for parent in &node.extends {
            if seen.insert(parent.clone()) {
                out.push(parent.clone());
                self.collect_ancestors(parent, seen, out);
            }
        }
    }

    /// Contract-kind supertypes of `id`
    pub fn contracts_of(&self, id: &ComponentId) -> Vec<ComponentId> {
        self.ancestors(id)
            .into_iter()
            .filter(|ancestor| self.kind(ancestor) == Some(TypeKind::Contract))
            .collect()
    }

    /// Check that every referenced type is declared and the graph is acyclic
    pub fn validate(&self) -> Result<(), RegistrationError> {
        for node in self.nodes.values() {
            let known = match &node.serialization {
                SerializationMarker::DataContract { known_types } => known_types.as_slice(),
                _ => &[],
            };
            for referenced in node.extends.iter().chain(known) {
                if !self.nodes.contains_key(referenced) {
                    return Err(RegistrationError::UnknownComponent {
                        component: referenced.clone(),
                        referenced_by: node.id.clone(),
                    });
                }
            }
        }

        let mut finished: HashSet<&ComponentId> = HashSet::new();
        let mut in_progress: HashSet<&ComponentId> = HashSet::new();
        for id in self.nodes.keys() {
            self.detect_cycle_dfs(id, &mut finished, &mut in_progress)?;
        }

        Ok(())
    }

    fn detect_cycle_dfs<'a>(
        &'a self,
        id: &'a ComponentId,
        finished: &mut HashSet<&'a ComponentId>,
        in_progress: &mut HashSet<&'a ComponentId>,
    ) -> Result<(), RegistrationError> {
        if finished.contains(id) {
            return Ok(());
        }
        if !in_progress.insert(id) {
            return Err(RegistrationError::CyclicHierarchy { component: id.clone() });
        }

        if let Some(node) = self.nodes.get(id) {
            for parent in &node.extends {
                self.detect_cycle_dfs(parent, finished, in_progress)?;
            }
        }

        in_progress.remove(id);
        finished.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ComponentId {
        ComponentId::new(name)
    }

    fn sample() -> TypeGraph {
        let mut graph = TypeGraph::new();
        graph
            .contract("Repository")
            .contract_extending("UserRepository", ["Repository"])
            .abstract_extending("BaseRepository", ["UserRepository"])
            .concrete_extending("SqlRepository", ["BaseRepository"])
            .concrete_extending("CachedSqlRepository", ["SqlRepository"]);
        graph
    }

    #[test]
    fn test_subtype_is_strict_and_transitive() {
        let graph = sample();
        assert!(graph.is_subtype(&id("CachedSqlRepository"), &id("Repository")));
        assert!(graph.is_subtype(&id("SqlRepository"), &id("BaseRepository")));
        assert!(!graph.is_subtype(&id("SqlRepository"), &id("SqlRepository")));
        assert!(!graph.is_subtype(&id("Repository"), &id("SqlRepository")));
    }

    #[test]
    fn test_satisfies_includes_self() {
        let graph = sample();
        assert!(graph.satisfies(&id("SqlRepository"), &id("SqlRepository")));
        assert!(graph.satisfies(&id("SqlRepository"), &id("Repository")));
        assert!(!graph.satisfies(&id("SqlRepository"), &id("CachedSqlRepository")));
    }

    #[test]
    fn test_contracts_of_skips_abstract_and_concrete() {
        let graph = sample();
        assert_eq!(
            graph.contracts_of(&id("CachedSqlRepository")),
            vec![id("UserRepository"), id("Repository")]
        );
    }

    #[test]
    fn test_ancestors_deduplicate_diamonds() {
        let mut graph = TypeGraph::new();
        graph
            .contract("Root")
            .contract_extending("Left", ["Root"])
            .contract_extending("Right", ["Root"])
            .concrete_extending("Leaf", ["Left", "Right"]);
        assert_eq!(
            graph.ancestors(&id("Leaf")),
            vec![id("Left"), id("Root"), id("Right")]
        );
    }

    #[test]
    fn test_validate_reports_unknown_parent() {
        let mut graph = TypeGraph::new();
        graph.concrete_extending("Orphan", ["Missing"]);
        assert_eq!(
            graph.validate(),
            Err(RegistrationError::UnknownComponent {
                component: id("Missing"),
                referenced_by: id("Orphan"),
            })
        );
    }

    #[test]
    fn test_validate_reports_cycle() {
        let mut graph = TypeGraph::new();
        graph
            .contract_extending("A", ["B"])
            .contract_extending("B", ["A"]);
        assert!(matches!(
            graph.validate(),
            Err(RegistrationError::CyclicHierarchy { .. })
        ));
        assert!(sample().validate().is_ok());
    }
}
