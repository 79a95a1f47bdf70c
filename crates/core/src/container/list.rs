use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::container::hierarchy::TypeGraph;
use crate::container::identity::ComponentId;

/// Result of adding a candidate to a list contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    /// The candidate joined the list, displacing the given supertypes
    Added { displaced: Vec<ComponentId> },
    /// The candidate was already a member
    AlreadyPresent { displaced: Vec<ComponentId> },
    /// A more specific member keeps the candidate out
    Suppressed { by: ComponentId },
}

/// Collects implementations into deduplicated member sets per list contract.
///
/// For a related pair of candidates the supertype is displaced by the
/// subtype when either side asked for supertype replacement in that list;
/// unrelated candidates and pairs without the flag coexist.
#[derive(Debug, Clone, Default)]
pub struct ListAggregator {
    members: BTreeMap<ComponentId, BTreeSet<ComponentId>>,
    /// Members whose declaration set `replace_supertypes`, per list
    replacing: BTreeMap<ComponentId, BTreeSet<ComponentId>>,
}

impl ListAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(
        &mut self,
        graph: &TypeGraph,
        list: &ComponentId,
        candidate: &ComponentId,
        replace_supertypes: bool,
    ) -> ListOutcome {
        let members = self.members.entry(list.clone()).or_default();
        let replacing = self.replacing.entry(list.clone()).or_default();
        let already_present = members.contains(candidate);

        if !already_present {
            let suppressor = members.iter().find(|member| {
                graph.is_subtype(member, candidate) && (replace_supertypes || replacing.contains(*member))
            });
            if let Some(member) = suppressor {
                debug!(
                    "'{}' stays out of list '{}', since '{}' replaces it",
                    candidate, list, member
                );
                return ListOutcome::Suppressed { by: member.clone() };
            }
            members.insert(candidate.clone());
        }

        if replace_supertypes {
            replacing.insert(candidate.clone());
        }
        let candidate_replaces = replacing.contains(candidate);

        let displaced: Vec<ComponentId> = members
            .iter()
            .filter(|member| {
                graph.is_subtype(candidate, member) && (candidate_replaces || replacing.contains(*member))
            })
            .cloned()
            .collect();

        for member in &displaced {
            members.remove(member);
            replacing.remove(member);
            debug!("'{}' replaces '{}' in list '{}'", candidate, member, list);
        }

        if already_present {
            ListOutcome::AlreadyPresent { displaced }
        } else {
            debug!("Added '{}' to list '{}'", candidate, list);
            ListOutcome::Added { displaced }
        }
    }

    /// Members of a list in identity order; empty for unknown lists
    pub fn members(&self, list: &ComponentId) -> Vec<ComponentId> {
        self.members
            .get(list)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, list: &ComponentId, member: &ComponentId) -> bool {
        self.members
            .get(list)
            .map(|members| members.contains(member))
            .unwrap_or(false)
    }

    pub fn is_list(&self, list: &ComponentId) -> bool {
        self.members.contains_key(list)
    }

    /// Every list contract with its members
    pub fn lists(&self) -> impl Iterator<Item = (&ComponentId, &BTreeSet<ComponentId>)> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ComponentId {
        ComponentId::new(name)
    }

    fn graph() -> TypeGraph {
        let mut graph = TypeGraph::new();
        graph
            .contract("Middleware")
            .concrete_extending("Logger", ["Middleware"])
            .concrete_extending("JsonLogger", ["Logger"])
            .concrete_extending("Cors", ["Middleware"]);
        graph
    }

    #[test]
    fn test_membership_is_idempotent() {
        let graph = graph();
        let list = id("Middleware");
        let mut lists = ListAggregator::new();
        lists.add_member(&graph, &list, &id("Cors"), false);
        let outcome = lists.add_member(&graph, &list, &id("Cors"), false);

        assert_eq!(outcome, ListOutcome::AlreadyPresent { displaced: vec![] });
        assert_eq!(lists.members(&list), vec![id("Cors")]);
    }

    #[test]
    fn test_related_members_coexist_without_flag() {
        let graph = graph();
        let list = id("Middleware");
        let mut lists = ListAggregator::new();
        lists.add_member(&graph, &list, &id("Logger"), false);
        lists.add_member(&graph, &list, &id("JsonLogger"), false);
        assert_eq!(lists.members(&list), vec![id("JsonLogger"), id("Logger")]);
    }

    #[test]
    fn test_flagged_supertype_is_displaced_by_later_subtype() {
        let graph = graph();
        let list = id("Middleware");
        let mut lists = ListAggregator::new();
        lists.add_member(&graph, &list, &id("Logger"), true);
        let outcome = lists.add_member(&graph, &list, &id("JsonLogger"), false);

        assert_eq!(outcome, ListOutcome::Added { displaced: vec![id("Logger")] });
        assert_eq!(lists.members(&list), vec![id("JsonLogger")]);
    }

    #[test]
    fn test_flagged_subtype_displaces_earlier_supertype() {
        let graph = graph();
        let list = id("Middleware");
        let mut lists = ListAggregator::new();
        lists.add_member(&graph, &list, &id("Logger"), false);
        lists.add_member(&graph, &list, &id("Cors"), false);
        lists.add_member(&graph, &list, &id("JsonLogger"), true);
        assert_eq!(lists.members(&list), vec![id("Cors"), id("JsonLogger")]);
    }

    #[test]
    fn test_supertype_arriving_after_flagged_subtype_is_suppressed() {
        let graph = graph();
        let list = id("Middleware");
        let mut lists = ListAggregator::new();
        lists.add_member(&graph, &list, &id("JsonLogger"), true);
        let outcome = lists.add_member(&graph, &list, &id("Logger"), false);

        assert_eq!(outcome, ListOutcome::Suppressed { by: id("JsonLogger") });
        assert_eq!(lists.members(&list), vec![id("JsonLogger")]);
    }

    #[test]
    fn test_unknown_list_is_empty() {
        let lists = ListAggregator::new();
        assert!(lists.members(&id("Nothing")).is_empty());
        assert!(!lists.is_list(&id("Nothing")));
    }
}
