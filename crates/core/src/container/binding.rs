use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::container::descriptor::LifetimeKind;
use crate::container::hierarchy::TypeGraph;
use crate::container::identity::ComponentId;
use crate::errors::RegistrationError;

/// A contract mapped to the implementation that serves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub contract: ComponentId,
    pub implementation: ComponentId,
    pub lifetime: LifetimeKind,
    /// Anchor type for anchored lifetimes
    pub anchor: Option<ComponentId>,
}

impl Binding {
    pub fn new(
        contract: ComponentId,
        implementation: ComponentId,
        lifetime: LifetimeKind,
        anchor: Option<ComponentId>,
    ) -> Self {
        Self {
            contract,
            implementation,
            lifetime,
            anchor,
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }
}

/// Result of offering a candidate binding to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// No previous binding existed
    Bound,
    /// The candidate displaced a previous winner
    Replaced { previous: ComponentId },
    /// The candidate already was the winner
    Unchanged,
    /// The existing winner is more specific and stays
    Rejected { winner: ComponentId },
}

enum Decision {
    Keep,
    Replace,
    Reject,
    Ambiguous,
}

/// Contract to winner map with override based conflict resolution.
///
/// Unscoped and anchored bindings live on separate surfaces; each holds at
/// most one binding per contract. Candidates compete only with the winner on
/// their own surface.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    unscoped: BTreeMap<ComponentId, Binding>,
    anchored: BTreeMap<ComponentId, Binding>,
    overrides: HashMap<ComponentId, BTreeSet<ComponentId>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `candidate` for its contract.
    ///
    /// `overrides` are the implementations the candidate may replace
    /// regardless of inheritance; they are remembered so later candidates can
    /// be rejected in favor of this one.
    pub fn bind(
        &mut self,
        graph: &TypeGraph,
        candidate: Binding,
        overrides: &BTreeSet<ComponentId>,
    ) -> Result<BindOutcome, RegistrationError> {
        if !overrides.is_empty() {
            self.overrides
                .entry(candidate.implementation.clone())
                .or_default()
                .extend(overrides.iter().cloned());
        }

        let surface = if candidate.is_anchored() {
            &self.anchored
        } else {
            &self.unscoped
        };

        let Some(existing) = surface.get(&candidate.contract) else {
            debug!(
                "Bound '{}' to '{}' as {}",
                candidate.contract, candidate.implementation, candidate.lifetime
            );
            self.surface_mut(candidate.is_anchored())
                .insert(candidate.contract.clone(), candidate);
            return Ok(BindOutcome::Bound);
        };

        let decision = self.decide(graph, existing, &candidate);
        if !matches!(decision, Decision::Reject) {
            if let (Some(anchor), Some(existing_anchor)) = (&candidate.anchor, &existing.anchor) {
                if anchor != existing_anchor {
                    return Err(RegistrationError::AnchorConflict {
                        contract: candidate.contract.clone(),
                        implementation: candidate.implementation.clone(),
                        anchor_type: anchor.clone(),
                        existing: existing.implementation.clone(),
                        existing_anchor: existing_anchor.clone(),
                    });
                }
            }
        }

        match decision {
            Decision::Keep => Ok(BindOutcome::Unchanged),
            Decision::Reject => {
                warn!(
                    "Ignoring '{}' for '{}', since '{}' is more specific",
                    candidate.implementation, candidate.contract, existing.implementation
                );
                Ok(BindOutcome::Rejected {
                    winner: existing.implementation.clone(),
                })
            }
            Decision::Ambiguous => Err(RegistrationError::AmbiguousBinding {
                contract: candidate.contract.clone(),
                implementation: candidate.implementation.clone(),
                existing: existing.implementation.clone(),
            }),
            Decision::Replace => {
                let previous = existing.implementation.clone();
                debug!(
                    "Replaced '{}' with '{}' for '{}'",
                    previous, candidate.implementation, candidate.contract
                );
                self.surface_mut(candidate.is_anchored())
                    .insert(candidate.contract.clone(), candidate);
                Ok(BindOutcome::Replaced { previous })
            }
        }
    }

    fn decide(&self, graph: &TypeGraph, existing: &Binding, candidate: &Binding) -> Decision {
        let winner = &existing.implementation;
        let challenger = &candidate.implementation;

        if winner == challenger {
            return Decision::Keep;
        }
        if graph.is_subtype(challenger, winner) || self.may_override(challenger, winner) {
            return Decision::Replace;
        }
        if graph.is_subtype(winner, challenger) || self.may_override(winner, challenger) {
            return Decision::Reject;
        }
        Decision::Ambiguous
    }

    fn may_override(&self, implementation: &ComponentId, target: &ComponentId) -> bool {
        self.overrides
            .get(implementation)
            .map(|targets| targets.contains(target))
            .unwrap_or(false)
    }

    fn surface_mut(&mut self, anchored: bool) -> &mut BTreeMap<ComponentId, Binding> {
        if anchored {
            &mut self.anchored
        } else {
            &mut self.unscoped
        }
    }

    /// Unscoped winner for a contract
    pub fn get(&self, contract: &ComponentId) -> Option<&Binding> {
        self.unscoped.get(contract)
    }

    /// Anchored winner for a contract
    pub fn get_anchored(&self, contract: &ComponentId) -> Option<&Binding> {
        self.anchored.get(contract)
    }

    pub fn contains(&self, contract: &ComponentId) -> bool {
        self.unscoped.contains_key(contract) || self.anchored.contains_key(contract)
    }

    pub fn unscoped(&self) -> impl Iterator<Item = &Binding> {
        self.unscoped.values()
    }

    pub fn anchored(&self) -> impl Iterator<Item = &Binding> {
        self.anchored.values()
    }

    /// Every binding, unscoped first, each surface ordered by contract
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.unscoped.values().chain(self.anchored.values())
    }

    pub fn len(&self) -> usize {
        self.unscoped.len() + self.anchored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unscoped.is_empty() && self.anchored.is_empty()
    }
}
