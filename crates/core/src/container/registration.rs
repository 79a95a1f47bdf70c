use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::container::binding::{BindOutcome, Binding, BindingTable};
use crate::container::descriptor::ComponentDescriptor;
use crate::container::hierarchy::{TypeGraph, TypeKind};
use crate::container::identity::{ComponentId, EnvironmentTag};
use crate::container::ioc_container::ComponentContainer;
use crate::container::known_types::KnownTypeMap;
use crate::container::list::{ListAggregator, ListOutcome};
use crate::container::registry::ComponentRegistry;
use crate::container::scope::Capabilities;
use crate::errors::RegistrationError;

/// Counters describing what one batch did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationSummary {
    pub descriptors: usize,
    pub skipped_non_concrete: usize,
    pub skipped_environment: usize,
    pub skipped_no_lifetime: usize,
    pub bound: usize,
    pub replaced: usize,
    pub rejected: usize,
    pub list_members: usize,
}

#[derive(Debug, Clone, Default)]
struct RegistrationState {
    bindings: BindingTable,
    lists: ListAggregator,
    known_types: KnownTypeMap,
}

/// Scans component descriptors into binding, list and known-type tables.
///
/// Batches are atomic: a batch is applied to a staged copy of the tables and
/// committed only when every descriptor in it was accepted.
#[derive(Debug)]
pub struct RegistrationDriver {
    config: RegistryConfig,
    graph: TypeGraph,
    capabilities: Capabilities,
    state: RegistrationState,
}

impl RegistrationDriver {
    /// Driver over a validated type graph, accepting every lifetime.
    ///
    /// Known types are collected from the whole graph up front, since
    /// serializable types usually have no component entry of their own.
    pub fn new(graph: TypeGraph, config: RegistryConfig) -> Result<Self, RegistrationError> {
        graph.validate()?;

        let mut state = RegistrationState::default();
        for node in graph.nodes().filter(|node| node.kind != TypeKind::Contract) {
            state.known_types.register(&graph, &node.id);
        }

        Ok(Self {
            config,
            graph,
            capabilities: Capabilities::all(),
            state,
        })
    }

    /// Driver limited to the lifetimes `container` supports
    pub fn for_container<C>(graph: TypeGraph, config: RegistryConfig, container: &C) -> Result<Self, RegistrationError>
    where
        C: ComponentContainer + ?Sized,
    {
        Ok(Self::new(graph, config)?.with_capabilities(container.capabilities()))
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.state.bindings
    }

    pub fn lists(&self) -> &ListAggregator {
        &self.state.lists
    }

    pub fn known_types(&self) -> &KnownTypeMap {
        &self.state.known_types
    }

    /// Process a batch against the configured environment tags
    pub fn process<I>(&mut self, descriptors: I) -> Result<RegistrationSummary, RegistrationError>
    where
        I: IntoIterator<Item = ComponentDescriptor>,
    {
        let tags = self.config.environment_tags.clone();
        self.process_for_environment(descriptors, &tags)
    }

    /// Process a batch against an explicit set of environment tags
    pub fn process_for_environment<I>(
        &mut self,
        descriptors: I,
        environment: &BTreeSet<EnvironmentTag>,
    ) -> Result<RegistrationSummary, RegistrationError>
    where
        I: IntoIterator<Item = ComponentDescriptor>,
    {
        let mut staged = self.state.clone();
        let mut summary = RegistrationSummary::default();

        for descriptor in descriptors {
            summary.descriptors += 1;
            self.process_descriptor(&mut staged, &descriptor, environment, &mut summary)?;
        }

        self.state = staged;
        info!(
            "Registered {} descriptors: {} bound, {} replaced, {} rejected, {} list members",
            summary.descriptors, summary.bound, summary.replaced, summary.rejected, summary.list_members
        );
        Ok(summary)
    }

    fn process_descriptor(
        &self,
        state: &mut RegistrationState,
        descriptor: &ComponentDescriptor,
        environment: &BTreeSet<EnvironmentTag>,
        summary: &mut RegistrationSummary,
    ) -> Result<(), RegistrationError> {
        let implementation = &descriptor.implementation;
        let kind = self
            .graph
            .kind(implementation)
            .ok_or_else(|| RegistrationError::UnknownComponent {
                component: implementation.clone(),
                referenced_by: implementation.clone(),
            })?;

        if kind != TypeKind::Concrete {
            summary.skipped_non_concrete += 1;
            return Ok(());
        }

        if descriptor.lifetimes.len() > 1 {
            return Err(RegistrationError::DuplicateLifetimeDeclaration {
                implementation: implementation.clone(),
                count: descriptor.lifetimes.len(),
            });
        }
        if descriptor.lists.len() > 1 {
            return Err(RegistrationError::DuplicateListDeclaration {
                implementation: implementation.clone(),
                count: descriptor.lists.len(),
            });
        }

        if !descriptor.is_eligible(environment) {
            debug!("Skipping '{}', environment restriction not met", implementation);
            summary.skipped_environment += 1;
            return Ok(());
        }

        let Some(lifetime) = descriptor.lifetime() else {
            summary.skipped_no_lifetime += 1;
            return Ok(());
        };

        if !self.capabilities.supports(lifetime.container_lifetime()) {
            return Err(RegistrationError::unsupported_lifetime(
                implementation,
                implementation,
                lifetime.to_string(),
            ));
        }

        let anchor = lifetime.anchor_type(&self.config.request_anchor);
        for contract in self.effective_contracts(descriptor) {
            if !self.graph.satisfies(implementation, &contract) {
                return Err(RegistrationError::ContractNotSatisfied {
                    contract,
                    implementation: implementation.clone(),
                    usage: "",
                });
            }

            let binding = Binding::new(contract, implementation.clone(), lifetime.clone(), anchor.clone());
            match state
                .bindings
                .bind(&self.graph, binding, &descriptor.explicit_overrides)?
            {
                BindOutcome::Bound => summary.bound += 1,
                BindOutcome::Replaced { .. } => summary.replaced += 1,
                BindOutcome::Rejected { .. } => summary.rejected += 1,
                BindOutcome::Unchanged => {}
            }
        }

        if let Some(list) = descriptor.list() {
            for target in &list.targets {
                if !self.graph.satisfies(implementation, target) {
                    return Err(RegistrationError::ContractNotSatisfied {
                        contract: target.clone(),
                        implementation: implementation.clone(),
                        usage: " for list injection",
                    });
                }
                let outcome = state
                    .lists
                    .add_member(&self.graph, target, implementation, list.replace_supertypes);
                if matches!(outcome, ListOutcome::Added { .. }) {
                    summary.list_members += 1;
                }
            }
        }

        Ok(())
    }

    /// The implementation itself, then its declared or discovered contracts
    fn effective_contracts(&self, descriptor: &ComponentDescriptor) -> Vec<ComponentId> {
        let implementation = &descriptor.implementation;
        let discovered;
        let contracts = if descriptor.contracts.is_empty() {
            discovered = self.graph.contracts_of(implementation);
            &discovered
        } else {
            &descriptor.contracts
        };

        let mut effective = vec![implementation.clone()];
        for contract in contracts {
            if !effective.contains(contract) {
                effective.push(contract.clone());
            }
        }
        effective
    }

    /// Emit every binding to `container` and freeze the tables
    pub fn seal<C>(self, container: &mut C) -> Result<Arc<ComponentRegistry>, RegistrationError>
    where
        C: ComponentContainer + ?Sized,
    {
        use crate::container::scope::ContainerLifetime;

        for binding in self.state.bindings.iter() {
            let contract = &binding.contract;
            let implementation = &binding.implementation;
            let lifetime = binding.lifetime.container_lifetime();

            match (&binding.anchor, lifetime) {
                (Some(anchor), _) => container.register_scoped(contract, implementation, anchor)?,
                (None, ContainerLifetime::Singleton) => container.register_singleton(contract, implementation)?,
                (None, ContainerLifetime::Transient) => container.register_transient(contract, implementation)?,
                (None, other) => match other.unit_of_work() {
                    Some(unit) => container.register_per_unit_of_work(contract, implementation, unit)?,
                    None => {
                        return Err(RegistrationError::container(
                            contract,
                            implementation,
                            format!("'{}' bindings need an anchor type", other),
                        ))
                    }
                },
            }
        }

        let registry = ComponentRegistry::new(
            self.config,
            self.graph,
            self.state.bindings,
            self.state.lists,
            self.state.known_types,
        );
        info!(
            "Sealed registry {} with {} bindings and {} lists",
            registry.id(),
            registry.bindings().len(),
            registry.lists().len()
        );
        Ok(Arc::new(registry))
    }
}
