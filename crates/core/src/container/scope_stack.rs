use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use crate::container::identity::ComponentId;
use crate::container::ioc_container::Instance;
use crate::container::registry::ComponentRegistry;
use crate::errors::ScopeError;

/// Identity of an anchor instance, derived from its allocation address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorKey(usize);

/// Runtime value a scope is opened with.
///
/// Anchors are compared by identity, never by value: two equal values pushed
/// as separate instances get separate singletons.
#[derive(Clone)]
pub struct AnchorInstance(Instance);

impl AnchorInstance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn key(&self) -> AnchorKey {
        AnchorKey(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn value(&self) -> Instance {
        Arc::clone(&self.0)
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    pub fn same_as(&self, other: &AnchorInstance) -> bool {
        self.key() == other.key()
    }

    fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        Arc::downgrade(&self.0)
    }
}

impl fmt::Debug for AnchorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnchorInstance").field(&self.key()).finish()
    }
}

type CellKey = (AnchorKey, ComponentId, ComponentId);

/// Lifetime cells of anchored singletons, keyed by anchor instance.
///
/// Shared by every scope stack of a registry, so pushing the same anchor
/// instance again reuses its singletons while that instance is alive. Anchors
/// are tracked weakly: the allocation outlives its value until the entry is
/// pruned, so a key cannot be reused while cells still refer to it.
#[derive(Default)]
pub struct ScopeCellStore {
    cells: DashMap<CellKey, Arc<OnceCell<Instance>>>,
    anchors: DashMap<AnchorKey, Weak<dyn Any + Send + Sync>>,
}

impl ScopeCellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell for one anchored contract of an anchor instance, created on first use
    pub fn cell(
        &self,
        anchor: &AnchorInstance,
        anchor_type: &ComponentId,
        contract: &ComponentId,
    ) -> Arc<OnceCell<Instance>> {
        let key = anchor.key();
        self.anchors.entry(key).or_insert_with(|| anchor.downgrade());
        self.cells
            .entry((key, anchor_type.clone(), contract.clone()))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }

    /// Drop every cell owned by an anchor instance
    pub fn purge(&self, anchor: &AnchorInstance) -> usize {
        let key = anchor.key();
        let before = self.cells.len();
        self.cells.retain(|(owner, _, _), _| *owner != key);
        self.anchors.remove(&key);
        before.saturating_sub(self.cells.len())
    }

    /// Drop the cells of anchors no handle refers to anymore
    pub fn prune(&self) -> usize {
        let dead: Vec<AnchorKey> = self
            .anchors
            .iter()
            .filter(|entry| entry.value().strong_count() == 0)
            .map(|entry| *entry.key())
            .collect();
        if dead.is_empty() {
            return 0;
        }

        let before = self.cells.len();
        self.cells.retain(|(owner, _, _), _| !dead.contains(owner));
        // Weak entries go last so no live anchor can take a pruned address early
        for key in &dead {
            self.anchors.remove_if(key, |_, weak| weak.strong_count() == 0);
        }
        before.saturating_sub(self.cells.len())
    }

    pub fn holds(&self, anchor: &AnchorInstance) -> bool {
        self.anchors.contains_key(&anchor.key())
    }

    /// Number of anchor instances with cells
    pub fn anchors(&self) -> usize {
        self.anchors.len()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl fmt::Debug for ScopeCellStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeCellStore")
            .field("cells", &self.cells.len())
            .field("anchors", &self.anchors.len())
            .finish()
    }
}

/// An anchored binding installed in an active frame
#[derive(Debug, Clone)]
pub struct ScopedBinding {
    implementation: ComponentId,
    cell: Arc<OnceCell<Instance>>,
}

impl ScopedBinding {
    pub fn implementation(&self) -> &ComponentId {
        &self.implementation
    }

    pub fn cell(&self) -> &OnceCell<Instance> {
        &self.cell
    }
}

/// What the stack holds for a contract
#[derive(Debug)]
pub enum ScopedSlot<'a> {
    /// The contract is the anchor type of an active frame
    Anchor(&'a AnchorInstance),
    Binding(&'a ScopedBinding),
}

#[derive(Debug)]
struct ScopeFrame {
    anchor_type: ComponentId,
    anchor: AnchorInstance,
    bindings: HashMap<ComponentId, ScopedBinding>,
}

/// Stack of active scopes owned by one unit of work.
///
/// Each anchor type appears at most once. Lookups walk from the innermost
/// frame outwards; popping a frame pops every frame pushed after it.
#[derive(Debug)]
pub struct ScopeStack {
    id: Uuid,
    registry: Arc<ComponentRegistry>,
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            frames: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Open a scope for `anchor_type` with `anchor` as its instance
    pub fn push(&mut self, anchor_type: ComponentId, anchor: AnchorInstance) -> Result<(), ScopeError> {
        if self.is_active(&anchor_type) {
            return Err(ScopeError::ScopeAlreadyActive { anchor_type });
        }

        let cells = self.registry.cells();
        cells.prune();
        let bindings = self
            .registry
            .scopes()
            .bindings_for(&anchor_type)
            .iter()
            .map(|binding| {
                let scoped = ScopedBinding {
                    implementation: binding.implementation.clone(),
                    cell: cells.cell(&anchor, &anchor_type, &binding.contract),
                };
                (binding.contract.clone(), scoped)
            })
            .collect::<HashMap<_, _>>();

        debug!(
            "Scope stack {} entered '{}' with {} anchored bindings",
            self.id,
            anchor_type,
            bindings.len()
        );
        self.frames.push(ScopeFrame {
            anchor_type,
            anchor,
            bindings,
        });
        Ok(())
    }

    /// Close the scope for `anchor_type` and every scope opened after it
    pub fn pop(&mut self, anchor_type: &ComponentId) -> Result<(), ScopeError> {
        let position = self.position(anchor_type)?;
        let popped = self.frames.split_off(position).len();
        let pruned = self.registry.cells().prune();
        debug!(
            "Scope stack {} left '{}' ({} frames popped, {} cells pruned)",
            self.id, anchor_type, popped, pruned
        );
        Ok(())
    }

    /// Like `pop`, then discard the anchored singletons of every popped frame
    pub fn pop_and_purge(&mut self, anchor_type: &ComponentId, anchor: &AnchorInstance) -> Result<(), ScopeError> {
        let position = self.position(anchor_type)?;
        if !self.frames[position].anchor.same_as(anchor) {
            return Err(ScopeError::AnchorInstanceMismatch {
                anchor_type: anchor_type.clone(),
            });
        }

        let cells = self.registry.cells();
        for frame in self.frames.split_off(position) {
            let purged = cells.purge(&frame.anchor);
            debug!(
                "Scope stack {} purged {} cells of '{}'",
                self.id, purged, frame.anchor_type
            );
        }
        Ok(())
    }

    fn position(&self, anchor_type: &ComponentId) -> Result<usize, ScopeError> {
        self.frames
            .iter()
            .position(|frame| &frame.anchor_type == anchor_type)
            .ok_or_else(|| ScopeError::ScopeNotActive {
                anchor_type: anchor_type.clone(),
            })
    }

    pub fn is_active(&self, anchor_type: &ComponentId) -> bool {
        self.frames.iter().any(|frame| &frame.anchor_type == anchor_type)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Anchor types from outermost to innermost
    pub fn active_anchor_types(&self) -> Vec<ComponentId> {
        self.frames.iter().map(|frame| frame.anchor_type.clone()).collect()
    }

    /// Instance the scope for `anchor_type` was opened with
    pub fn anchor(&self, anchor_type: &ComponentId) -> Option<&AnchorInstance> {
        self.frames
            .iter()
            .find(|frame| &frame.anchor_type == anchor_type)
            .map(|frame| &frame.anchor)
    }

    /// Innermost frame that provides `contract`
    pub fn lookup(&self, contract: &ComponentId) -> Option<ScopedSlot<'_>> {
        self.frames.iter().rev().find_map(|frame| {
            if &frame.anchor_type == contract {
                Some(ScopedSlot::Anchor(&frame.anchor))
            } else {
                frame.bindings.get(contract).map(ScopedSlot::Binding)
            }
        })
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_identity_is_by_instance() {
        let first = AnchorInstance::new(String::from("tenant-a"));
        let second = AnchorInstance::new(String::from("tenant-a"));
        let alias = first.clone();

        assert!(first.same_as(&alias));
        assert!(!first.same_as(&second));
        assert_eq!(first.downcast::<String>().as_deref().map(String::as_str), Some("tenant-a"));
        assert!(first.downcast::<u32>().is_none());
    }

    #[test]
    fn test_cell_store_reuses_and_purges() {
        let store = ScopeCellStore::new();
        let anchor = AnchorInstance::new(1u8);
        let other = AnchorInstance::new(2u8);
        let tenant = ComponentId::new("Tenant");
        let db = ComponentId::new("Db");

        let cell = store.cell(&anchor, &tenant, &db);
        let _ = cell.set(Arc::new(5u32) as Instance);
        assert!(store.cell(&anchor, &tenant, &db).get().is_some());
        assert!(store.cell(&other, &tenant, &db).get().is_none());

        assert_eq!(store.purge(&anchor), 1);
        assert!(!store.holds(&anchor));
        assert!(store.holds(&other));
        assert!(store.cell(&anchor, &tenant, &db).get().is_none());
    }

    #[test]
    fn test_cells_of_dropped_anchor_are_pruned() {
        let store = ScopeCellStore::new();
        let tenant = ComponentId::new("Tenant");
        let db = ComponentId::new("Db");
        let kept = AnchorInstance::new(1u8);
        let _ = store.cell(&kept, &tenant, &db);

        let anchor = Arc::new(String::from("short-lived"));
        let watch = Arc::downgrade(&anchor);
        let _ = store.cell(&AnchorInstance::from_arc(anchor), &tenant, &db);
        assert_eq!(store.len(), 2);
        assert!(watch.upgrade().is_none());

        assert_eq!(store.prune(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.anchors(), 1);
        assert!(store.holds(&kept));
    }
}
