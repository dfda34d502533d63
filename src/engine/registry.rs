//! Registry - what the engine last rendered for each control.
//!
//! Controls carry no engine fields. Instead the registry is a side table
//! keyed by [`ControlId`]:
//! - the last virtual node and validator bundles of every owned control
//! - the child slots as they were attached, aligned with host positions
//! - root markers written by a containing tree
//!
//! Entries are released when a diff removes the control from its parent.

use std::collections::HashMap;

use crate::error::{ReconcileError, Result};
use crate::node::VirtualNode;
use crate::types::{ControlId, Key, ValidatorKind};
use crate::validation::ValidatorBundle;

// =============================================================================
// Entries
// =============================================================================

/// Name of a child slot: a group field or an array key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotLabel {
    Name(String),
    Key(Key),
}

/// A child as it was attached in the last pass.
#[derive(Debug, Clone)]
pub struct Slot {
    pub label: SlotLabel,
    pub control: ControlId,
    /// The node as written, before native or portal resolution.
    pub node: VirtualNode,
}

impl Slot {
    /// Whether the engine created this child (and may dispose it).
    pub fn owned(&self) -> bool {
        self.node.class().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct RenderResult {
    pub node: VirtualNode,
    pub validator_bundle: ValidatorBundle,
    pub async_validator_bundle: ValidatorBundle,
    pub slots: Vec<Slot>,
    pub visible: bool,
}

impl RenderResult {
    pub fn bundle(&self, kind: ValidatorKind) -> &ValidatorBundle {
        match kind {
            ValidatorKind::Sync => &self.validator_bundle,
            ValidatorKind::Async => &self.async_validator_bundle,
        }
    }
}

/// Disabled state imposed on a root by the tree that contains it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootMarker {
    pub disabled: bool,
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Default)]
pub struct Registry {
    results: HashMap<ControlId, RenderResult>,
    roots: HashMap<ControlId, RootMarker>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ControlId, result: RenderResult) {
        self.results.insert(id, result);
    }

    /// Previous render of `id`. Controls this engine never rendered are an error.
    pub fn get(&self, id: ControlId) -> Result<&RenderResult> {
        self.results.get(&id).ok_or(ReconcileError::NotRendered(id))
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.results.contains_key(&id)
    }

    /// Previous bundle, or an empty one for controls rendered for the first time.
    pub fn bundle_or_empty(&self, id: ControlId, kind: ValidatorKind) -> ValidatorBundle {
        self.results
            .get(&id)
            .map(|result| result.bundle(kind).clone())
            .unwrap_or_default()
    }

    pub fn last_rendered_node(&self, id: ControlId) -> Option<VirtualNode> {
        self.results.get(&id).map(|result| result.node.clone())
    }

    pub fn is_visible(&self, id: ControlId) -> bool {
        self.results.get(&id).is_some_and(|result| result.visible)
    }

    /// Forget `id` and every owned descendant, disposing compiled validators.
    ///
    /// Returns the released controls, children before parents.
    pub fn release(&mut self, id: ControlId) -> Vec<ControlId> {
        let mut released = Vec::new();
        self.release_into(id, &mut released);
        released
    }

    fn release_into(&mut self, id: ControlId, released: &mut Vec<ControlId>) {
        if let Some(result) = self.results.remove(&id) {
            for slot in result.slots.iter().filter(|slot| slot.owned()) {
                self.release_into(slot.control, released);
            }
            result.validator_bundle.dispose();
            result.async_validator_bundle.dispose();
        }
        self.roots.remove(&id);
        released.push(id);
    }

    pub fn root_marker(&self, id: ControlId) -> Option<RootMarker> {
        self.roots.get(&id).copied()
    }

    pub fn set_root_marker(&mut self, id: ControlId, marker: RootMarker) {
        self.roots.insert(id, marker);
    }

    /// Number of registered controls.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{control, native, ControlProps};
    use crate::validation::CompiledValidator;

    fn result(slots: Vec<Slot>) -> RenderResult {
        RenderResult {
            node: control(ControlProps::default()),
            validator_bundle: ValidatorBundle::default(),
            async_validator_bundle: ValidatorBundle::default(),
            slots,
            visible: true,
        }
    }

    #[test]
    fn test_get_unrendered_is_error() {
        let registry = Registry::new();
        assert!(matches!(
            registry.get(ControlId(7)),
            Err(ReconcileError::NotRendered(ControlId(7)))
        ));
        assert!(registry
            .bundle_or_empty(ControlId(7), ValidatorKind::Sync)
            .validators
            .is_empty());
    }

    #[test]
    fn test_release_skips_adopted_children() {
        let mut registry = Registry::new();
        registry.register(ControlId(1), result(vec![]));
        registry.register(ControlId(2), result(vec![]));
        registry.register(
            ControlId(3),
            result(vec![
                Slot {
                    label: SlotLabel::Name("owned".into()),
                    control: ControlId(1),
                    node: control(ControlProps::default()),
                },
                Slot {
                    label: SlotLabel::Name("adopted".into()),
                    control: ControlId(2),
                    node: native(ControlId(2)),
                },
            ]),
        );

        let released = registry.release(ControlId(3));

        assert_eq!(released, vec![ControlId(1), ControlId(3)]);
        assert!(registry.contains(ControlId(2)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_disposes_compiled() {
        let mut registry = Registry::new();
        let compiled = CompiledValidator::new(vec![]);
        let mut entry = result(vec![]);
        entry.validator_bundle.compiled = Some(compiled.clone());
        registry.register(ControlId(1), entry);

        registry.release(ControlId(1));

        assert!(compiled.is_disposed());
    }
}
