//! Tree differ - reconciles one virtual node against one live control.
//!
//! The differ only ever creates or reuses `Control`, `Group` and `Array`
//! nodes. Native and portal children are resolved to an existing control (or
//! to nothing) before it recurses, and adopted controls are attached as they
//! are, never diffed and never disposed.
//!
//! Reuse keeps the control's identity. The only hard failure is a change of
//! type class on a live control.

use tracing::{trace, warn};

use crate::config::EngineConfig;
use crate::error::{ReconcileError, Result};
use crate::host::{ControlHost, ControlInit, ControlShape};
use crate::node::{ArrayNode, GroupNode, NodeOptions, VirtualNode};
use crate::types::{ControlId, Key, ValidatorKind};
use crate::validation::ValidatorBundleManager;

use super::context::RenderContext;
use super::keyed::{diff_keys, find_duplicate, Match};
use super::portal::{PortalHost, PortalTable};
use super::registry::{Registry, RenderResult, Slot, SlotLabel};

/// A child slot after native and portal resolution.
#[derive(Clone, Copy)]
enum Target<'n> {
    /// Created and diffed by the engine.
    Owned(&'n VirtualNode),
    /// An existing control attached as-is.
    Adopted(ControlId),
}

struct Item<'n> {
    key: Key,
    node: &'n VirtualNode,
    target: Target<'n>,
}

fn node_options(node: &VirtualNode) -> Result<&NodeOptions> {
    node.options()
        .ok_or(ReconcileError::UnresolvableRoot { kind: node.tag() })
}

/// Reference-or-primitive comparison of what two nodes were rendered from.
fn same_source(previous: &VirtualNode, next: &VirtualNode) -> bool {
    match (previous.value(), next.value()) {
        (Some(a), Some(b)) => a.same(b),
        _ => false,
    }
}

pub(crate) struct Differ<'a, H: ControlHost> {
    pub host: &'a mut H,
    pub registry: &'a mut Registry,
    pub manager: ValidatorBundleManager,
    pub portals: &'a PortalTable,
    pub config: &'a EngineConfig,
}

impl<H: ControlHost> Differ<'_, H> {
    /// Create `next` when `previous` is `None`, otherwise reuse `previous`.
    pub fn process_node(
        &mut self,
        ctx: &mut RenderContext,
        name: &str,
        next: &VirtualNode,
        previous: Option<ControlId>,
    ) -> Result<ControlId> {
        if !name.is_empty() {
            ctx.push_path(name);
        }
        let result = match previous {
            None => self.create(ctx, next),
            Some(id) => self.update(ctx, next, id),
        };
        if !name.is_empty() {
            ctx.pop_path();
        }
        result
    }

    fn resolve<'n>(&self, node: &'n VirtualNode) -> Option<Target<'n>> {
        match node {
            VirtualNode::Native(native) => Some(Target::Adopted(native.control)),
            VirtualNode::Portal(portal) => {
                let control = self.portals.get_form(&portal.name);
                if control.is_none() {
                    trace!(portal = %portal.name, "portal not registered, slot left empty");
                }
                control.map(Target::Adopted)
            }
            VirtualNode::Placeholder => None,
            _ => Some(Target::Owned(node)),
        }
    }

    fn process_target(
        &mut self,
        ctx: &mut RenderContext,
        name: &str,
        target: Target<'_>,
        previous: Option<ControlId>,
    ) -> Result<ControlId> {
        match target {
            Target::Owned(node) => self.process_node(ctx, name, node, previous),
            Target::Adopted(control) => Ok(control),
        }
    }

    /// Forget an owned subtree and hand its controls back to the host.
    fn release(&mut self, control: ControlId) {
        for id in self.registry.release(control) {
            self.host.dispose(id);
        }
        trace!(control = %control, "released");
    }

    // =========================================================================
    // Create
    // =========================================================================

    fn create(&mut self, ctx: &mut RenderContext, next: &VirtualNode) -> Result<ControlId> {
        let options = node_options(next)?;
        let disabled = ctx.try_disabled(options.disabled);
        let visible = !ctx.hidden() && options.data.visible;

        // Children first, so the container is constructed complete
        ctx.push_scope(disabled, !options.data.visible, false);
        let built = self.create_children(ctx, next);
        ctx.pop_scope();
        let (shape, slots) = built?;

        let (validator_bundle, validators) = self.manager.compile(options.validator.as_ref());
        let (async_validator_bundle, async_validators) =
            self.manager.compile(options.async_validator.as_ref());

        let id = self.host.create(ControlInit {
            shape,
            disabled,
            validators,
            async_validators,
        });
        if let Some(touched) = options.touched {
            self.host.set_touched(id, touched);
        }
        if let Some(dirty) = options.dirty {
            self.host.set_dirty(id, dirty);
        }
        trace!(control = %id, path = %ctx.path(), kind = next.tag(), disabled, "created");

        self.registry.register(
            id,
            RenderResult {
                node: next.clone(),
                validator_bundle,
                async_validator_bundle,
                slots,
                visible,
            },
        );
        Ok(id)
    }

    fn create_children(
        &mut self,
        ctx: &mut RenderContext,
        next: &VirtualNode,
    ) -> Result<(ControlShape, Vec<Slot>)> {
        match next {
            VirtualNode::Control(node) => Ok((ControlShape::Leaf(node.value.clone()), Vec::new())),
            VirtualNode::Group(node) => {
                let mut entries = Vec::with_capacity(node.children.len());
                let mut slots = Vec::with_capacity(node.children.len());
                for (name, child) in &node.children {
                    let Some(target) = self.resolve(child) else {
                        continue;
                    };
                    let control = self.process_target(ctx, name, target, None)?;
                    entries.push((name.clone(), control));
                    slots.push(Slot {
                        label: SlotLabel::Name(name.clone()),
                        control,
                        node: child.clone(),
                    });
                }
                Ok((ControlShape::Group(entries), slots))
            }
            VirtualNode::Array(node) => {
                let items = self.items(ctx, node)?;
                let mut entries = Vec::with_capacity(items.len());
                let mut slots = Vec::with_capacity(items.len());
                for item in items {
                    let control =
                        self.process_target(ctx, &format!("[{}]", item.key), item.target, None)?;
                    entries.push(control);
                    slots.push(Slot {
                        label: SlotLabel::Key(item.key),
                        control,
                        node: item.node.clone(),
                    });
                }
                Ok((ControlShape::Array(entries), slots))
            }
            _ => Err(ReconcileError::UnresolvableRoot { kind: next.tag() }),
        }
    }

    // =========================================================================
    // Reuse
    // =========================================================================

    fn update(&mut self, ctx: &mut RenderContext, next: &VirtualNode, id: ControlId) -> Result<ControlId> {
        let options = node_options(next)?;
        let expected = self
            .host
            .kind(id)
            .ok_or(ReconcileError::UnknownControl(id))?;
        let found = next
            .class()
            .ok_or(ReconcileError::UnresolvableRoot { kind: next.tag() })?;
        if expected != found {
            return Err(ReconcileError::NodeTypeChanged {
                path: ctx.path(),
                expected,
                found,
            });
        }

        // Containers need their previous slots; leaves only need bundles
        let previous_slots = match next {
            VirtualNode::Control(_) => Vec::new(),
            _ => self.registry.get(id)?.slots.clone(),
        };

        let disabled = ctx.try_disabled(options.disabled);
        let was_disabled = self.host.is_disabled(id);
        if !disabled && was_disabled {
            self.host.enable(id);
        }

        let previous_sync = self.registry.bundle_or_empty(id, ValidatorKind::Sync);
        let previous_async = self.registry.bundle_or_empty(id, ValidatorKind::Async);
        let (validator_bundle, sync_changed) = self.manager.sync(
            &mut *self.host,
            id,
            ValidatorKind::Sync,
            &previous_sync,
            options.validator.as_ref(),
        )?;
        let (async_validator_bundle, async_changed) = self.manager.sync(
            &mut *self.host,
            id,
            ValidatorKind::Async,
            &previous_async,
            options.async_validator.as_ref(),
        )?;
        if sync_changed || async_changed {
            ctx.mark_validators_changed();
        }
        let validators_changed = ctx.take_validators_changed();
        let visible = !ctx.hidden() && options.data.visible;
        let was_visible = self.registry.is_visible(id);

        let slots = match next {
            VirtualNode::Control(node) => {
                if !self.host.raw_value(id).same(&node.value) {
                    self.host.set_value(id, node.value.clone());
                } else if validators_changed {
                    self.host.revalidate(id);
                }
                Vec::new()
            }
            _ => {
                // A flip of either cascade must reach items the diff would skip
                let flipped = was_disabled != disabled || was_visible != visible;
                ctx.push_scope(disabled, !options.data.visible, flipped);
                let slots = match next {
                    VirtualNode::Group(node) => self.diff_group(ctx, id, &previous_slots, node),
                    VirtualNode::Array(node) => self.diff_array(ctx, id, &previous_slots, node),
                    _ => Ok(Vec::new()),
                };
                ctx.pop_scope();
                let slots = slots?;
                if validators_changed {
                    self.host.revalidate(id);
                }
                slots
            }
        };

        // Disable after the children so none is touched under a disabled parent
        if disabled && !self.host.is_disabled(id) {
            self.host.disable(id);
        }
        self.sync_flags(id, options);
        trace!(control = %id, path = %ctx.path(), kind = next.tag(), disabled, "reused");

        self.registry.register(
            id,
            RenderResult {
                node: next.clone(),
                validator_bundle,
                async_validator_bundle,
                slots,
                visible,
            },
        );
        Ok(id)
    }

    /// Touched and dirty are only written when set and different.
    fn sync_flags(&mut self, id: ControlId, options: &NodeOptions) {
        if let Some(touched) = options.touched {
            if self.host.is_touched(id) != touched {
                self.host.set_touched(id, touched);
            }
        }
        if let Some(dirty) = options.dirty {
            if self.host.is_dirty(id) != dirty {
                self.host.set_dirty(id, dirty);
            }
        }
    }

    // =========================================================================
    // Groups
    // =========================================================================

    fn diff_group(
        &mut self,
        ctx: &mut RenderContext,
        id: ControlId,
        previous: &[Slot],
        node: &GroupNode,
    ) -> Result<Vec<Slot>> {
        let targets: Vec<(&String, &VirtualNode, Target<'_>)> = node
            .children
            .iter()
            .filter_map(|(name, child)| self.resolve(child).map(|target| (name, child, target)))
            .collect();

        // Removed: no longer named, or now resolving to nothing
        for slot in previous {
            let SlotLabel::Name(name) = &slot.label else {
                continue;
            };
            if targets.iter().any(|(n, _, _)| *n == name) {
                continue;
            }
            self.host.group_remove(id, name);
            if slot.owned() {
                self.release(slot.control);
            }
        }

        let mut slots = Vec::with_capacity(targets.len());
        for (name, child, target) in targets {
            let previous_slot = previous
                .iter()
                .find(|slot| matches!(&slot.label, SlotLabel::Name(n) if n == name));
            let reuse = match target {
                Target::Owned(_) => previous_slot.filter(|slot| slot.owned()).map(|slot| slot.control),
                Target::Adopted(_) => None,
            };
            let control = self.process_target(ctx, name, target, reuse)?;

            let current = self.host.group_child(id, name);
            if current != Some(control) {
                if current.is_some() {
                    self.host.group_remove(id, name);
                }
                if let Some(old) = previous_slot.filter(|slot| slot.owned() && slot.control != control) {
                    self.release(old.control);
                }
                self.host.group_insert(id, name, control);
                trace!(group = %id, child = %control, name = %name, "attached");
            }

            slots.push(Slot {
                label: SlotLabel::Name(name.clone()),
                control,
                node: child.clone(),
            });
        }
        Ok(slots)
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    /// Key the non-placeholder children; drop portals that resolve to nothing.
    fn items<'n>(&self, ctx: &RenderContext, node: &'n ArrayNode) -> Result<Vec<Item<'n>>> {
        let keyed: Vec<(Key, &VirtualNode)> = node
            .children
            .iter()
            .filter(|child| !child.is_placeholder())
            .enumerate()
            .map(|(index, child)| (self.item_key(ctx, node, child, index), child))
            .collect();

        let keys: Vec<Key> = keyed.iter().map(|(key, _)| key.clone()).collect();
        if let Some(key) = find_duplicate(&keys) {
            return Err(ReconcileError::DuplicateKey {
                path: ctx.path(),
                key: key.clone(),
            });
        }

        Ok(keyed
            .into_iter()
            .filter_map(|(key, child)| {
                self.resolve(child).map(|target| Item {
                    key,
                    node: child,
                    target,
                })
            })
            .collect())
    }

    fn item_key(&self, ctx: &RenderContext, node: &ArrayNode, child: &VirtualNode, index: usize) -> Key {
        let tracked = match (&node.track_by, child.value()) {
            (Some(track_by), Some(value)) => track_by(value),
            _ => None,
        };
        if let Some(key) = tracked.or_else(|| child.key().cloned()) {
            return key;
        }
        if self.config.warn_on_missing_keys {
            warn!(path = %ctx.path(), index, "array item has no key, falling back to its position");
        }
        Key::Position(index)
    }

    fn compare(previous: &Slot, item: &Item<'_>) -> Match {
        match item.target {
            Target::Owned(node) if previous.owned() => {
                if same_source(&previous.node, node) {
                    Match::Same
                } else {
                    Match::Changed
                }
            }
            Target::Adopted(control) if !previous.owned() && control == previous.control => {
                Match::Same
            }
            _ => Match::Incompatible,
        }
    }

    fn position_of(&self, id: ControlId, control: ControlId, from: usize) -> Option<usize> {
        (from..self.host.array_len(id)).find(|&i| self.host.array_at(id, i) == Some(control))
    }

    fn diff_array(
        &mut self,
        ctx: &mut RenderContext,
        id: ControlId,
        previous: &[Slot],
        node: &ArrayNode,
    ) -> Result<Vec<Slot>> {
        let items = self.items(ctx, node)?;

        let previous_keys: Vec<Key> = previous
            .iter()
            .map(|slot| match &slot.label {
                SlotLabel::Key(key) => key.clone(),
                SlotLabel::Name(name) => Key::Text(name.clone()),
            })
            .collect();
        let next_keys: Vec<Key> = items.iter().map(|item| item.key.clone()).collect();
        let diff = diff_keys(&previous_keys, &next_keys, |i, j| {
            Self::compare(&previous[i], &items[j])
        });

        // Removals, highest index first so lower positions stay valid
        for &i in &diff.removed {
            let slot = &previous[i];
            let position = if self.host.array_at(id, i) == Some(slot.control) {
                Some(i)
            } else {
                self.position_of(id, slot.control, 0)
            };
            if let Some(position) = position {
                self.host.array_remove(id, position);
            }
            if slot.owned() {
                self.release(slot.control);
            }
        }

        // Content: changed items always, the rest only when a cascade must reach them
        let refresh = ctx.refresh();
        let mut controls: Vec<Option<ControlId>> = vec![None; items.len()];
        for &(i, j) in &diff.updated {
            let item = &items[j];
            let segment = format!("[{}]", item.key);
            controls[j] = Some(self.process_target(ctx, &segment, item.target, Some(previous[i].control))?);
        }
        for &(i, j) in diff.index_updated.iter().chain(&diff.unchanged) {
            let item = &items[j];
            let control = previous[i].control;
            controls[j] = Some(if refresh && previous[i].owned() {
                let segment = format!("[{}]", item.key);
                self.process_target(ctx, &segment, item.target, Some(control))?
            } else {
                control
            });
        }
        for &j in &diff.added {
            let item = &items[j];
            let segment = format!("[{}]", item.key);
            controls[j] = Some(self.process_target(ctx, &segment, item.target, None)?);
        }
        let controls: Vec<ControlId> = controls.into_iter().flatten().collect();

        // Positions: move what exists, insert what is new
        for (j, &control) in controls.iter().enumerate() {
            if self.host.array_at(id, j) == Some(control) {
                continue;
            }
            match self.position_of(id, control, j + 1) {
                Some(from) => {
                    trace!(array = %id, child = %control, from, to = j, "moved");
                    self.host.array_move(id, from, j);
                }
                None => self.host.array_insert(id, j, control),
            }
        }
        // Anything left over was attached behind the engine's back
        while self.host.array_len(id) > controls.len() {
            let last = self.host.array_len(id) - 1;
            self.host.array_remove(id, last);
        }

        Ok(items
            .into_iter()
            .zip(controls)
            .map(|(item, control)| Slot {
                label: SlotLabel::Key(item.key),
                control,
                node: item.node.clone(),
            })
            .collect())
    }
}
