//! In-memory control host.
//!
//! An arena of controls behaving like a conventional reactive-forms library:
//! - enable/disable cascades to every descendant
//! - value and validity changes bubble to the ancestors
//! - validators are stored per control and only re-run on value writes,
//!   enable/disable, child changes and explicit revalidation
//!
//! Ids are handed out sequentially and never reused.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{ReconcileError, Result};
use crate::types::{ControlId, ControlKind, ValidationErrors, ValidatorKind, Value};
use crate::validation::{merge_errors, Validator};

use super::{ChangeListener, ControlHost, ControlInit, ControlShape, SubscriptionId, ValidatorCapability};

bitflags::bitflags! {
    /// Per-control state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlFlags: u8 {
        const DISABLED = 1 << 0;
        const TOUCHED = 1 << 1;
        const DIRTY = 1 << 2;
    }
}

/// Host call counters, for asserting what a pass actually touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub creates: u64,
    pub disposes: u64,
    pub set_values: u64,
    pub revalidations: u64,
    pub enables: u64,
    pub disables: u64,
    pub child_inserts: u64,
    pub child_removes: u64,
    pub validator_writes: u64,
}

#[derive(Debug)]
enum Shape {
    Leaf(Value),
    Group(IndexMap<String, ControlId>),
    Array(Vec<ControlId>),
}

struct Entry {
    shape: Shape,
    parent: Option<ControlId>,
    flags: ControlFlags,
    validators: Vec<Validator>,
    async_validators: Vec<Validator>,
    errors: Option<ValidationErrors>,
    value_changes: u64,
    status_changes: u64,
    listeners: Vec<(SubscriptionId, ChangeListener)>,
}

impl Entry {
    fn validators(&self, kind: ValidatorKind) -> &Vec<Validator> {
        match kind {
            ValidatorKind::Sync => &self.validators,
            ValidatorKind::Async => &self.async_validators,
        }
    }

    fn validators_mut(&mut self, kind: ValidatorKind) -> &mut Vec<Validator> {
        match kind {
            ValidatorKind::Sync => &mut self.validators,
            ValidatorKind::Async => &mut self.async_validators,
        }
    }

    fn children(&self) -> Vec<ControlId> {
        match &self.shape {
            Shape::Leaf(_) => Vec::new(),
            Shape::Group(children) => children.values().copied().collect(),
            Shape::Array(children) => children.clone(),
        }
    }
}

// =============================================================================
// MemoryHost
// =============================================================================

pub struct MemoryHost {
    capability: ValidatorCapability,
    entries: Vec<Option<Entry>>,
    subscriptions: HashMap<SubscriptionId, ControlId>,
    next_subscription: u64,
    stats: HostStats,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new(ValidatorCapability::default())
    }
}

impl MemoryHost {
    pub fn new(capability: ValidatorCapability) -> Self {
        Self {
            capability,
            entries: Vec::new(),
            subscriptions: HashMap::new(),
            next_subscription: 0,
            stats: HostStats::default(),
        }
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = HostStats::default();
    }

    /// Whether `id` is still alive.
    pub fn contains(&self, id: ControlId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of live controls.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parent(&self, id: ControlId) -> Option<ControlId> {
        self.entry(id).and_then(|e| e.parent)
    }

    /// Children in order (group insertion order or array position).
    pub fn children(&self, id: ControlId) -> Vec<ControlId> {
        self.entry(id).map(Entry::children).unwrap_or_default()
    }

    /// Group child names in insertion order.
    pub fn names(&self, id: ControlId) -> Vec<String> {
        match self.entry(id).map(|e| &e.shape) {
            Some(Shape::Group(children)) => children.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn flags(&self, id: ControlId) -> ControlFlags {
        self.entry(id).map(|e| e.flags).unwrap_or_default()
    }

    /// Valid when enabled and neither it nor an enabled descendant has errors.
    pub fn is_valid(&self, id: ControlId) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        if entry.flags.contains(ControlFlags::DISABLED) {
            return true;
        }
        entry.errors.is_none() && entry.children().into_iter().all(|c| self.is_valid(c))
    }

    pub fn value_change_count(&self, id: ControlId) -> u64 {
        self.entry(id).map_or(0, |e| e.value_changes)
    }

    pub fn status_change_count(&self, id: ControlId) -> u64 {
        self.entry(id).map_or(0, |e| e.status_changes)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn entry(&self, id: ControlId) -> Option<&Entry> {
        self.entries.get(id.0).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, id: ControlId) -> Option<&mut Entry> {
        self.entries.get_mut(id.0).and_then(Option::as_mut)
    }

    fn require(&self, id: ControlId) -> Result<&Entry> {
        self.entry(id).ok_or(ReconcileError::UnknownControl(id))
    }

    fn require_mut(&mut self, id: ControlId) -> Result<&mut Entry> {
        self.entry_mut(id).ok_or(ReconcileError::UnknownControl(id))
    }

    fn check_tier(&self, tier: ValidatorCapability, operation: &'static str) -> Result<()> {
        if self.capability == tier {
            Ok(())
        } else {
            Err(ReconcileError::unsupported(self.capability, operation))
        }
    }

    fn set_parent(&mut self, child: ControlId, parent: Option<ControlId>) {
        if let Some(entry) = self.entry_mut(child) {
            entry.parent = parent;
        }
    }

    fn compute_errors(&self, id: ControlId) -> Option<ValidationErrors> {
        let entry = self.entry(id)?;
        if entry.flags.contains(ControlFlags::DISABLED) {
            return None;
        }
        let value = self.value(id);
        merge_errors(&entry.validators, &value).or_else(|| {
            // Async validators only run once the sync ones pass
            merge_errors(&entry.async_validators, &value)
        })
    }

    fn refresh_errors(&mut self, id: ControlId) {
        let errors = self.compute_errors(id);
        if let Some(entry) = self.entry_mut(id) {
            entry.errors = errors;
        }
    }

    /// Recompute errors bottom-up for the whole subtree, silently.
    fn refresh_subtree(&mut self, id: ControlId) {
        for child in self.children(id) {
            self.refresh_subtree(child);
        }
        self.refresh_errors(id);
    }

    /// Recompute `id` and every ancestor, counting one value and one status
    /// change on each, then notify listeners.
    fn update_and_bubble(&mut self, id: ControlId) {
        let mut fired = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            self.refresh_errors(cid);
            let Some(entry) = self.entry_mut(cid) else {
                break;
            };
            entry.value_changes += 1;
            entry.status_changes += 1;
            fired.extend(entry.listeners.iter().map(|(_, l)| l.clone()));
            current = entry.parent;
        }
        for listener in fired {
            listener(id);
        }
    }

    fn set_flag_recursive(&mut self, id: ControlId, flag: ControlFlags, on: bool) {
        for child in self.children(id) {
            self.set_flag_recursive(child, flag, on);
        }
        if let Some(entry) = self.entry_mut(id) {
            entry.flags.set(flag, on);
        }
    }

    /// Write values down the subtree without notifications.
    fn assign(&mut self, id: ControlId, value: Value) {
        let targets: Vec<(ControlId, Value)> = match self.entry_mut(id).map(|e| &mut e.shape) {
            Some(Shape::Leaf(current)) => {
                *current = value;
                return;
            }
            Some(Shape::Group(children)) => children
                .iter()
                .filter_map(|(name, child)| value.get(name).map(|v| (*child, v.clone())))
                .collect(),
            Some(Shape::Array(children)) => children
                .iter()
                .enumerate()
                .filter_map(|(i, child)| value.index(i).map(|v| (*child, v.clone())))
                .collect(),
            None => return,
        };
        for (child, value) in targets {
            self.assign(child, value);
        }
    }

    fn collect(&self, id: ControlId, raw: bool) -> Value {
        let Some(entry) = self.entry(id) else {
            return Value::Null;
        };
        let include_all = raw
            || entry.flags.contains(ControlFlags::DISABLED)
            || entry
                .children()
                .iter()
                .all(|c| self.is_disabled(*c));
        let keep = |child: ControlId| include_all || !self.is_disabled(child);

        match &entry.shape {
            Shape::Leaf(value) => value.clone(),
            Shape::Group(children) => Value::map(
                children
                    .iter()
                    .filter(|(_, c)| keep(**c))
                    .map(|(name, c)| (name.clone(), self.collect(*c, raw))),
            ),
            Shape::Array(children) => Value::list(
                children
                    .iter()
                    .filter(|c| keep(**c))
                    .map(|c| self.collect(*c, raw)),
            ),
        }
    }
}

impl ControlHost for MemoryHost {
    fn validator_capability(&self) -> ValidatorCapability {
        self.capability
    }

    fn create(&mut self, init: ControlInit) -> ControlId {
        let id = ControlId(self.entries.len());
        let mut children = Vec::new();
        let shape = match init.shape {
            ControlShape::Leaf(value) => Shape::Leaf(value),
            ControlShape::Group(entries) => {
                children.extend(entries.iter().map(|(_, c)| *c));
                Shape::Group(entries.into_iter().collect())
            }
            ControlShape::Array(entries) => {
                children.extend(entries.iter().copied());
                Shape::Array(entries)
            }
        };
        let flags = if init.disabled {
            ControlFlags::DISABLED
        } else {
            ControlFlags::empty()
        };

        self.entries.push(Some(Entry {
            shape,
            parent: None,
            flags,
            validators: init.validators,
            async_validators: init.async_validators,
            errors: None,
            value_changes: 0,
            status_changes: 0,
            listeners: Vec::new(),
        }));
        for child in children {
            self.set_parent(child, Some(id));
        }
        self.refresh_errors(id);
        self.stats.creates += 1;
        id
    }

    fn dispose(&mut self, id: ControlId) {
        let Some(entry) = self.entries.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for child in entry.children() {
            // Adopted children may outlive their former parent
            if self.parent(child) == Some(id) {
                self.set_parent(child, None);
            }
        }
        for (subscription, _) in entry.listeners {
            self.subscriptions.remove(&subscription);
        }
        self.stats.disposes += 1;
    }

    fn kind(&self, id: ControlId) -> Option<ControlKind> {
        self.entry(id).map(|e| match e.shape {
            Shape::Leaf(_) => ControlKind::Control,
            Shape::Group(_) => ControlKind::Group,
            Shape::Array(_) => ControlKind::Array,
        })
    }

    fn is_disabled(&self, id: ControlId) -> bool {
        self.entry(id)
            .is_some_and(|e| e.flags.contains(ControlFlags::DISABLED))
    }

    fn enable(&mut self, id: ControlId) {
        self.set_flag_recursive(id, ControlFlags::DISABLED, false);
        self.refresh_subtree(id);
        self.update_and_bubble(id);
        self.stats.enables += 1;
    }

    fn disable(&mut self, id: ControlId) {
        self.set_flag_recursive(id, ControlFlags::DISABLED, true);
        self.refresh_subtree(id);
        self.update_and_bubble(id);
        self.stats.disables += 1;
    }

    fn raw_value(&self, id: ControlId) -> Value {
        self.collect(id, true)
    }

    fn value(&self, id: ControlId) -> Value {
        self.collect(id, false)
    }

    fn set_value(&mut self, id: ControlId, value: Value) {
        self.assign(id, value);
        self.refresh_subtree(id);
        self.update_and_bubble(id);
        self.stats.set_values += 1;
    }

    fn revalidate(&mut self, id: ControlId) {
        self.update_and_bubble(id);
        self.stats.revalidations += 1;
    }

    fn group_child(&self, id: ControlId, name: &str) -> Option<ControlId> {
        match &self.entry(id)?.shape {
            Shape::Group(children) => children.get(name).copied(),
            _ => None,
        }
    }

    fn group_insert(&mut self, id: ControlId, name: &str, child: ControlId) {
        let Some(Shape::Group(children)) = self.entry_mut(id).map(|e| &mut e.shape) else {
            return;
        };
        children.insert(name.to_string(), child);
        self.set_parent(child, Some(id));
        self.update_and_bubble(id);
        self.stats.child_inserts += 1;
    }

    fn group_remove(&mut self, id: ControlId, name: &str) -> Option<ControlId> {
        let Some(Shape::Group(children)) = self.entry_mut(id).map(|e| &mut e.shape) else {
            return None;
        };
        let child = children.shift_remove(name)?;
        if self.parent(child) == Some(id) {
            self.set_parent(child, None);
        }
        self.update_and_bubble(id);
        self.stats.child_removes += 1;
        Some(child)
    }

    fn array_len(&self, id: ControlId) -> usize {
        match self.entry(id).map(|e| &e.shape) {
            Some(Shape::Array(children)) => children.len(),
            _ => 0,
        }
    }

    fn array_at(&self, id: ControlId, index: usize) -> Option<ControlId> {
        match &self.entry(id)?.shape {
            Shape::Array(children) => children.get(index).copied(),
            _ => None,
        }
    }

    fn array_insert(&mut self, id: ControlId, index: usize, child: ControlId) {
        let Some(Shape::Array(children)) = self.entry_mut(id).map(|e| &mut e.shape) else {
            return;
        };
        let index = index.min(children.len());
        children.insert(index, child);
        self.set_parent(child, Some(id));
        self.update_and_bubble(id);
        self.stats.child_inserts += 1;
    }

    fn array_remove(&mut self, id: ControlId, index: usize) -> Option<ControlId> {
        let Some(Shape::Array(children)) = self.entry_mut(id).map(|e| &mut e.shape) else {
            return None;
        };
        if index >= children.len() {
            return None;
        }
        let child = children.remove(index);
        if self.parent(child) == Some(id) {
            self.set_parent(child, None);
        }
        self.update_and_bubble(id);
        self.stats.child_removes += 1;
        Some(child)
    }

    fn attached_validators(&self, id: ControlId, kind: ValidatorKind) -> Vec<Validator> {
        self.entry(id)
            .map(|e| e.validators(kind).clone())
            .unwrap_or_default()
    }

    fn add_validators(
        &mut self,
        id: ControlId,
        kind: ValidatorKind,
        validators: &[Validator],
    ) -> Result<()> {
        self.check_tier(ValidatorCapability::Incremental, "add_validators")?;
        let list = self.require_mut(id)?.validators_mut(kind);
        for validator in validators {
            if !list.contains(validator) {
                list.push(validator.clone());
            }
        }
        self.stats.validator_writes += 1;
        Ok(())
    }

    fn remove_validators(
        &mut self,
        id: ControlId,
        kind: ValidatorKind,
        validators: &[Validator],
    ) -> Result<()> {
        self.check_tier(ValidatorCapability::Incremental, "remove_validators")?;
        self.require_mut(id)?
            .validators_mut(kind)
            .retain(|v| !validators.contains(v));
        self.stats.validator_writes += 1;
        Ok(())
    }

    fn set_validators(
        &mut self,
        id: ControlId,
        kind: ValidatorKind,
        validators: Vec<Validator>,
    ) -> Result<()> {
        self.check_tier(ValidatorCapability::Bulk, "set_validators")?;
        *self.require_mut(id)?.validators_mut(kind) = validators;
        self.stats.validator_writes += 1;
        Ok(())
    }

    fn set_validator(
        &mut self,
        id: ControlId,
        kind: ValidatorKind,
        validator: Option<Validator>,
    ) -> Result<()> {
        self.check_tier(ValidatorCapability::Single, "set_validator")?;
        *self.require_mut(id)?.validators_mut(kind) = validator.into_iter().collect();
        self.stats.validator_writes += 1;
        Ok(())
    }

    fn errors(&self, id: ControlId) -> Option<ValidationErrors> {
        self.require(id).ok().and_then(|e| e.errors.clone())
    }

    fn is_touched(&self, id: ControlId) -> bool {
        self.flags(id).contains(ControlFlags::TOUCHED)
    }

    fn set_touched(&mut self, id: ControlId, touched: bool) {
        if let Some(entry) = self.entry_mut(id) {
            entry.flags.set(ControlFlags::TOUCHED, touched);
        }
    }

    fn is_dirty(&self, id: ControlId) -> bool {
        self.flags(id).contains(ControlFlags::DIRTY)
    }

    fn set_dirty(&mut self, id: ControlId, dirty: bool) {
        if let Some(entry) = self.entry_mut(id) {
            entry.flags.set(ControlFlags::DIRTY, dirty);
        }
    }

    fn subscribe(&mut self, id: ControlId, listener: ChangeListener) -> SubscriptionId {
        let subscription = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        if let Some(entry) = self.entry_mut(id) {
            entry.listeners.push((subscription, listener));
            self.subscriptions.insert(subscription, id);
        }
        subscription
    }

    fn unsubscribe(&mut self, subscription: SubscriptionId) {
        let Some(id) = self.subscriptions.remove(&subscription) else {
            return;
        };
        if let Some(entry) = self.entry_mut(id) {
            entry.listeners.retain(|(s, _)| *s != subscription);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::types::error;

    fn leaf(host: &mut MemoryHost, value: impl Into<Value>) -> ControlId {
        host.create(ControlInit {
            shape: ControlShape::Leaf(value.into()),
            disabled: false,
            validators: Vec::new(),
            async_validators: Vec::new(),
        })
    }

    fn group(host: &mut MemoryHost, children: Vec<(&str, ControlId)>) -> ControlId {
        host.create(ControlInit {
            shape: ControlShape::Group(
                children
                    .into_iter()
                    .map(|(n, c)| (n.to_string(), c))
                    .collect(),
            ),
            disabled: false,
            validators: Vec::new(),
            async_validators: Vec::new(),
        })
    }

    #[test]
    fn test_raw_and_collected_values() {
        let mut host = MemoryHost::default();
        let a = leaf(&mut host, 1);
        let b = leaf(&mut host, 2);
        let g = group(&mut host, vec![("a", a), ("b", b)]);

        host.disable(b);

        assert_eq!(host.raw_value(g), Value::map([("a", 1.into()), ("b", 2.into())]));
        assert_eq!(host.value(g), Value::map([("a", Value::from(1))]));
    }

    #[test]
    fn test_disable_cascades_and_enable_restores() {
        let mut host = MemoryHost::default();
        let a = leaf(&mut host, 1);
        let g = group(&mut host, vec![("a", a)]);

        host.disable(g);
        assert!(host.is_disabled(a));

        host.enable(g);
        assert!(!host.is_disabled(a));
    }

    #[test]
    fn test_validity_bubbles() {
        let mut host = MemoryHost::new(ValidatorCapability::Bulk);
        let a = host.create(ControlInit {
            shape: ControlShape::Leaf(Value::Null),
            disabled: false,
            validators: vec![crate::validation::required_validator()],
            async_validators: Vec::new(),
        });
        let g = group(&mut host, vec![("a", a)]);

        assert_eq!(host.errors(a), Some(error("required")));
        assert!(!host.is_valid(g));

        host.set_value(a, "x".into());
        assert!(host.is_valid(g));
    }

    #[test]
    fn test_tier_gating() {
        let mut host = MemoryHost::new(ValidatorCapability::Single);
        let a = leaf(&mut host, 1);

        assert!(host.add_validators(a, ValidatorKind::Sync, &[]).is_err());
        assert!(host.set_validators(a, ValidatorKind::Sync, vec![]).is_err());
        assert!(host.set_validator(a, ValidatorKind::Sync, None).is_ok());
    }

    #[test]
    fn test_listeners_fire_for_descendants() {
        let mut host = MemoryHost::default();
        let a = leaf(&mut host, 1);
        let g = group(&mut host, vec![("a", a)]);

        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let sub = host.subscribe(g, Rc::new(move |_| hits_clone.set(hits_clone.get() + 1)));

        host.set_value(a, 2.into());
        assert_eq!(hits.get(), 1);

        host.unsubscribe(sub);
        host.set_value(a, 3.into());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_dispose_detaches_children() {
        let mut host = MemoryHost::default();
        let a = leaf(&mut host, 1);
        let g = group(&mut host, vec![("a", a)]);

        host.dispose(g);
        assert!(!host.contains(g));
        assert!(host.contains(a));
        assert_eq!(host.parent(a), None);
    }
}
