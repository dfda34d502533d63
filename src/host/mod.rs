//! Control host - the capability interface the engine drives.
//!
//! The engine never stores control state itself. Everything it needs from a
//! live control (value, enabled state, attached validators, tiny flags) goes
//! through [`ControlHost`]. [`MemoryHost`] is the bundled implementation.
//!
//! # Validator capability tiers
//!
//! Hosts differ in how validators can be attached. The host declares one
//! [`ValidatorCapability`] and the engine picks its strategy once, at
//! construction:
//!
//! - [`Incremental`](ValidatorCapability::Incremental): validators are
//!   individually addressable (`add_validators` / `remove_validators`)
//! - [`Bulk`](ValidatorCapability::Bulk): the whole list is replaced (`set_validators`)
//! - [`Single`](ValidatorCapability::Single): one slot holding one composed
//!   function (`set_validator`)
//!
//! The tier operations default to [`ReconcileError::Unsupported`], so a host
//! only implements the ones it offers.

mod memory;

pub use memory::*;

use std::rc::Rc;

use crate::error::{ReconcileError, Result};
use crate::types::{ControlId, ControlKind, ValidationErrors, ValidatorKind, Value};
use crate::validation::Validator;

/// How validators are attached to host controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidatorCapability {
    /// Add and remove individual validators.
    #[default]
    Incremental,
    /// Replace the whole validator list.
    Bulk,
    /// A single validator slot.
    Single,
}

/// Callback invoked with the id of the control whose value changed.
pub type ChangeListener = Rc<dyn Fn(ControlId)>;

/// Handle returned by [`ControlHost::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Initial children or value of a control under construction.
#[derive(Debug, Clone)]
pub enum ControlShape {
    Leaf(Value),
    Group(Vec<(String, ControlId)>),
    Array(Vec<ControlId>),
}

impl ControlShape {
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlShape::Leaf(_) => ControlKind::Control,
            ControlShape::Group(_) => ControlKind::Group,
            ControlShape::Array(_) => ControlKind::Array,
        }
    }
}

/// Everything a host needs to construct a control in one call.
#[derive(Debug, Clone)]
pub struct ControlInit {
    pub shape: ControlShape,
    pub disabled: bool,
    /// Already in the form the host's tier expects (one handle for `Single`).
    pub validators: Vec<Validator>,
    pub async_validators: Vec<Validator>,
}

pub trait ControlHost {
    /// Read once by the engine; the strategy is fixed afterwards.
    fn validator_capability(&self) -> ValidatorCapability;

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Construct a control. Children in the shape are fully built already.
    fn create(&mut self, init: ControlInit) -> ControlId;

    /// Called for engine-owned controls removed by a diff.
    fn dispose(&mut self, _id: ControlId) {}

    fn kind(&self, id: ControlId) -> Option<ControlKind>;

    // -------------------------------------------------------------------------
    // Enabled state
    // -------------------------------------------------------------------------

    fn is_disabled(&self, id: ControlId) -> bool;
    fn enable(&mut self, id: ControlId);
    fn disable(&mut self, id: ControlId);

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Value including disabled descendants.
    fn raw_value(&self, id: ControlId) -> Value;
    /// Value without disabled descendants.
    fn value(&self, id: ControlId) -> Value;
    fn set_value(&mut self, id: ControlId, value: Value);
    /// Re-run validation without changing the value.
    fn revalidate(&mut self, id: ControlId);

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    fn group_child(&self, id: ControlId, name: &str) -> Option<ControlId>;
    fn group_insert(&mut self, id: ControlId, name: &str, child: ControlId);
    fn group_remove(&mut self, id: ControlId, name: &str) -> Option<ControlId>;

    fn array_len(&self, id: ControlId) -> usize;
    fn array_at(&self, id: ControlId, index: usize) -> Option<ControlId>;
    fn array_insert(&mut self, id: ControlId, index: usize, child: ControlId);
    fn array_remove(&mut self, id: ControlId, index: usize) -> Option<ControlId>;

    /// Move a child without recreating it.
    fn array_move(&mut self, id: ControlId, from: usize, to: usize) {
        if let Some(child) = self.array_remove(id, from) {
            self.array_insert(id, to, child);
        }
    }

    // -------------------------------------------------------------------------
    // Validators
    // -------------------------------------------------------------------------

    /// What is attached right now, whoever attached it.
    fn attached_validators(&self, id: ControlId, kind: ValidatorKind) -> Vec<Validator>;

    fn add_validators(
        &mut self,
        _id: ControlId,
        _kind: ValidatorKind,
        _validators: &[Validator],
    ) -> Result<()> {
        Err(ReconcileError::unsupported(
            self.validator_capability(),
            "add_validators",
        ))
    }

    fn remove_validators(
        &mut self,
        _id: ControlId,
        _kind: ValidatorKind,
        _validators: &[Validator],
    ) -> Result<()> {
        Err(ReconcileError::unsupported(
            self.validator_capability(),
            "remove_validators",
        ))
    }

    fn set_validators(
        &mut self,
        _id: ControlId,
        _kind: ValidatorKind,
        _validators: Vec<Validator>,
    ) -> Result<()> {
        Err(ReconcileError::unsupported(
            self.validator_capability(),
            "set_validators",
        ))
    }

    fn set_validator(
        &mut self,
        _id: ControlId,
        _kind: ValidatorKind,
        _validator: Option<Validator>,
    ) -> Result<()> {
        Err(ReconcileError::unsupported(
            self.validator_capability(),
            "set_validator",
        ))
    }

    fn errors(&self, id: ControlId) -> Option<ValidationErrors>;

    // -------------------------------------------------------------------------
    // Tiny flags
    // -------------------------------------------------------------------------

    fn is_touched(&self, id: ControlId) -> bool;
    fn set_touched(&mut self, id: ControlId, touched: bool);
    fn is_dirty(&self, id: ControlId) -> bool;
    fn set_dirty(&mut self, id: ControlId, dirty: bool);

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    /// Listen for value changes on `id` or any of its descendants.
    fn subscribe(&mut self, id: ControlId, listener: ChangeListener) -> SubscriptionId;
    fn unsubscribe(&mut self, subscription: SubscriptionId);
}
