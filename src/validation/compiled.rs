//! Compiled validator - a stable handle with swappable contents.
//!
//! Hosts that only offer a single validator slot receive [`CompiledValidator::handle`]
//! once. Later renders swap the functions behind it with [`CompiledValidator::set`],
//! so the slot never has to be reassigned.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::types::{ValidationErrors, Value};

use super::combinators::merge_errors;
use super::validator::Validator;

#[derive(Clone)]
pub struct CompiledValidator {
    /// `None` once disposed.
    inner: Rc<RefCell<Option<Vec<Validator>>>>,
    handle: Validator,
}

impl CompiledValidator {
    pub fn new(validators: Vec<Validator>) -> Self {
        let inner = Rc::new(RefCell::new(Some(validators)));
        let cell = inner.clone();
        let handle = Validator::new(move |value| {
            cell.borrow()
                .as_deref()
                .and_then(|validators| merge_errors(validators, value))
        });
        Self { inner, handle }
    }

    /// The validator given to the host. Same identity for the wrapper's lifetime.
    pub fn handle(&self) -> Validator {
        self.handle.clone()
    }

    /// Replace the functions run by the handle. Ignored after [`dispose`](Self::dispose).
    pub fn set(&self, validators: Vec<Validator>) {
        let mut inner = self.inner.borrow_mut();
        if inner.is_some() {
            *inner = Some(validators);
        }
    }

    /// Turn the handle into a no-op for anyone still holding it.
    pub fn dispose(&self) {
        self.inner.borrow_mut().take();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().is_none()
    }

    pub fn validators(&self) -> Vec<Validator> {
        self.inner.borrow().clone().unwrap_or_default()
    }

    pub fn invoke(&self, value: &Value) -> Option<ValidationErrors> {
        self.handle.validate(value)
    }
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledValidator")
            .field("handle", &self.handle)
            .field("validators", &self.validators().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
