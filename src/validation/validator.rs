//! Validator functions and the validator node model.
//!
//! Raw functions ([`Validator`], [`ValidatorFactory`], [`ValidatorMixer`]) are
//! compared by pointer. [`ValidatorNode`] describes how they are combined and is
//! compared structurally so a re-render that describes the same validation
//! can skip recompiling.

use std::fmt;
use std::rc::Rc;

use crate::types::{ValidationErrors, Value};

use super::combinators::merge_validators;

// =============================================================================
// Raw Functions
// =============================================================================

type ValidateFn = dyn Fn(&Value) -> Option<ValidationErrors>;
type FactoryFn = dyn Fn(&[Value]) -> Validator;
type MixerFn = dyn Fn(Vec<Validator>) -> Vec<Validator>;

/// A validation function. Returns `None` when the value is valid.
///
/// Equality is identity: two validators are equal only if they share the
/// same allocation.
#[derive(Clone)]
pub struct Validator(Rc<ValidateFn>);

impl Validator {
    pub fn new(f: impl Fn(&Value) -> Option<ValidationErrors> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Run the validator against a value.
    pub fn validate(&self, value: &Value) -> Option<ValidationErrors> {
        (self.0)(value)
    }

    pub fn ptr_eq(&self, other: &Validator) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl PartialEq for Validator {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Validator {}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Builds a validator from arguments, e.g. `min(10)`.
#[derive(Clone)]
pub struct ValidatorFactory(Rc<FactoryFn>);

impl ValidatorFactory {
    pub fn new(f: impl Fn(&[Value]) -> Validator + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn build(&self, args: &[Value]) -> Validator {
        (self.0)(args)
    }
}

impl PartialEq for ValidatorFactory {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for ValidatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorFactory({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Combines the compiled children of a compound node into the validators
/// that get attached. May return several validators (compose) or one (and/or).
#[derive(Clone)]
pub struct ValidatorMixer(Rc<MixerFn>);

impl ValidatorMixer {
    pub fn new(f: impl Fn(Vec<Validator>) -> Vec<Validator> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn mix(&self, validators: Vec<Validator>) -> Vec<Validator> {
        (self.0)(validators)
    }
}

impl PartialEq for ValidatorMixer {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for ValidatorMixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorMixer({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

// =============================================================================
// Validator Node
// =============================================================================

/// Composable description of validation logic.
#[derive(Debug, Clone)]
pub enum ValidatorNode {
    /// One raw validator. `locals` stands in for the closure's captures, so an
    /// inline closure recreated every render still compares equal.
    Simple {
        validator: Validator,
        locals: Option<Vec<Value>>,
    },
    /// A factory plus the arguments it is invoked with.
    Factory {
        factory: ValidatorFactory,
        args: Vec<Value>,
    },
    /// A mixer applied to child nodes (compose, and, or, custom).
    Compound {
        mixer: ValidatorMixer,
        children: Vec<ValidatorNode>,
    },
}

impl ValidatorNode {
    pub fn simple(validator: Validator) -> Self {
        ValidatorNode::Simple {
            validator,
            locals: None,
        }
    }

    pub fn simple_with_locals(validator: Validator, locals: Vec<Value>) -> Self {
        ValidatorNode::Simple {
            validator,
            locals: Some(locals),
        }
    }

    pub fn factory(factory: ValidatorFactory, args: Vec<Value>) -> Self {
        ValidatorNode::Factory { factory, args }
    }

    pub fn compound(mixer: ValidatorMixer, children: Vec<ValidatorNode>) -> Self {
        ValidatorNode::Compound { mixer, children }
    }

    /// Flatten into the ordered list of functions to attach.
    ///
    /// Each compound child is merged into a single validator before the mixer
    /// sees it, so `and(required, compose(a, b))` stops at `required` but still
    /// reports `a` and `b` together.
    pub fn compile(&self) -> Vec<Validator> {
        match self {
            ValidatorNode::Simple { validator, .. } => vec![validator.clone()],
            ValidatorNode::Factory { factory, args } => vec![factory.build(args)],
            ValidatorNode::Compound { mixer, children } => {
                let inputs = children
                    .iter()
                    .filter_map(|child| merge_validators(child.compile()))
                    .collect();
                mixer.mix(inputs)
            }
        }
    }
}

impl PartialEq for ValidatorNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ValidatorNode::Simple {
                    validator: a,
                    locals: la,
                },
                ValidatorNode::Simple {
                    validator: b,
                    locals: lb,
                },
            ) => {
                a == b
                    || match (la, lb) {
                        (Some(la), Some(lb)) => la == lb,
                        _ => false,
                    }
            }
            (
                ValidatorNode::Factory { factory: a, args: aa },
                ValidatorNode::Factory { factory: b, args: ab },
            ) => a == b && aa == ab,
            (
                ValidatorNode::Compound {
                    mixer: a,
                    children: ca,
                },
                ValidatorNode::Compound {
                    mixer: b,
                    children: cb,
                },
            ) => a == b && ca == cb,
            _ => false,
        }
    }
}

impl From<Validator> for ValidatorNode {
    fn from(validator: Validator) -> Self {
        ValidatorNode::simple(validator)
    }
}

/// Equality of optional validator nodes. Absent equals only absent.
pub fn is_validator_equal(a: Option<&ValidatorNode>, b: Option<&ValidatorNode>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::error;
    use crate::validation::{and, compose, min, required};

    fn failing(name: &'static str) -> Validator {
        Validator::new(move |_| Some(error(name)))
    }

    #[test]
    fn test_simple_equal_by_identity() {
        let v = failing("a");
        assert_eq!(ValidatorNode::simple(v.clone()), ValidatorNode::simple(v));
        assert_ne!(
            ValidatorNode::simple(failing("a")),
            ValidatorNode::simple(failing("a"))
        );
    }

    #[test]
    fn test_simple_equal_by_locals() {
        let locals = vec![Value::from(1), Value::from("abc")];
        let a = ValidatorNode::simple_with_locals(failing("a"), locals.clone());
        let b = ValidatorNode::simple_with_locals(failing("a"), locals);
        let c = ValidatorNode::simple_with_locals(failing("a"), vec![Value::from(2)]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_factory_equal_by_args() {
        assert_eq!(min(10.0), min(10.0));
        assert_ne!(min(10.0), min(11.0));
    }

    #[test]
    fn test_compound_equality_recurses() {
        assert_eq!(and([required(), min(3.0)]), and([required(), min(3.0)]));
        assert_ne!(and([required(), min(3.0)]), and([required(), min(4.0)]));
        assert_ne!(and([required()]), compose([required()]));
    }

    #[test]
    fn test_cross_type_unequal() {
        assert_ne!(required(), min(1.0));
        assert!(is_validator_equal(None, None));
        assert!(!is_validator_equal(Some(&required()), None));
    }

    #[test]
    fn test_compile_compose_keeps_children_separate() {
        let a = failing("a");
        let b = failing("b");
        let compiled = compose([a.clone(), b.clone()]).compile();

        assert_eq!(compiled, vec![a, b]);
    }

    #[test]
    fn test_compile_and_yields_one_validator() {
        let compiled = and([required(), min(10.0)]).compile();
        assert_eq!(compiled.len(), 1);

        let errors = compiled[0].validate(&Value::Null);
        assert_eq!(errors, Some(error("required")));

        let errors = compiled[0].validate(&Value::from(5));
        assert_eq!(errors, Some(error("min")));

        assert_eq!(compiled[0].validate(&Value::from(12)), None);
    }
}
