//! Validator combinators - compose, and, or, custom mixers.
//!
//! The built-in mixers are per-thread singletons so that two renders building
//! `and([..])` produce nodes with the same mixer identity and compare equal.

use crate::types::{ValidationErrors, Value};

use super::validator::{Validator, ValidatorMixer, ValidatorNode};

thread_local! {
    /// Attach every child separately; the host reports the union of errors.
    static COMPOSE: ValidatorMixer = ValidatorMixer::new(|validators| validators);

    /// First failing child wins.
    static AND: ValidatorMixer = ValidatorMixer::new(|validators| {
        if validators.len() <= 1 {
            return validators;
        }
        vec![Validator::new(move |value| {
            validators.iter().find_map(|v| v.validate(value))
        })]
    });

    /// Valid if any child is valid, otherwise the union of all errors.
    static OR: ValidatorMixer = ValidatorMixer::new(|validators| {
        if validators.len() <= 1 {
            return validators;
        }
        vec![Validator::new(move |value| {
            let mut merged = ValidationErrors::new();
            for validator in &validators {
                match validator.validate(value) {
                    None => return None,
                    Some(errors) => merged.extend(errors),
                }
            }
            Some(merged)
        })]
    });
}

fn children<T: Into<ValidatorNode>>(nodes: impl IntoIterator<Item = T>) -> Vec<ValidatorNode> {
    nodes.into_iter().map(Into::into).collect()
}

/// Run every child; errors are merged.
pub fn compose<T: Into<ValidatorNode>>(nodes: impl IntoIterator<Item = T>) -> ValidatorNode {
    ValidatorNode::compound(COMPOSE.with(Clone::clone), children(nodes))
}

/// Run children in order and stop at the first failure.
pub fn and<T: Into<ValidatorNode>>(nodes: impl IntoIterator<Item = T>) -> ValidatorNode {
    ValidatorNode::compound(AND.with(Clone::clone), children(nodes))
}

/// Pass when any child passes.
pub fn or<T: Into<ValidatorNode>>(nodes: impl IntoIterator<Item = T>) -> ValidatorNode {
    ValidatorNode::compound(OR.with(Clone::clone), children(nodes))
}

/// Combine children with a caller-supplied mixer. Keep the mixer around
/// between renders; a fresh mixer never compares equal.
pub fn custom<T: Into<ValidatorNode>>(
    mixer: &ValidatorMixer,
    nodes: impl IntoIterator<Item = T>,
) -> ValidatorNode {
    ValidatorNode::compound(mixer.clone(), children(nodes))
}

/// Run all validators and merge their errors.
pub fn merge_errors(validators: &[Validator], value: &Value) -> Option<ValidationErrors> {
    let mut merged: Option<ValidationErrors> = None;
    for validator in validators {
        if let Some(errors) = validator.validate(value) {
            merged.get_or_insert_with(ValidationErrors::new).extend(errors);
        }
    }
    merged
}

/// Collapse a list into one validator. A single entry keeps its identity.
pub fn merge_validators(mut validators: Vec<Validator>) -> Option<Validator> {
    match validators.len() {
        0 => None,
        1 => validators.pop(),
        _ => Some(Validator::new(move |value| merge_errors(&validators, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::error;

    fn failing(name: &'static str) -> Validator {
        Validator::new(move |_| Some(error(name)))
    }

    fn passing() -> Validator {
        Validator::new(|_| None)
    }

    #[test]
    fn test_builtin_mixers_are_stable() {
        let v = passing();
        assert_eq!(compose([v.clone()]), compose([v]));
    }

    #[test]
    fn test_and_stops_at_first_failure() {
        let compiled = and([failing("a"), failing("b")]).compile();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].validate(&Value::Null), Some(error("a")));
    }

    #[test]
    fn test_or_passes_when_any_passes() {
        let compiled = or([failing("a"), passing()]).compile();
        assert_eq!(compiled[0].validate(&Value::Null), None);

        let compiled = or([failing("a"), failing("b")]).compile();
        let errors = compiled[0].validate(&Value::Null).unwrap();
        assert!(errors.contains_key("a"));
        assert!(errors.contains_key("b"));
    }

    #[test]
    fn test_nested_compose_inside_and_reports_union() {
        let compiled = and([compose([failing("a"), failing("b")])]).compile();
        let errors = compiled[0].validate(&Value::Null).unwrap();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_merge_single_keeps_identity() {
        let v = failing("a");
        assert_eq!(merge_validators(vec![v.clone()]), Some(v));
        assert_eq!(merge_validators(vec![]), None);
    }

    #[test]
    fn test_custom_mixer() {
        let first_only = ValidatorMixer::new(|mut validators| {
            validators.truncate(1);
            validators
        });
        let a = failing("a");
        let node = custom(&first_only, [a.clone(), failing("b")]);
        let compiled = node.compile();
        assert_eq!(compiled, vec![a.clone()]);

        let same = custom(&first_only, [a.clone()]);
        assert_eq!(same, custom(&first_only, [a.clone()]));

        let other = ValidatorMixer::new(|validators| validators);
        assert_ne!(same, custom(&other, [a]));
    }
}
