//! Built-in validators.
//!
//! `required` is a simple node over a shared function; the bounded checks are
//! factory nodes, so `min(10.0)` rendered twice compares equal by its args.

use crate::types::{error, Value};

use super::validator::{Validator, ValidatorFactory, ValidatorNode};

thread_local! {
    static REQUIRED: Validator =
        Validator::new(|value| value.is_empty_input().then(|| error("required")));

    static MIN: ValidatorFactory = ValidatorFactory::new(|args| {
        let bound = number_arg(args);
        Validator::new(move |value| match value.as_f64() {
            Some(n) if n < bound => Some(error("min")),
            _ => None,
        })
    });

    static MAX: ValidatorFactory = ValidatorFactory::new(|args| {
        let bound = number_arg(args);
        Validator::new(move |value| match value.as_f64() {
            Some(n) if n > bound => Some(error("max")),
            _ => None,
        })
    });

    static MIN_LENGTH: ValidatorFactory = ValidatorFactory::new(|args| {
        let bound = number_arg(args);
        Validator::new(move |value| {
            // Empty values are left to `required`
            if value.is_empty_input() {
                return None;
            }
            match value.len() {
                Some(len) if (len as f64) < bound => Some(error("minlength")),
                _ => None,
            }
        })
    });

    static MAX_LENGTH: ValidatorFactory = ValidatorFactory::new(|args| {
        let bound = number_arg(args);
        Validator::new(move |value| match value.len() {
            Some(len) if (len as f64) > bound => Some(error("maxlength")),
            _ => None,
        })
    });
}

fn number_arg(args: &[Value]) -> f64 {
    args.first().and_then(Value::as_f64).unwrap_or(f64::NAN)
}

/// The raw `required` function.
pub fn required_validator() -> Validator {
    REQUIRED.with(Clone::clone)
}

/// Fails with `{required: true}` on null, empty text or empty list.
pub fn required() -> ValidatorNode {
    ValidatorNode::simple(required_validator())
}

/// Fails with `{min: true}` when a number is below `bound`.
pub fn min(bound: f64) -> ValidatorNode {
    ValidatorNode::factory(MIN.with(Clone::clone), vec![Value::from(bound)])
}

/// Fails with `{max: true}` when a number is above `bound`.
pub fn max(bound: f64) -> ValidatorNode {
    ValidatorNode::factory(MAX.with(Clone::clone), vec![Value::from(bound)])
}

pub fn min_length(bound: usize) -> ValidatorNode {
    ValidatorNode::factory(MIN_LENGTH.with(Clone::clone), vec![Value::from(bound as f64)])
}

pub fn max_length(bound: usize) -> ValidatorNode {
    ValidatorNode::factory(MAX_LENGTH.with(Clone::clone), vec![Value::from(bound as f64)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(node: ValidatorNode, value: impl Into<Value>) -> Option<String> {
        let compiled = node.compile();
        compiled[0]
            .validate(&value.into())
            .and_then(|errors| errors.keys().next().cloned())
    }

    #[test]
    fn test_required() {
        assert_eq!(check(required(), Value::Null).as_deref(), Some("required"));
        assert_eq!(check(required(), ""), Some("required".to_string()));
        assert_eq!(check(required(), 0), None);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(check(min(10.0), 5).as_deref(), Some("min"));
        assert_eq!(check(min(10.0), 10), None);
        assert_eq!(check(min(10.0), Value::Null), None);
        assert_eq!(check(max(10.0), 11).as_deref(), Some("max"));
        assert_eq!(check(max(10.0), 10), None);
    }

    #[test]
    fn test_lengths() {
        assert_eq!(check(min_length(3), "ab").as_deref(), Some("minlength"));
        assert_eq!(check(min_length(3), ""), None);
        assert_eq!(check(max_length(3), "abcd").as_deref(), Some("maxlength"));
        assert_eq!(check(max_length(3), "abc"), None);
    }

    #[test]
    fn test_required_is_shared() {
        assert_eq!(required(), required());
        assert_eq!(required_validator(), required_validator());
    }
}
