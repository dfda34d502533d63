//! Core types for spark-forms.
//!
//! These types flow through every layer: the virtual nodes carry [`Value`]s and
//! [`Key`]s, the host hands out [`ControlId`]s, and validators produce
//! [`ValidationErrors`].

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

// =============================================================================
// Control Handles
// =============================================================================

/// Opaque handle to a live control owned by a host.
///
/// Handles are never reused by [`MemoryHost`](crate::host::MemoryHost), so two
/// equal ids always name the same control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub usize);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural class of a control. Reuse across classes is impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Leaf control holding a single value.
    Control,
    /// Named children.
    Group,
    /// Indexed children.
    Array,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlKind::Control => "control",
            ControlKind::Group => "group",
            ControlKind::Array => "array",
        };
        f.write_str(name)
    }
}

/// Which validator list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    Sync,
    Async,
}

// =============================================================================
// Value
// =============================================================================

/// Dynamic value held by controls and described by virtual nodes.
///
/// Lists and maps are shared behind `Rc`, so cloning a value never copies
/// its contents and [`Value::same`] can tell an untouched sub-value from a
/// freshly built one.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Rc<Vec<Value>>),
    Map(Rc<IndexMap<String, Value>>),
}

impl Value {
    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    /// Build a map value, keeping insertion order.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Reference-or-primitive comparison.
    ///
    /// Scalars compare by value (NaN is the same as NaN), lists and maps by
    /// pointer. Two structurally equal maps built separately are *not* the same.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Field lookup on map values.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Element lookup on list values.
    pub fn index(&self, index: usize) -> Option<&Value> {
        match self {
            Value::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for values a `required` check rejects: null, empty text, empty list.
    pub fn is_empty_input(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Length of text, list or map values.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Text(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Key
// =============================================================================

/// Identity hint used to match array items across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Text(String),
    /// Synthesised from the item's position when no key was supplied.
    Position(usize),
}

impl Key {
    /// Derive a key from a scalar value. Lists, maps and null have no key.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) if n.fract() == 0.0 => Some(Key::Int(*n as i64)),
            Value::Number(n) => Some(Key::Text(n.to_string())),
            Value::Text(s) => Some(Key::Text(s.clone())),
            Value::Bool(b) => Some(Key::Text(b.to_string())),
            _ => None,
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Key::Position(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Text(s) => write!(f, "{s:?}"),
            Key::Position(i) => write!(f, "@{i}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Error map produced by a validator, e.g. `{"required": true}`.
pub type ValidationErrors = BTreeMap<String, Value>;

/// Shorthand for a single `{name: true}` error.
pub fn error(name: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.insert(name.to_string(), Value::Bool(true));
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_compares_scalars_by_value() {
        assert!(Value::from(5).same(&Value::from(5)));
        assert!(Value::from("abc").same(&Value::from("abc")));
        assert!(Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
        assert!(!Value::from(5).same(&Value::from("5")));
        assert!(Value::Null.same(&Value::Null));
    }

    #[test]
    fn test_same_compares_containers_by_pointer() {
        let a = Value::map([("x", Value::from(1))]);
        let b = Value::map([("x", Value::from(1))]);

        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        // Deep equality still holds
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input() {
        assert!(Value::Null.is_empty_input());
        assert!(Value::from("").is_empty_input());
        assert!(Value::list([]).is_empty_input());
        assert!(!Value::from(0).is_empty_input());
        assert!(!Value::from(false).is_empty_input());
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(Key::from_value(&Value::from(3)), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&Value::from("a")), Some(Key::from("a")));
        assert_eq!(Key::from_value(&Value::Null), None);
    }
}
