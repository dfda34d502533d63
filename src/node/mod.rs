//! Virtual nodes - immutable descriptions of a desired control tree.
//!
//! A factory builds a fresh tree of [`VirtualNode`]s from the current value on
//! every pass. The engine diffs it against what it rendered last time and
//! discards it afterwards.
//!
//! Only [`Control`](VirtualNode::Control), [`Group`](VirtualNode::Group) and
//! [`Array`](VirtualNode::Array) map onto controls the engine owns. The other
//! variants are resolved to "present" or "absent" before the differ sees them.

mod builders;

pub use builders::*;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::types::{ControlId, ControlKind, Key, Value};
use crate::validation::ValidatorNode;

/// Derives an array item's key from its value.
pub type KeyFn = Rc<dyn Fn(&Value) -> Option<Key>>;

// =============================================================================
// Shared Options
// =============================================================================

/// Opaque metadata carried by a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Read by the visibility cascade (default: true).
    pub visible: bool,
    pub attributes: IndexMap<String, Value>,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            visible: true,
            attributes: IndexMap::new(),
        }
    }
}

/// Fields every structural node carries.
#[derive(Debug, Clone, Default)]
pub struct NodeOptions {
    pub key: Option<Key>,
    /// Own intent, before the cascade from enclosing scopes.
    pub disabled: bool,
    pub validator: Option<ValidatorNode>,
    pub async_validator: Option<ValidatorNode>,
    pub data: NodeData,
    /// `None` leaves the host flag alone.
    pub touched: Option<bool>,
    pub dirty: Option<bool>,
}

// =============================================================================
// Node Payloads
// =============================================================================

#[derive(Debug, Clone)]
pub struct ControlNode {
    pub options: NodeOptions,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct GroupNode {
    pub options: NodeOptions,
    /// Value the group was rendered from. `None` always counts as changed.
    pub source: Option<Value>,
    pub children: IndexMap<String, VirtualNode>,
}

#[derive(Clone)]
pub struct ArrayNode {
    pub options: NodeOptions,
    pub source: Option<Value>,
    pub children: Vec<VirtualNode>,
    pub track_by: Option<KeyFn>,
}

impl fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayNode")
            .field("options", &self.options)
            .field("source", &self.source)
            .field("children", &self.children)
            .field("track_by", &self.track_by.is_some())
            .finish()
    }
}

/// An existing control adopted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeNode {
    pub control: ControlId,
    pub key: Option<Key>,
}

/// A control owned by another root, looked up by name at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalNode {
    pub name: String,
    pub key: Option<Key>,
}

// =============================================================================
// VirtualNode
// =============================================================================

#[derive(Debug, Clone)]
pub enum VirtualNode {
    Control(Rc<ControlNode>),
    Group(Rc<GroupNode>),
    Array(Rc<ArrayNode>),
    Native(NativeNode),
    Portal(PortalNode),
    /// Slot not present.
    Placeholder,
}

impl VirtualNode {
    /// Type class for reuse, `None` for the auxiliary variants.
    pub fn class(&self) -> Option<ControlKind> {
        match self {
            VirtualNode::Control(_) => Some(ControlKind::Control),
            VirtualNode::Group(_) => Some(ControlKind::Group),
            VirtualNode::Array(_) => Some(ControlKind::Array),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            VirtualNode::Control(_) => "control",
            VirtualNode::Group(_) => "group",
            VirtualNode::Array(_) => "array",
            VirtualNode::Native(_) => "native",
            VirtualNode::Portal(_) => "portal",
            VirtualNode::Placeholder => "placeholder",
        }
    }

    pub fn options(&self) -> Option<&NodeOptions> {
        match self {
            VirtualNode::Control(node) => Some(&node.options),
            VirtualNode::Group(node) => Some(&node.options),
            VirtualNode::Array(node) => Some(&node.options),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            VirtualNode::Native(node) => node.key.as_ref(),
            VirtualNode::Portal(node) => node.key.as_ref(),
            VirtualNode::Placeholder => None,
            _ => self.options().and_then(|o| o.key.as_ref()),
        }
    }

    pub fn disabled(&self) -> bool {
        self.options().is_some_and(|o| o.disabled)
    }

    /// The value this node describes: a control's value, a container's source.
    pub fn value(&self) -> Option<&Value> {
        match self {
            VirtualNode::Control(node) => Some(&node.value),
            VirtualNode::Group(node) => node.source.as_ref(),
            VirtualNode::Array(node) => node.source.as_ref(),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, VirtualNode::Placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_of_each_variant() {
        assert_eq!(control(ControlProps::default()).class(), Some(ControlKind::Control));
        let empty: [(&str, VirtualNode); 0] = [];
        assert_eq!(group(GroupProps::default(), empty).class(), Some(ControlKind::Group));
        assert_eq!(array(ArrayProps::default(), []).class(), Some(ControlKind::Array));
        assert_eq!(native(ControlId(0)).class(), None);
        assert_eq!(portal("x").class(), None);
        assert_eq!(placeholder().class(), None);
    }

    #[test]
    fn test_key_lookup() {
        let node = control(ControlProps {
            key: Some(Key::from(3)),
            ..Default::default()
        });
        assert_eq!(node.key(), Some(&Key::Int(3)));
        assert_eq!(placeholder().key(), None);
    }

    #[test]
    fn test_visible_by_default() {
        assert!(NodeData::default().visible);
    }
}
