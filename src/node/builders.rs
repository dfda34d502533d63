//! Node constructors.
//!
//! ```ignore
//! let node = group(
//!     GroupProps::default(),
//!     [
//!         ("weight", control(ControlProps { value: 20.into(), ..Default::default() })),
//!         ("volume", control(ControlProps { value: 40.into(), required: true, ..Default::default() })),
//!     ],
//! );
//! ```

use std::rc::Rc;

use crate::types::{ControlId, Key, Value};
use crate::validation::{and, compose, required, ValidatorNode};

use super::{
    ArrayNode, ControlNode, GroupNode, KeyFn, NativeNode, NodeData, NodeOptions, PortalNode,
    VirtualNode,
};

// =============================================================================
// Props
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ControlProps {
    pub key: Option<Key>,
    pub value: Value,
    pub disabled: bool,
    /// Prepends `required()` with first-failure-wins semantics.
    pub required: bool,
    pub validators: Vec<ValidatorNode>,
    pub async_validators: Vec<ValidatorNode>,
    pub data: NodeData,
    pub touched: Option<bool>,
    pub dirty: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupProps {
    pub key: Option<Key>,
    /// The value the children were derived from.
    pub source: Option<Value>,
    pub disabled: bool,
    pub validators: Vec<ValidatorNode>,
    pub async_validators: Vec<ValidatorNode>,
    pub data: NodeData,
    pub touched: Option<bool>,
    pub dirty: Option<bool>,
}

#[derive(Clone, Default)]
pub struct ArrayProps {
    pub key: Option<Key>,
    pub source: Option<Value>,
    pub disabled: bool,
    pub validators: Vec<ValidatorNode>,
    pub async_validators: Vec<ValidatorNode>,
    pub data: NodeData,
    pub touched: Option<bool>,
    pub dirty: Option<bool>,
    /// Item key from the item's value; falls back to the item node's key.
    pub track_by: Option<KeyFn>,
}

/// Collapse a list into one node: none, the single entry, or `compose`.
fn combine(mut validators: Vec<ValidatorNode>) -> Option<ValidatorNode> {
    match validators.len() {
        0 => None,
        1 => validators.pop(),
        _ => Some(compose(validators)),
    }
}

// =============================================================================
// Constructors
// =============================================================================

pub fn control(props: ControlProps) -> VirtualNode {
    let user = combine(props.validators);
    let validator = if props.required {
        Some(match user {
            Some(user) => and([required(), user]),
            None => required(),
        })
    } else {
        user
    };

    VirtualNode::Control(Rc::new(ControlNode {
        options: NodeOptions {
            key: props.key,
            disabled: props.disabled,
            validator,
            async_validator: combine(props.async_validators),
            data: props.data,
            touched: props.touched,
            dirty: props.dirty,
        },
        value: props.value,
    }))
}

/// Named children in the order given. Placeholders mark absent slots.
pub fn group<K: Into<String>>(
    props: GroupProps,
    children: impl IntoIterator<Item = (K, VirtualNode)>,
) -> VirtualNode {
    VirtualNode::Group(Rc::new(GroupNode {
        options: NodeOptions {
            key: props.key,
            disabled: props.disabled,
            validator: combine(props.validators),
            async_validator: combine(props.async_validators),
            data: props.data,
            touched: props.touched,
            dirty: props.dirty,
        },
        source: props.source,
        children: children
            .into_iter()
            .map(|(name, node)| (name.into(), node))
            .collect(),
    }))
}

pub fn array(props: ArrayProps, children: impl IntoIterator<Item = VirtualNode>) -> VirtualNode {
    VirtualNode::Array(Rc::new(ArrayNode {
        options: NodeOptions {
            key: props.key,
            disabled: props.disabled,
            validator: combine(props.validators),
            async_validator: combine(props.async_validators),
            data: props.data,
            touched: props.touched,
            dirty: props.dirty,
        },
        source: props.source,
        children: children.into_iter().collect(),
        track_by: props.track_by,
    }))
}

pub fn native(control: ControlId) -> VirtualNode {
    VirtualNode::Native(NativeNode { control, key: None })
}

pub fn native_keyed(control: ControlId, key: impl Into<Key>) -> VirtualNode {
    VirtualNode::Native(NativeNode {
        control,
        key: Some(key.into()),
    })
}

pub fn portal(name: impl Into<String>) -> VirtualNode {
    VirtualNode::Portal(PortalNode {
        name: name.into(),
        key: None,
    })
}

pub fn placeholder() -> VirtualNode {
    VirtualNode::Placeholder
}

/// Key array items by a field of their map value.
pub fn key_by_field(field: &str) -> KeyFn {
    let field = field.to_string();
    Rc::new(move |value| value.get(&field).and_then(Key::from_value))
}

/// Key array items by their own scalar value.
pub fn key_by_value() -> KeyFn {
    Rc::new(Key::from_value)
}
