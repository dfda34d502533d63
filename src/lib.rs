//! # spark-forms
//!
//! Declarative form-control reconciliation for Rust.
//!
//! A pure factory turns a value into a tree of [`VirtualNode`]s. The
//! [`Engine`] diffs that tree against the controls it rendered last time and
//! mutates them in place through a [`ControlHost`], keeping control identity
//! (and with it focus, dirtiness, subscriptions) wherever the type class is
//! unchanged.
//!
//! ## Architecture
//!
//! ```text
//! Value → factory → VirtualNode → Engine::reconcile → ControlHost
//!                                      │
//!                                      ├─ Registry (last render per control)
//!                                      └─ ValidatorBundleManager (attach per tier)
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types (Value, Key, ControlId, ValidationErrors)
//! - [`node`] - Virtual node model and constructors
//! - [`validation`] - Validator nodes, combinators, compiled wrappers, bundles
//! - [`engine`] - Reconciliation, registry, portals, form driver
//! - [`host`] - Control host interface and the in-memory host
//!
//! ## Example
//!
//! ```ignore
//! use spark_forms::*;
//!
//! let mut engine = Engine::new(MemoryHost::default());
//! let mut form = Form::new(
//!     |value| control(ControlProps {
//!         value: value.clone(),
//!         required: true,
//!         validators: vec![min(10.0)],
//!         ..Default::default()
//!     }),
//!     Value::from(5),
//! );
//!
//! let id = form.render(&mut engine)?;
//! assert_eq!(engine.host().errors(id), Some(error("min")));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod node;
pub mod types;
pub mod validation;

// Re-export commonly used items
pub use types::*;

pub use config::EngineConfig;

pub use error::{ReconcileError, Result};

pub use engine::{Engine, Form, NodeFactory, PortalHost, RenderResult, RootMarker, Slot, SlotLabel};

pub use host::{
    ChangeListener, ControlFlags, ControlHost, ControlInit, ControlShape, HostStats, MemoryHost,
    SubscriptionId, ValidatorCapability,
};

pub use node::{
    array, control, group, key_by_field, key_by_value, native, native_keyed, placeholder, portal,
    ArrayProps, ControlProps, GroupProps, KeyFn, NodeData, NodeOptions, VirtualNode,
};

pub use validation::{
    and, compose, custom, max, max_length, min, min_length, or, required, required_validator,
    CompiledValidator, Validator, ValidatorBundle, ValidatorBundleManager, ValidatorFactory,
    ValidatorMixer, ValidatorNode,
};
