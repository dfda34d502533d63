//! Reconciliation engine.
//!
//! [`Engine`] owns a host and everything it needs between passes:
//! - Registry: last render of every control it created
//! - Bundle manager: validator attachment through the host's tier
//! - Portal table: named forms that portal nodes resolve against
//!
//! # Architecture
//!
//! ```text
//! factory(value) → VirtualNode → reconcile → Differ ─┬→ ControlHost
//!                                                    ├→ ValidatorBundleManager
//!                                                    └→ Registry
//! ```
//!
//! A pass is synchronous and runs to completion. On error the control tree is
//! left as the failing operation left it.

mod context;
mod differ;
mod form;
mod keyed;
mod portal;
mod registry;

pub use context::*;
pub use form::*;
pub use keyed::*;
pub use portal::*;
pub use registry::*;

use std::rc::Rc;

use tracing::debug_span;

use crate::config::EngineConfig;
use crate::error::{ReconcileError, Result};
use crate::host::{ControlHost, ValidatorCapability};
use crate::node::VirtualNode;
use crate::types::ControlId;
use crate::validation::ValidatorBundleManager;

use differ::Differ;

pub struct Engine<H: ControlHost> {
    host: H,
    registry: Registry,
    manager: ValidatorBundleManager,
    portals: PortalTable,
    config: EngineConfig,
}

impl<H: ControlHost> Engine<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    /// The validator tier is fixed here, from the config or else the host.
    pub fn with_config(host: H, config: EngineConfig) -> Self {
        let capability = config
            .capability
            .unwrap_or_else(|| host.validator_capability());
        tracing::debug!(?capability, "engine created");
        Self {
            host,
            registry: Registry::new(),
            manager: ValidatorBundleManager::new(capability),
            portals: PortalTable::new(),
            config,
        }
    }

    /// Bring `previous` (or a new control) in line with `node`.
    ///
    /// Placeholder and portal roots have nothing to resolve against and are
    /// rejected. A native root is adopted as-is.
    pub fn reconcile(&mut self, node: &VirtualNode, previous: Option<ControlId>) -> Result<ControlId> {
        match node {
            VirtualNode::Placeholder | VirtualNode::Portal(_) => {
                return Err(ReconcileError::UnresolvableRoot { kind: node.tag() });
            }
            VirtualNode::Native(native) => return Ok(native.control),
            _ => {}
        }

        let span = debug_span!("reconcile", root = ?previous, kind = node.tag());
        let _guard = span.enter();

        // Disabled is sticky: an ancestor's marker wins over the node's own flag
        let marker = previous
            .and_then(|id| self.registry.root_marker(id))
            .unwrap_or_default();
        let mut ctx = RenderContext::with_root_disabled(marker.disabled);

        let mut differ = Differ {
            host: &mut self.host,
            registry: &mut self.registry,
            manager: self.manager,
            portals: &self.portals,
            config: &self.config,
        };
        differ.process_node(&mut ctx, "", node, previous)
    }

    /// Record the disabled state a containing tree imposes on root `id`.
    ///
    /// Takes effect on the next pass.
    pub fn set_root_disabled(&mut self, id: ControlId, disabled: bool) {
        self.registry.set_root_marker(id, RootMarker { disabled });
    }

    pub fn root_marker(&self, id: ControlId) -> Option<RootMarker> {
        self.registry.root_marker(id)
    }

    /// The virtual node `id` was last rendered from.
    pub fn last_rendered_node(&self, id: ControlId) -> Option<VirtualNode> {
        self.registry.last_rendered_node(id)
    }

    /// False when the control or any ancestor was rendered with `visible: false`.
    pub fn is_visible(&self, id: ControlId) -> bool {
        self.registry.is_visible(id)
    }

    pub fn register_portal(&mut self, name: impl Into<String>, control: ControlId) {
        self.portals.register(name, control);
    }

    pub fn unregister_portal(&mut self, name: &str) -> Option<ControlId> {
        self.portals.unregister(name)
    }

    /// Fallback for portal names not registered on this engine.
    pub fn set_portal_host(&mut self, host: Option<Rc<dyn PortalHost>>) {
        self.portals.set_external(host);
    }

    pub fn capability(&self) -> ValidatorCapability {
        self.manager.capability()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Direct host access, e.g. to simulate user edits.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::node::{array, control, group, native, placeholder, portal, ArrayProps, ControlProps, GroupProps};
    use crate::types::{ControlKind, Key, Value};

    fn leaf(value: impl Into<Value>) -> VirtualNode {
        control(ControlProps {
            value: value.into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_rejects_unresolvable_roots() {
        let mut engine = Engine::new(MemoryHost::default());
        assert!(matches!(
            engine.reconcile(&placeholder(), None),
            Err(ReconcileError::UnresolvableRoot { kind: "placeholder" })
        ));
        assert!(matches!(
            engine.reconcile(&portal("x"), None),
            Err(ReconcileError::UnresolvableRoot { kind: "portal" })
        ));
    }

    #[test]
    fn test_native_root_is_adopted() {
        let mut engine = Engine::new(MemoryHost::default());
        let id = engine.reconcile(&leaf(1), None).unwrap();
        assert_eq!(engine.reconcile(&native(id), None).unwrap(), id);
    }

    #[test]
    fn test_leaf_reuse_keeps_identity() {
        let mut engine = Engine::new(MemoryHost::default());
        let id = engine.reconcile(&leaf(1), None).unwrap();
        let again = engine.reconcile(&leaf(2), Some(id)).unwrap();

        assert_eq!(id, again);
        assert_eq!(engine.host().raw_value(id), Value::from(2));
    }

    #[test]
    fn test_type_change_is_fatal() {
        let mut engine = Engine::new(MemoryHost::default());
        let id = engine
            .reconcile(&group(GroupProps::default(), [("a", leaf(1))]), None)
            .unwrap();

        let err = engine
            .reconcile(
                &group(
                    GroupProps::default(),
                    [("a", array(ArrayProps::default(), []))],
                ),
                Some(id),
            )
            .unwrap_err();

        match err {
            ReconcileError::NodeTypeChanged { path, expected, found } => {
                assert_eq!(path, "a");
                assert_eq!(expected, ControlKind::Control);
                assert_eq!(found, ControlKind::Array);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_key_is_fatal() {
        let mut engine = Engine::new(MemoryHost::default());
        let item = |key: i64| {
            control(ControlProps {
                key: Some(Key::Int(key)),
                ..Default::default()
            })
        };
        let result = engine.reconcile(&array(ArrayProps::default(), [item(1), item(1)]), None);
        assert!(matches!(
            result,
            Err(ReconcileError::DuplicateKey { key: Key::Int(1), .. })
        ));
    }

    #[test]
    fn test_root_marker_is_sticky() {
        let mut engine = Engine::new(MemoryHost::default());
        let id = engine.reconcile(&leaf(1), None).unwrap();

        engine.set_root_disabled(id, true);
        engine.reconcile(&leaf(1), Some(id)).unwrap();
        assert!(engine.host().is_disabled(id));

        engine.set_root_disabled(id, false);
        engine.reconcile(&leaf(1), Some(id)).unwrap();
        assert!(!engine.host().is_disabled(id));
    }

    #[test]
    fn test_last_rendered_node() {
        let mut engine = Engine::new(MemoryHost::default());
        let id = engine.reconcile(&leaf(7), None).unwrap();

        let node = engine.last_rendered_node(id).unwrap();
        assert_eq!(node.value(), Some(&Value::from(7)));
        assert_eq!(engine.last_rendered_node(ControlId(99)).map(|n| n.tag()), None);
    }
}
