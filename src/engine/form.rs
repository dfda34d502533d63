//! Form - drives an engine from a value and a node factory.
//!
//! A form owns the current value and a pure factory `Fn(&Value) -> VirtualNode`.
//! Every `set_value`, `patch` or `update` re-runs the factory and reconciles
//! the result into the same root control.
//!
//! # Auto-update
//!
//! With auto-update on, the form listens to value changes on its root. Host
//! listeners cannot re-enter the engine, so a notification only marks the form
//! pending; [`Form::poll`] then re-renders from the host's raw value.
//! Notifications raised by the engine's own writes during a pass are ignored.
//!
//! ```ignore
//! let mut engine = Engine::new(MemoryHost::default());
//! let mut form = Form::new(|value| build_node(value), initial).auto_update(true);
//! form.render(&mut engine)?;
//!
//! // user edits arrive through the host...
//! form.poll(&mut engine)?;
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use spark_signals::{signal, Signal};
use tracing::trace;

use crate::error::Result;
use crate::host::{ControlHost, SubscriptionId};
use crate::node::VirtualNode;
use crate::types::{ControlId, Value};

use super::Engine;

pub type NodeFactory = Rc<dyn Fn(&Value) -> VirtualNode>;

/// Sets a flag for the duration of a pass.
struct PassGuard(Rc<Cell<bool>>);

impl PassGuard {
    fn enter(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self(flag.clone())
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct Form {
    factory: NodeFactory,
    value: Value,
    name: Option<String>,
    auto_update: bool,
    control: Option<ControlId>,
    subscription: Option<SubscriptionId>,
    in_progress: Rc<Cell<bool>>,
    pending: Rc<Cell<bool>>,
    value_signal: Signal<Value>,
}

impl Form {
    pub fn new(factory: impl Fn(&Value) -> VirtualNode + 'static, value: Value) -> Self {
        Self {
            factory: Rc::new(factory),
            value_signal: signal(value.clone()),
            value,
            name: None,
            auto_update: false,
            control: None,
            subscription: None,
            in_progress: Rc::new(Cell::new(false)),
            pending: Rc::new(Cell::new(false)),
        }
    }

    /// Register the root as a portal target under `name`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Re-render on host value changes (see [`Form::poll`]).
    pub fn auto_update(mut self, enabled: bool) -> Self {
        self.auto_update = enabled;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Root control, once rendered.
    pub fn control(&self) -> Option<ControlId> {
        self.control
    }

    /// The value the form was last rendered from.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Signal mirroring the committed value.
    pub fn value_signal(&self) -> Signal<Value> {
        self.value_signal.clone()
    }

    /// A host change arrived that has not been rendered yet.
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Reconcile the current value into the root control.
    pub fn render<H: ControlHost>(&mut self, engine: &mut Engine<H>) -> Result<ControlId> {
        let node = (self.factory)(&self.value);
        let id = {
            let _guard = PassGuard::enter(&self.in_progress);
            engine.reconcile(&node, self.control)?
        };

        if self.control != Some(id) {
            self.attach(engine, id);
        }
        self.pending.set(false);
        self.value_signal.set(self.value.clone());
        trace!(control = %id, form = ?self.name, "form rendered");
        Ok(id)
    }

    pub fn set_value<H: ControlHost>(&mut self, engine: &mut Engine<H>, value: Value) -> Result<ControlId> {
        self.value = value;
        self.render(engine)
    }

    /// Shallow-merge `patch` into a map value; anything else replaces it.
    pub fn patch<H: ControlHost>(&mut self, engine: &mut Engine<H>, patch: Value) -> Result<ControlId> {
        let merged = match (&self.value, patch) {
            (Value::Map(current), Value::Map(changes)) => {
                let mut merged = (**current).clone();
                for (name, value) in changes.iter() {
                    merged.insert(name.clone(), value.clone());
                }
                Value::Map(Rc::new(merged))
            }
            (_, patch) => patch,
        };
        self.set_value(engine, merged)
    }

    /// Re-render the current value.
    pub fn update<H: ControlHost>(&mut self, engine: &mut Engine<H>) -> Result<ControlId> {
        self.render(engine)
    }

    /// Re-render from the host if a change arrived since the last pass.
    ///
    /// Returns whether a pass ran.
    pub fn poll<H: ControlHost>(&mut self, engine: &mut Engine<H>) -> Result<bool> {
        if !self.pending.get() {
            return Ok(false);
        }
        let Some(id) = self.control else {
            self.pending.set(false);
            return Ok(false);
        };
        self.value = engine.host().raw_value(id);
        self.render(engine)?;
        Ok(true)
    }

    /// Stop listening and drop the portal registration. The controls stay.
    pub fn detach<H: ControlHost>(&mut self, engine: &mut Engine<H>) {
        if let Some(subscription) = self.subscription.take() {
            engine.host_mut().unsubscribe(subscription);
        }
        if let Some(name) = &self.name {
            engine.unregister_portal(name);
        }
        self.pending.set(false);
    }

    fn attach<H: ControlHost>(&mut self, engine: &mut Engine<H>, id: ControlId) {
        self.detach(engine);
        self.control = Some(id);

        if let Some(name) = &self.name {
            engine.register_portal(name.clone(), id);
        }
        if self.auto_update {
            let pending = self.pending.clone();
            let in_progress = self.in_progress.clone();
            let subscription = engine.host_mut().subscribe(
                id,
                Rc::new(move |_| {
                    if !in_progress.get() {
                        pending.set(true);
                    }
                }),
            );
            self.subscription = Some(subscription);
        }
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("name", &self.name)
            .field("control", &self.control)
            .field("value", &self.value)
            .field("auto_update", &self.auto_update)
            .field("pending", &self.pending.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::node::{control, group, portal, ControlProps, GroupProps};

    fn factory(value: &Value) -> VirtualNode {
        let field = |name: &str| {
            control(ControlProps {
                value: value.get(name).cloned().unwrap_or_default(),
                ..Default::default()
            })
        };
        group(
            GroupProps {
                source: Some(value.clone()),
                ..Default::default()
            },
            [("a", field("a")), ("b", field("b"))],
        )
    }

    fn initial() -> Value {
        Value::map([("a", Value::from(1)), ("b", Value::from(2))])
    }

    #[test]
    fn test_render_and_patch() {
        let mut engine = Engine::new(MemoryHost::default());
        let mut form = Form::new(factory, initial());

        let id = form.render(&mut engine).unwrap();
        let again = form
            .patch(&mut engine, Value::map([("b", Value::from(5))]))
            .unwrap();

        assert_eq!(id, again);
        assert_eq!(
            engine.host().raw_value(id),
            Value::map([("a", Value::from(1)), ("b", Value::from(5))])
        );
        assert_eq!(form.value_signal().get(), form.value().clone());
    }

    #[test]
    fn test_engine_writes_do_not_mark_pending() {
        let mut engine = Engine::new(MemoryHost::default());
        let mut form = Form::new(factory, initial()).auto_update(true);

        form.render(&mut engine).unwrap();
        form.set_value(&mut engine, Value::map([("a", Value::from(9)), ("b", Value::from(2))]))
            .unwrap();

        assert!(!form.is_pending());
        assert!(!form.poll(&mut engine).unwrap());
    }

    #[test]
    fn test_host_edit_is_polled() {
        let mut engine = Engine::new(MemoryHost::default());
        let mut form = Form::new(factory, initial()).auto_update(true);
        let id = form.render(&mut engine).unwrap();

        let a = engine.host().group_child(id, "a").unwrap();
        engine.host_mut().set_value(a, Value::from(42));
        assert!(form.is_pending());

        assert!(form.poll(&mut engine).unwrap());
        assert!(!form.is_pending());
        assert_eq!(form.value().get("a"), Some(&Value::from(42)));
        assert_eq!(engine.host().group_child(id, "a"), Some(a));
    }

    #[test]
    fn test_named_form_is_portal_target() {
        let mut engine = Engine::new(MemoryHost::default());
        let mut shared = Form::new(factory, initial()).named("shared");
        let shared_id = shared.render(&mut engine).unwrap();

        let outer = engine
            .reconcile(&group(GroupProps::default(), [("inner", portal("shared"))]), None)
            .unwrap();
        assert_eq!(engine.host().group_child(outer, "inner"), Some(shared_id));

        shared.detach(&mut engine);
        engine
            .reconcile(&group(GroupProps::default(), [("inner", portal("shared"))]), Some(outer))
            .unwrap();
        assert_eq!(engine.host().group_child(outer, "inner"), None);
        // Adopted controls are never disposed
        assert!(engine.host().contains(shared_id));
    }
}
