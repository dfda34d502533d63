//! Portals - controls supplied by another root.
//!
//! A [`PortalNode`](crate::node::PortalNode) names a form. The engine looks
//! the name up in its own table of named forms first, then in an optional
//! external [`PortalHost`]. An unknown name renders nothing in that slot.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::types::ControlId;

pub trait PortalHost {
    /// Root control of the form registered under `name`.
    fn get_form(&self, name: &str) -> Option<ControlId>;
}

#[derive(Default)]
pub struct PortalTable {
    forms: HashMap<String, ControlId>,
    external: Option<Rc<dyn PortalHost>>,
}

impl PortalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, control: ControlId) {
        self.forms.insert(name.into(), control);
    }

    pub fn unregister(&mut self, name: &str) -> Option<ControlId> {
        self.forms.remove(name)
    }

    pub fn set_external(&mut self, host: Option<Rc<dyn PortalHost>>) {
        self.external = host;
    }
}

impl PortalHost for PortalTable {
    fn get_form(&self, name: &str) -> Option<ControlId> {
        self.forms
            .get(name)
            .copied()
            .or_else(|| self.external.as_ref().and_then(|host| host.get_form(name)))
    }
}

impl fmt::Debug for PortalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalTable")
            .field("forms", &self.forms)
            .field("external", &self.external.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(ControlId);

    impl PortalHost for Fixed {
        fn get_form(&self, name: &str) -> Option<ControlId> {
            (name == "shared").then_some(self.0)
        }
    }

    #[test]
    fn test_local_forms_win() {
        let mut table = PortalTable::new();
        table.set_external(Some(Rc::new(Fixed(ControlId(9)))));
        assert_eq!(table.get_form("shared"), Some(ControlId(9)));

        table.register("shared", ControlId(1));
        assert_eq!(table.get_form("shared"), Some(ControlId(1)));

        table.unregister("shared");
        assert_eq!(table.get_form("shared"), Some(ControlId(9)));
        assert_eq!(table.get_form("missing"), None);
    }
}
