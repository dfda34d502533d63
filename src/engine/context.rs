//! Render context - per-pass state threaded through the differ.
//!
//! Scopes are pushed when the differ descends into a group or array and
//! popped on the way out. Each scope stores the cumulative flags, so a lookup
//! only ever reads the top.

#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    /// Some enclosing container is disabled.
    disabled: bool,
    /// Some enclosing container is invisible.
    hidden: bool,
    /// Some enclosing container flipped its enabled state this pass.
    refresh: bool,
}

#[derive(Debug, Default)]
pub struct RenderContext {
    scopes: Vec<Scope>,
    path: Vec<String>,
    validators_changed: bool,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a root whose containing tree is already disabled.
    pub fn with_root_disabled(disabled: bool) -> Self {
        let mut ctx = Self::new();
        if disabled {
            ctx.scopes.push(Scope {
                disabled: true,
                ..Scope::default()
            });
        }
        ctx
    }

    fn top(&self) -> Scope {
        self.scopes.last().copied().unwrap_or_default()
    }

    /// Effective disabled state for a node that asks for `own`.
    pub fn try_disabled(&self, own: bool) -> bool {
        self.top().disabled || own
    }

    pub fn hidden(&self) -> bool {
        self.top().hidden
    }

    pub fn refresh(&self) -> bool {
        self.top().refresh
    }

    pub fn push_scope(&mut self, disabled: bool, hidden: bool, refresh: bool) {
        let top = self.top();
        self.scopes.push(Scope {
            disabled: top.disabled || disabled,
            hidden: top.hidden || hidden,
            refresh: top.refresh || refresh,
        });
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn push_path(&mut self, segment: impl Into<String>) {
        self.path.push(segment.into());
    }

    pub fn pop_path(&mut self) {
        self.path.pop();
    }

    /// Dotted path of the node being processed, for error messages.
    pub fn path(&self) -> String {
        if self.path.is_empty() {
            return "<root>".to_string();
        }
        let mut out = String::new();
        for segment in &self.path {
            if !out.is_empty() && !segment.starts_with('[') {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }

    pub fn mark_validators_changed(&mut self) {
        self.validators_changed = true;
    }

    /// Read and clear the flag.
    pub fn take_validators_changed(&mut self) -> bool {
        std::mem::take(&mut self.validators_changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_cascades_down() {
        let mut ctx = RenderContext::new();
        assert!(!ctx.try_disabled(false));
        assert!(ctx.try_disabled(true));

        ctx.push_scope(true, false, false);
        ctx.push_scope(false, false, false);
        assert!(ctx.try_disabled(false));

        ctx.pop_scope();
        ctx.pop_scope();
        assert!(!ctx.try_disabled(false));
    }

    #[test]
    fn test_root_disabled() {
        let ctx = RenderContext::with_root_disabled(true);
        assert!(ctx.try_disabled(false));
    }

    #[test]
    fn test_path() {
        let mut ctx = RenderContext::new();
        assert_eq!(ctx.path(), "<root>");
        ctx.push_path("animals");
        ctx.push_path("[\"mouse\"]");
        ctx.push_path("name");
        assert_eq!(ctx.path(), "animals[\"mouse\"].name");
    }

    #[test]
    fn test_validators_changed_is_taken() {
        let mut ctx = RenderContext::new();
        ctx.mark_validators_changed();
        assert!(ctx.take_validators_changed());
        assert!(!ctx.take_validators_changed());
    }
}
