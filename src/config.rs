//! Engine configuration.

use crate::host::ValidatorCapability;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Validator tier to use instead of the host's own (default: None = ask the host).
    pub capability: Option<ValidatorCapability>,
    /// Log a warning for array items without a key (default: true).
    pub warn_on_missing_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capability: None,
            warn_on_missing_keys: true,
        }
    }
}

impl EngineConfig {
    pub fn with_capability(mut self, capability: ValidatorCapability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_missing_key_warnings(mut self, warn: bool) -> Self {
        self.warn_on_missing_keys = warn;
        self
    }
}
