//! Validator bundles and the manager that keeps them attached.
//!
//! A bundle is what the engine remembers about one validator list of one
//! control: the node it came from, the flat function list, and the compiled
//! wrapper when the host only has a single slot.
//!
//! Every pass the manager compares the desired list against what the host
//! actually holds, not against what it attached last time, so anything added
//! or removed behind its back is put right.

use tracing::trace;

use crate::error::Result;
use crate::host::{ControlHost, ValidatorCapability};
use crate::types::{ControlId, ValidatorKind};

use super::compiled::CompiledValidator;
use super::validator::{is_validator_equal, Validator, ValidatorNode};

#[derive(Debug, Clone, Default)]
pub struct ValidatorBundle {
    pub node: Option<ValidatorNode>,
    pub validators: Vec<Validator>,
    pub compiled: Option<CompiledValidator>,
}

impl ValidatorBundle {
    /// What the host is expected to hold for this bundle.
    pub fn attached(&self) -> Vec<Validator> {
        match &self.compiled {
            Some(compiled) => vec![compiled.handle()],
            None => self.validators.clone(),
        }
    }

    /// Dispose the compiled wrapper, if any.
    pub fn dispose(&self) {
        if let Some(compiled) = &self.compiled {
            compiled.dispose();
        }
    }
}

/// Unordered comparison by identity.
fn same_set(a: &[Validator], b: &[Validator]) -> bool {
    a.iter().all(|v| b.contains(v)) && b.iter().all(|v| a.contains(v))
}

fn difference(a: &[Validator], b: &[Validator]) -> Vec<Validator> {
    a.iter().filter(|v| !b.contains(v)).cloned().collect()
}

// =============================================================================
// Manager
// =============================================================================

/// Applies bundles through one capability tier, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorBundleManager {
    capability: ValidatorCapability,
}

impl ValidatorBundleManager {
    pub fn new(capability: ValidatorCapability) -> Self {
        Self { capability }
    }

    pub fn capability(&self) -> ValidatorCapability {
        self.capability
    }

    /// Build the bundle for a control that does not exist yet.
    ///
    /// Returns the bundle and the validators to hand to the host at creation.
    pub fn compile(&self, node: Option<&ValidatorNode>) -> (ValidatorBundle, Vec<Validator>) {
        let validators = node.map(ValidatorNode::compile).unwrap_or_default();
        let compiled = match self.capability {
            ValidatorCapability::Single if !validators.is_empty() => {
                Some(CompiledValidator::new(validators.clone()))
            }
            _ => None,
        };
        let bundle = ValidatorBundle {
            node: node.cloned(),
            validators,
            compiled,
        };
        let attach = bundle.attached();
        (bundle, attach)
    }

    /// Bring the host's `kind` validators on `id` in line with `next`.
    ///
    /// Returns the new bundle and whether the host was touched.
    pub fn sync<H: ControlHost + ?Sized>(
        &self,
        host: &mut H,
        id: ControlId,
        kind: ValidatorKind,
        previous: &ValidatorBundle,
        next: Option<&ValidatorNode>,
    ) -> Result<(ValidatorBundle, bool)> {
        let validators = if is_validator_equal(previous.node.as_ref(), next) {
            previous.validators.clone()
        } else {
            next.map(ValidatorNode::compile).unwrap_or_default()
        };

        let actual = host.attached_validators(id, kind);
        if !same_set(&actual, &previous.attached()) {
            trace!(control = %id, ?kind, "validator drift detected");
        }

        let (compiled, changed) = match self.capability {
            ValidatorCapability::Incremental => {
                previous.dispose();
                let removed = difference(&actual, &validators);
                let added = difference(&validators, &actual);
                if !removed.is_empty() {
                    host.remove_validators(id, kind, &removed)?;
                }
                if !added.is_empty() {
                    host.add_validators(id, kind, &added)?;
                }
                (None, !removed.is_empty() || !added.is_empty())
            }
            ValidatorCapability::Bulk => {
                previous.dispose();
                let changed = !same_set(&actual, &validators);
                if changed {
                    host.set_validators(id, kind, validators.clone())?;
                }
                (None, changed)
            }
            ValidatorCapability::Single => self.sync_single(host, id, kind, previous, &actual, &validators)?,
        };

        let bundle = ValidatorBundle {
            node: next.cloned(),
            validators,
            compiled,
        };
        Ok((bundle, changed))
    }

    fn sync_single<H: ControlHost + ?Sized>(
        &self,
        host: &mut H,
        id: ControlId,
        kind: ValidatorKind,
        previous: &ValidatorBundle,
        actual: &[Validator],
        validators: &[Validator],
    ) -> Result<(Option<CompiledValidator>, bool)> {
        if validators.is_empty() {
            previous.dispose();
            if actual.is_empty() {
                return Ok((None, false));
            }
            host.set_validator(id, kind, None)?;
            return Ok((None, true));
        }

        if let Some(compiled) = &previous.compiled {
            let in_place =
                !compiled.is_disposed() && actual.len() == 1 && actual[0] == compiled.handle();
            if in_place {
                let changed = !same_set(&compiled.validators(), validators);
                if changed {
                    compiled.set(validators.to_vec());
                }
                return Ok((Some(compiled.clone()), changed));
            }
        }

        // First attachment, or the slot was overwritten externally
        previous.dispose();
        let compiled = CompiledValidator::new(validators.to_vec());
        host.set_validator(id, kind, Some(compiled.handle()))?;
        Ok((Some(compiled), true))
    }
}
