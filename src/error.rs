//! Reconciliation errors.
//!
//! Every variant is a usage error: a pass that returns one of these stops
//! where it failed and leaves the control tree partially updated. Rebuild
//! the tree from scratch to recover.

use thiserror::Error;

use crate::host::ValidatorCapability;
use crate::types::{ControlId, ControlKind, Key};

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("cannot render a {kind} node at the root; it needs an enclosing slot")]
    UnresolvableRoot { kind: &'static str },

    #[error("node type change not supported at `{path}`: live control is a {expected}, node describes a {found}")]
    NodeTypeChanged {
        path: String,
        expected: ControlKind,
        found: ControlKind,
    },

    #[error("duplicate array key {key} at `{path}`")]
    DuplicateKey { path: String, key: Key },

    #[error("control {0} was never rendered by this engine")]
    NotRendered(ControlId),

    #[error("control {0} does not exist in the host")]
    UnknownControl(ControlId),

    #[error("host with {capability:?} validators does not support `{operation}`")]
    Unsupported {
        capability: ValidatorCapability,
        operation: &'static str,
    },
}

impl ReconcileError {
    pub(crate) fn unsupported(capability: ValidatorCapability, operation: &'static str) -> Self {
        Self::Unsupported {
            capability,
            operation,
        }
    }
}
