//! Validation - validator nodes, combinators, compiled wrappers and bundles.
//!
//! The engine only manages the attachment lifecycle; the functions themselves
//! are opaque apart from a handful of built-ins.

mod builtin;
mod bundle;
mod combinators;
mod compiled;
mod validator;

pub use builtin::*;
pub use bundle::*;
pub use combinators::*;
pub use compiled::*;
pub use validator::*;
