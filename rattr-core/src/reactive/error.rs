//! Error types for the reactive attribute engine.
//!
//! All errors are raised synchronously to the caller of the triggering
//! operation. Nothing is retried internally; the only recovery that happens
//! inside the engine is the best-effort skip of an already-unset dependent
//! during an invalidation cascade (see `ClassShared::invalidate_dependents`).

use thiserror::Error;

use super::attr::AttrName;

/// Errors produced by attribute operations and class building.
///
/// The first two variants correspond to runtime attribute access; the rest
/// are rejected at build (bind) time, before any instance exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttrError {
    /// Read of an attribute with no stored value and no declared default,
    /// or delete of an attribute with no stored value.
    #[error("attribute '{name}' is not set and has no default")]
    NotSet { name: AttrName },

    /// An attribute declared itself as one of its own dependencies.
    #[error("attribute '{name}' cannot depend on itself")]
    SelfDependency { name: AttrName },

    /// Two attributes on the same class share a name.
    #[error("attribute '{name}' is declared more than once")]
    DuplicateAttribute { name: AttrName },

    /// A dependency refers to an attribute that is not declared on the
    /// class being built (e.g. a handle from a different builder).
    #[error("attribute '{attr}' depends on '{dependency}', which is not declared on this class")]
    UnknownDependency {
        attr: AttrName,
        dependency: AttrName,
    },
}
