//! Reactive Attributes
//!
//! This module implements the reactive-attribute engine: object fields whose
//! value is either supplied directly or derived lazily from a computation
//! over other attributes, with automatic invalidation of derived values when
//! an upstream attribute changes.
//!
//! # Concepts
//!
//! ## Attributes
//!
//! An [`Attr`] is a field-level accessor bound to a name on a class. Its
//! value lives in per-instance slot storage, keyed by instance identity, and
//! is realized on first read from the declared default: a raw value, a
//! [`Thunk`] (zero-argument deferred computation), or a method (derived
//! computation over the instance).
//!
//! ## Dependency registry
//!
//! Each class keeps a reverse-edge map from an attribute to the attributes
//! derived from it. It is built once, when [`ClassBuilder::build`] binds the
//! declarations, and is read-only afterwards.
//!
//! ## Autoset tracking
//!
//! When a derived attribute's method default produces a value, the engine
//! marks it *autoset* for that instance: the cached value is the engine's
//! own work and may be silently discarded when an upstream attribute
//! changes. An explicit write removes the mark, and from then on upstream
//! changes leave the attribute alone until it is deleted.
//!
//! # Evaluation Model
//!
//! Strictly pull-based: nothing recomputes until somebody reads. A write
//! only clears dependent caches; the next read of a cleared dependent runs
//! its method again. There is no scheduler, no batching, and no push
//! propagation.

mod attr;
mod class;
mod error;
mod instance;
mod thunk;

pub use attr::{Attr, AttrDefault, AttrName, DependsOn};
pub use class::{ClassBuilder, ReactiveClass, SlotKey};
pub use error::AttrError;
pub use instance::{Instance, InstanceId};
pub use thunk::{thunk, Method, Thunk};
