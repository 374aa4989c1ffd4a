//! Callable Wrappers
//!
//! A Thunk is a deferred zero-argument computation; a Method is a deferred
//! computation over the owning instance. These are the two ways an attribute
//! value can be produced instead of being supplied directly.
//!
//! # Why Two Types
//!
//! In a dynamic language this split requires runtime signature inspection
//! (does the callable take zero arguments, or exactly the instance?). Here
//! the two shapes are distinct types, so an invalid arity is a compile-time
//! error and no runtime validation exists.
//!
//! A `Method` is fallible: derived computations read sibling attributes, and
//! those reads can fail with [`AttrError::NotSet`](super::AttrError::NotSet).
//! A `Thunk` is self-contained and infallible.

use std::fmt::{self, Debug};
use std::sync::Arc;

use super::error::AttrError;

/// A deferred, zero-argument computation producing a value.
///
/// Thunks are cheap to clone; clones share the underlying closure.
///
/// # Example
///
/// ```rust,ignore
/// let t = thunk(|| expensive_parse("config.toml"));
/// my_attr.set_lazy(&obj, t); // nothing runs until the next get
/// ```
pub struct Thunk<T> {
    f: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> Thunk<T> {
    /// Wrap a zero-argument closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Run the computation.
    pub fn call(&self) -> T {
        (self.f)()
    }
}

impl<T> Clone for Thunk<T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<T> Debug for Thunk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk(..)")
    }
}

/// Convenience constructor for [`Thunk`].
///
/// # Example
///
/// ```rust,ignore
/// let my_int = builder.attr_lazy("my_int", thunk(|| 12));
/// ```
pub fn thunk<T, F>(f: F) -> Thunk<T>
where
    F: Fn() -> T + Send + Sync + 'static,
{
    Thunk::new(f)
}

/// A deferred, instance-consuming computation producing a value.
///
/// This backs derived attributes: the closure receives the owning instance
/// and typically reads sibling attributes through their accessors.
pub struct Method<R, T> {
    f: Arc<dyn Fn(&R) -> Result<T, AttrError> + Send + Sync>,
}

impl<R, T> Method<R, T> {
    /// Wrap an instance-consuming closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&R) -> Result<T, AttrError> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Run the computation against an instance.
    pub fn call(&self, obj: &R) -> Result<T, AttrError> {
        (self.f)(obj)
    }
}

impl<R, T> Clone for Method<R, T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<R, T> Debug for Method<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method(..)")
    }
}
