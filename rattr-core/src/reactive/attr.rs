//! Reactive Attribute Accessor
//!
//! An `Attr<R, T>` is the field-level object bound to a name on a reactive
//! class. It owns the declared default (raw value, thunk, or method), the
//! declared upstream dependency list, and the per-instance slot storage, and
//! it mediates every read, write, and delete of the field.
//!
//! # How Reads Work
//!
//! 1. If the instance has a realized slot, return a clone of the value.
//!
//! 2. If the slot holds a pending thunk (assigned via `set_lazy`), force it
//!    now and overwrite the slot with the result.
//!
//! 3. If the slot is unset, realize the declared default: a raw default is
//!    stored as-is, a thunk default is invoked with zero arguments, and a
//!    method default is invoked with the instance and additionally marks the
//!    attribute *autoset* for that instance.
//!
//! The autoset mark is what distinguishes "derived, safe to discard" from
//! "explicitly overridden, must be preserved" when an upstream dependency
//! later changes.
//!
//! # How Writes and Deletes Work
//!
//! A write stores the new value and clears the attribute's own autoset mark
//! (an explicit write always counts as an override). A delete removes the
//! slot entirely. Both then walk the class's dependency registry and clear
//! every dependent that is still autoset, cascading through each dependent's
//! own delete logic. Dependents that were explicitly overridden are left
//! untouched.
//!
//! # Locking
//!
//! User computations (thunks and methods) are never invoked while a slot
//! map guard is held, so a method body may freely read sibling attributes,
//! including attributes of the same class.

use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::class::{Binding, ErasedAttr};
use super::error::AttrError;
use super::instance::{Instance, InstanceId};
use super::thunk::{Method, Thunk};

/// The name an attribute is declared under. Names are `'static` because they
/// double as registry keys and appear in error values.
pub type AttrName = &'static str;

/// The declared default of an attribute.
///
/// This is the tagged variant behind every attribute declaration: either a
/// raw value stored verbatim, a deferred zero-argument computation, or a
/// derived computation over the owning instance.
pub enum AttrDefault<R, T> {
    /// A raw value, cloned into the slot on first read.
    Value(T),
    /// A deferred computation, invoked once per instance on first read.
    Thunk(Thunk<T>),
    /// A derived computation; reads mark the attribute autoset.
    Method(Method<R, T>),
}

impl<R, T: Clone> Clone for AttrDefault<R, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(v) => Self::Value(v.clone()),
            Self::Thunk(t) => Self::Thunk(t.clone()),
            Self::Method(m) => Self::Method(m.clone()),
        }
    }
}

impl<R, T> Debug for AttrDefault<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Thunk(_) => f.write_str("Thunk(..)"),
            Self::Method(_) => f.write_str("Method(..)"),
        }
    }
}

/// Per-instance slot state.
///
/// A slot is either a realized value or a pending thunk awaiting forced
/// realization on the next read. "Unset" is the absence of a slot.
enum Slot<T> {
    Realized(T),
    Pending(Thunk<T>),
}

/// Result of peeking at a slot without holding the map guard.
enum Found<T> {
    Realized(T),
    Pending(Thunk<T>),
    Unset,
}

/// Something an attribute can declare a dependency on.
///
/// Implemented by every `Attr<R, T>`, so dependency lists are written as
/// `&[&my_int, &my_str]` regardless of the attributes' value types.
pub trait DependsOn {
    /// The declared name of the dependency.
    fn name(&self) -> AttrName;
}

/// A reactive attribute bound to a name on a class.
///
/// Cheap to clone; clones share state, so a handle can be captured by the
/// method closures of sibling attributes.
///
/// # Example
///
/// ```rust,ignore
/// let mut b = ClassBuilder::<Sensor>::new();
/// let raw = b.attr::<f64>("raw");
/// let raw_for_avg = raw.clone();
/// let smoothed = b.derived("smoothed", &[&raw], move |s: &Sensor| {
///     Ok(raw_for_avg.get(s)? * 0.5)
/// });
/// let class = b.build()?;
/// ```
pub struct Attr<R, T> {
    inner: Arc<AttrInner<R, T>>,
}

pub(super) struct AttrInner<R, T> {
    /// The name this attribute is declared under.
    name: AttrName,

    /// The declared default, if any.
    default: Option<AttrDefault<R, T>>,

    /// Names of upstream attributes this one is derived from.
    depends: SmallVec<[AttrName; 4]>,

    /// Per-instance storage, keyed by instance identity.
    slots: DashMap<InstanceId, Slot<T>>,

    /// Slot key and class back-reference, populated once at bind time.
    binding: OnceLock<Binding<R>>,
}

impl<R, T> Attr<R, T> {
    /// The name this attribute is declared under.
    pub fn name(&self) -> AttrName {
        self.inner.name
    }
}

impl<R, T> Clone for Attr<R, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, T> DependsOn for Attr<R, T> {
    fn name(&self) -> AttrName {
        self.inner.name
    }
}

impl<R, T: 'static> Debug for Attr<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("name", &self.inner.name)
            .field("default", &self.inner.default)
            .field("depends", &self.inner.depends.as_slice())
            .field("instances", &self.inner.slots.len())
            .finish()
    }
}

impl<R, T> Attr<R, T>
where
    R: Instance,
    T: Clone + Send + Sync + 'static,
{
    pub(super) fn declare(
        name: AttrName,
        default: Option<AttrDefault<R, T>>,
        depends: SmallVec<[AttrName; 4]>,
    ) -> Self {
        Self {
            inner: Arc::new(AttrInner {
                name,
                default,
                depends,
                slots: DashMap::new(),
                binding: OnceLock::new(),
            }),
        }
    }

    /// The declared default, verbatim.
    ///
    /// Class-level introspection: touches no instance state. Fails with
    /// [`AttrError::NotSet`] if the attribute has no default.
    pub fn declared_default(&self) -> Result<AttrDefault<R, T>, AttrError> {
        self.inner.default.clone().ok_or(AttrError::NotSet {
            name: self.inner.name,
        })
    }

    /// Whether the instance currently has a stored slot (realized value or
    /// pending thunk) for this attribute.
    pub fn is_set(&self, obj: &R) -> bool {
        self.inner.slots.contains_key(&obj.instance_id())
    }

    /// Read the attribute, realizing its default if the slot is unset.
    ///
    /// A declared computation runs at most once between two invalidating
    /// events: reading twice in a row returns the same cached value with no
    /// recomputation.
    pub fn get(&self, obj: &R) -> Result<T, AttrError> {
        let id = obj.instance_id();

        // Peek and release the guard before running any user code: a thunk
        // or method may read back into this class's attributes.
        let found = match self.inner.slots.get(&id) {
            Some(slot) => match &*slot {
                Slot::Realized(v) => Found::Realized(v.clone()),
                Slot::Pending(t) => Found::Pending(t.clone()),
            },
            None => Found::Unset,
        };

        match found {
            Found::Realized(v) => Ok(v),
            Found::Pending(t) => {
                trace!(attr = self.inner.name, "forcing pending thunk");
                let v = t.call();
                self.inner.slots.insert(id, Slot::Realized(v.clone()));
                Ok(v)
            }
            Found::Unset => self.realize_default(obj, id),
        }
    }

    /// Realize the declared default into the instance's slot.
    fn realize_default(&self, obj: &R, id: InstanceId) -> Result<T, AttrError> {
        let default = self.inner.default.as_ref().ok_or(AttrError::NotSet {
            name: self.inner.name,
        })?;

        match default {
            AttrDefault::Value(v) => {
                let v = v.clone();
                self.inner.slots.insert(id, Slot::Realized(v.clone()));
                Ok(v)
            }
            AttrDefault::Thunk(t) => {
                trace!(attr = self.inner.name, "realizing thunk default");
                let t = t.clone();
                let v = t.call();
                self.inner.slots.insert(id, Slot::Realized(v.clone()));
                // No autoset mark: a realized thunk is indistinguishable
                // from an explicit write from here on.
                Ok(v)
            }
            AttrDefault::Method(m) => {
                trace!(attr = self.inner.name, "computing derived value");
                let m = m.clone();
                let v = m.call(obj)?;
                self.inner.slots.insert(id, Slot::Realized(v.clone()));
                let binding = self.bound();
                binding.class().mark_autoset(id, binding.key);
                Ok(v)
            }
        }
    }

    /// Write a raw value.
    ///
    /// Clears the attribute's own autoset mark (an explicit write is always
    /// an override), then invalidates every dependent that is still autoset.
    pub fn set(&self, obj: &R, value: T) {
        self.store(obj, Slot::Realized(value));
    }

    /// Write a deferred computation, realized on the next read.
    ///
    /// Invalidation of dependents happens now, at write time, not when the
    /// thunk is eventually forced.
    pub fn set_lazy(&self, obj: &R, t: Thunk<T>) {
        self.store(obj, Slot::Pending(t));
    }

    fn store(&self, obj: &R, slot: Slot<T>) {
        let id = obj.instance_id();
        self.inner.slots.insert(id, slot);
        debug!(attr = self.inner.name, "set");

        let binding = self.bound();
        let class = binding.class();
        class.clear_autoset(id, binding.key);
        class.invalidate_dependents(obj, binding.key);
    }

    /// Remove the stored slot, reverting the attribute to unset.
    ///
    /// Fails with [`AttrError::NotSet`] if nothing is stored. On success,
    /// dependents that are still autoset are invalidated, cascading through
    /// their own delete logic.
    pub fn delete(&self, obj: &R) -> Result<(), AttrError> {
        self.inner.clear_slot(obj)
    }

    pub(super) fn erased(&self) -> Arc<dyn ErasedAttr<R>>
    where
        R: 'static,
    {
        Arc::clone(&self.inner) as Arc<dyn ErasedAttr<R>>
    }

    fn bound(&self) -> &Binding<R> {
        self.inner.bound()
    }
}

impl<R, T> AttrInner<R, T>
where
    R: Instance,
    T: Clone + Send + Sync + 'static,
{
    /// Delete: remove the slot, clear the autoset mark, cascade to
    /// dependents. Shared by [`Attr::delete`] and the erased cascade path.
    fn clear_slot(&self, obj: &R) -> Result<(), AttrError> {
        let id = obj.instance_id();
        if self.slots.remove(&id).is_none() {
            return Err(AttrError::NotSet { name: self.name });
        }
        debug!(attr = self.name, "deleted");

        let binding = self.bound();
        let class = binding.class();
        class.clear_autoset(id, binding.key);
        class.invalidate_dependents(obj, binding.key);
        Ok(())
    }

    /// The binding installed by `ClassBuilder::build`.
    ///
    /// Using an accessor before its class is built (or after the class was
    /// dropped) is an API misuse, not a recoverable condition.
    fn bound(&self) -> &Binding<R> {
        self.binding
            .get()
            .expect("reactive attribute used before its ClassBuilder was built")
    }
}

impl<R, T> ErasedAttr<R> for AttrInner<R, T>
where
    R: Instance + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> AttrName {
        self.name
    }

    fn depends(&self) -> &[AttrName] {
        &self.depends
    }

    fn bind(&self, binding: Binding<R>) {
        assert!(
            self.binding.set(binding).is_ok(),
            "attribute '{}' bound twice",
            self.name
        );
    }

    fn clear(&self, obj: &R) -> Result<(), AttrError> {
        self.clear_slot(obj)
    }

    fn forget(&self, id: InstanceId) {
        self.slots.remove(&id);
    }
}
