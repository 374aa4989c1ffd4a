//! Reactive Class: declarations, dependency registry, autoset tracker.
//!
//! A reactive class plays the role a type plays in a language with attribute
//! interception: it owns the attribute declarations, the dependency registry
//! (reverse edges: attribute -> attributes that must invalidate when it
//! changes), and the per-instance autoset bookkeeping. All of it is shared by
//! every instance of the class.
//!
//! # Binding
//!
//! [`ClassBuilder::build`] is the one-time bind step. It assigns each
//! declaration a deterministic slot key (declaration order), rejects
//! self-dependencies and other declaration errors, builds the registry, and
//! installs a back-reference to the class into every accessor. It runs once
//! per class, never per instance.
//!
//! # Invalidation
//!
//! When an attribute is written or deleted, the class walks the registry
//! entry for that attribute and clears every dependent that is currently
//! autoset (its cached value came from its own method default). Dependents
//! that were explicitly overridden are left alone. The cascade is
//! best-effort: a dependent that is already unset is skipped, never surfaced.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::attr::{Attr, AttrDefault, AttrName, DependsOn};
use super::error::AttrError;
use super::instance::{Instance, InstanceId};
use super::thunk::{Method, Thunk};

/// Deterministic per-class storage key for an attribute.
///
/// Assigned at bind time from declaration order; unique within a class. The
/// registry and the autoset tracker are keyed by slot key rather than name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey(u32);

impl SlotKey {
    pub(super) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// The key's position in declaration order.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Slot key and class back-reference installed into an accessor at bind time.
pub(super) struct Binding<R> {
    pub(super) key: SlotKey,
    pub(super) class: Weak<ClassShared<R>>,
}

impl<R> Binding<R> {
    /// The owning class.
    ///
    /// The class owns the registry the accessor needs for every write and
    /// delete; an accessor that outlives its `ReactiveClass` is an API
    /// misuse.
    pub(super) fn class(&self) -> Arc<ClassShared<R>> {
        self.class
            .upgrade()
            .expect("reactive attribute outlived its ReactiveClass")
    }
}

/// Type-erased view of an accessor, as stored by the class.
///
/// Cascading invalidation has to clear dependents whose value types differ
/// from the attribute that triggered it, so the class holds its attributes
/// behind this trait.
pub(super) trait ErasedAttr<R>: Send + Sync {
    fn name(&self) -> AttrName;
    fn depends(&self) -> &[AttrName];
    fn bind(&self, binding: Binding<R>);
    /// Full delete: remove the slot, clear autoset, cascade.
    fn clear(&self, obj: &R) -> Result<(), AttrError>;
    /// Drop one instance's slot without cascading.
    fn forget(&self, id: InstanceId);
}

/// State shared between a [`ReactiveClass`] and its accessors.
pub(super) struct ClassShared<R> {
    /// Attribute declarations in slot-key order.
    attrs: Vec<Arc<dyn ErasedAttr<R>>>,

    /// Dependency registry, reverse edges: `dependents[k]` holds the slot
    /// keys of the attributes that depend on attribute `k`. Read-only after
    /// build.
    dependents: Vec<SmallVec<[SlotKey; 4]>>,

    /// Autoset tracker: per-instance set of slot keys whose current value
    /// was produced by the attribute's own method default. Membership checks
    /// and updates happen under one lock.
    autoset: RwLock<HashMap<InstanceId, HashSet<SlotKey>>>,
}

impl<R: Instance> ClassShared<R> {
    pub(super) fn mark_autoset(&self, id: InstanceId, key: SlotKey) {
        self.autoset.write().entry(id).or_default().insert(key);
    }

    pub(super) fn clear_autoset(&self, id: InstanceId, key: SlotKey) {
        let mut autoset = self.autoset.write();
        if let Some(set) = autoset.get_mut(&id) {
            set.remove(&key);
            if set.is_empty() {
                autoset.remove(&id);
            }
        }
    }

    pub(super) fn is_autoset(&self, id: InstanceId, key: SlotKey) -> bool {
        self.autoset
            .read()
            .get(&id)
            .is_some_and(|set| set.contains(&key))
    }

    /// Invalidate every dependent of `key` that is still autoset.
    ///
    /// Each clear runs the dependent's own delete logic, so invalidation
    /// cascades down chains of derived attributes. The recursion terminates
    /// because a dependent's autoset mark is removed before its own
    /// dependents are visited.
    pub(super) fn invalidate_dependents(&self, obj: &R, key: SlotKey) {
        let id = obj.instance_id();
        for &dep in &self.dependents[key.index()] {
            if !self.is_autoset(id, dep) {
                // Explicitly overridden (or never derived); preserve it.
                continue;
            }
            let attr = &self.attrs[dep.index()];
            match attr.clear(obj) {
                Ok(()) => debug!(attr = attr.name(), "invalidated dependent"),
                Err(AttrError::NotSet { .. }) => {
                    // Already cleared earlier in the cascade.
                    trace!(attr = attr.name(), "dependent already unset, skipping");
                }
                Err(_) => {}
            }
        }
    }

    fn forget_instance(&self, id: InstanceId) {
        for attr in &self.attrs {
            attr.forget(id);
        }
        self.autoset.write().remove(&id);
    }
}

/// Assembles attribute declarations for one record type.
///
/// Declarations are made through the builder so that [`build`](Self::build)
/// can run the bind step over the complete set.
///
/// # Example
///
/// ```rust,ignore
/// let mut b = ClassBuilder::<Sensor>::new();
/// let raw = b.attr_lazy("raw", thunk(read_probe));
/// let raw_dep = raw.clone();
/// let celsius = b.derived("celsius", &[&raw], move |s: &Sensor| {
///     Ok((raw_dep.get(s)? - 32.0) / 1.8)
/// });
/// let class = b.build()?;
/// ```
pub struct ClassBuilder<R> {
    attrs: Vec<Arc<dyn ErasedAttr<R>>>,
}

impl<R> ClassBuilder<R>
where
    R: Instance + 'static,
{
    pub fn new() -> Self {
        Self { attrs: Vec::new() }
    }

    /// Declare an attribute with no default.
    ///
    /// Reading it before any write fails with [`AttrError::NotSet`].
    pub fn attr<T>(&mut self, name: AttrName) -> Attr<R, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.declare(name, None, SmallVec::new())
    }

    /// Declare an attribute with a raw default value.
    pub fn attr_default<T>(&mut self, name: AttrName, value: T) -> Attr<R, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.declare(name, Some(AttrDefault::Value(value)), SmallVec::new())
    }

    /// Declare an attribute whose default is a deferred computation,
    /// invoked once per instance on first read.
    pub fn attr_lazy<T>(&mut self, name: AttrName, t: Thunk<T>) -> Attr<R, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.declare(name, Some(AttrDefault::Thunk(t)), SmallVec::new())
    }

    /// Declare a derived attribute.
    ///
    /// `f` computes the value from the instance; `depends` lists the
    /// upstream attributes whose writes and deletes invalidate the cached
    /// result (as long as it has not been explicitly overridden).
    pub fn derived<T, F>(
        &mut self,
        name: AttrName,
        depends: &[&dyn DependsOn],
        f: F,
    ) -> Attr<R, T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&R) -> Result<T, AttrError> + Send + Sync + 'static,
    {
        let depends = depends.iter().map(|d| d.name()).collect();
        self.declare(name, Some(AttrDefault::Method(Method::new(f))), depends)
    }

    fn declare<T>(
        &mut self,
        name: AttrName,
        default: Option<AttrDefault<R, T>>,
        depends: SmallVec<[AttrName; 4]>,
    ) -> Attr<R, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let attr = Attr::declare(name, default, depends);
        self.attrs.push(attr.erased());
        attr
    }

    /// The one-time bind step.
    ///
    /// Assigns slot keys, validates the declarations, builds the dependency
    /// registry, and installs the class back-reference into every accessor.
    /// Accessors are unusable for writes and derived reads until this runs.
    pub fn build(self) -> Result<ReactiveClass<R>, AttrError> {
        let mut by_name: IndexMap<AttrName, SlotKey> = IndexMap::new();
        for (index, attr) in self.attrs.iter().enumerate() {
            if by_name.insert(attr.name(), SlotKey::new(index)).is_some() {
                return Err(AttrError::DuplicateAttribute { name: attr.name() });
            }
        }

        let mut dependents: Vec<SmallVec<[SlotKey; 4]>> =
            vec![SmallVec::new(); self.attrs.len()];
        for (index, attr) in self.attrs.iter().enumerate() {
            for &dep in attr.depends() {
                if dep == attr.name() {
                    return Err(AttrError::SelfDependency { name: attr.name() });
                }
                let Some(&dep_key) = by_name.get(dep) else {
                    return Err(AttrError::UnknownDependency {
                        attr: attr.name(),
                        dependency: dep,
                    });
                };
                dependents[dep_key.index()].push(SlotKey::new(index));
            }
        }

        let shared = Arc::new(ClassShared {
            attrs: self.attrs,
            dependents,
            autoset: RwLock::new(HashMap::new()),
        });
        for (index, attr) in shared.attrs.iter().enumerate() {
            attr.bind(Binding {
                key: SlotKey::new(index),
                class: Arc::downgrade(&shared),
            });
        }

        debug!(attrs = shared.attrs.len(), "reactive class built");
        Ok(ReactiveClass { shared })
    }
}

impl<R> Default for ClassBuilder<R>
where
    R: Instance + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A bound reactive class.
///
/// Owns the declarations, the dependency registry, and the per-instance
/// autoset state. Must be kept alive for as long as its accessors are used;
/// cheap to clone (clones share state).
pub struct ReactiveClass<R> {
    shared: Arc<ClassShared<R>>,
}

impl<R: Instance> ReactiveClass<R> {
    /// Names of the attributes that depend on `name`, i.e. the registry
    /// entry for it. Empty if the attribute is unknown or has no dependents.
    pub fn dependents_of(&self, name: AttrName) -> Vec<AttrName> {
        let Some(key) = self.key_of(name) else {
            return Vec::new();
        };
        self.shared.dependents[key.index()]
            .iter()
            .map(|dep| self.shared.attrs[dep.index()].name())
            .collect()
    }

    /// Whether `name`'s current value on this instance was produced by its
    /// own method default (and is therefore safe to discard on invalidation).
    pub fn is_autoset(&self, obj: &R, name: AttrName) -> bool {
        self.key_of(name)
            .is_some_and(|key| self.shared.is_autoset(obj.instance_id(), key))
    }

    /// Attribute names in declaration order.
    pub fn attr_names(&self) -> Vec<AttrName> {
        self.shared.attrs.iter().map(|attr| attr.name()).collect()
    }

    /// Drop all per-instance state (slots and autoset membership) for one
    /// instance. No cascade runs; the whole instance's state goes away at
    /// once. Idempotent.
    pub fn forget(&self, obj: &R) {
        self.shared.forget_instance(obj.instance_id());
    }

    fn key_of(&self, name: AttrName) -> Option<SlotKey> {
        self.shared
            .attrs
            .iter()
            .position(|attr| attr.name() == name)
            .map(SlotKey::new)
    }
}

impl<R> Clone for ReactiveClass<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> Debug for ReactiveClass<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<AttrName> = self.shared.attrs.iter().map(|a| a.name()).collect();
        f.debug_struct("ReactiveClass")
            .field("attrs", &names)
            .finish()
    }
}
