//! Rattr Core
//!
//! This crate provides the core engine for rattr, a reactive-attribute
//! library. It implements:
//!
//! - Lazily realized attribute values (raw defaults and thunks)
//! - Derived attributes computed from sibling attributes
//! - Per-class dependency tracking with cascading invalidation
//! - Per-instance override protection for explicitly written values
//!
//! # Architecture
//!
//! Everything lives in the `reactive` module:
//!
//! - `Attr`: the field-level accessor mediating get/set/delete
//! - `ClassBuilder` / `ReactiveClass`: declaration assembly, the one-time
//!   bind step, the dependency registry, and autoset tracking
//! - `Thunk` / `Method`: the two shapes of deferred computation
//!
//! # Example
//!
//! ```rust,ignore
//! use rattr_core::reactive::{thunk, ClassBuilder, Instance, InstanceId};
//!
//! struct Sensor {
//!     id: InstanceId,
//!     normal: i64,
//! }
//!
//! impl Instance for Sensor {
//!     fn instance_id(&self) -> InstanceId {
//!         self.id
//!     }
//! }
//!
//! let mut b = ClassBuilder::<Sensor>::new();
//! let my_int = b.attr_lazy("my_int", thunk(|| 12));
//! let my_int_dep = my_int.clone();
//! let x = b.derived("x", &[&my_int], move |s: &Sensor| {
//!     Ok(s.normal + my_int_dep.get(s)?)
//! });
//! let class = b.build()?;
//!
//! let sensor = Sensor { id: InstanceId::new(), normal: 13 };
//! assert_eq!(x.get(&sensor)?, 25);   // computed once
//! assert_eq!(x.get(&sensor)?, 25);   // cached
//!
//! my_int.set(&sensor, 13);           // invalidates x
//! assert_eq!(x.get(&sensor)?, 26);   // recomputed on demand
//! ```

pub mod reactive;
