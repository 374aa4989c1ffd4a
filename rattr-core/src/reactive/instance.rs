//! Instance identity.
//!
//! Attribute storage and autoset tracking are keyed by the identity of the
//! owning instance, not by address: an `InstanceId` stays stable if the
//! instance moves, and two instances never share one.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a reactive record instance.
///
/// Generated from an atomic counter, so ids are unique across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Generate a new unique instance ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

/// A record whose fields are managed by reactive attributes.
///
/// Implementors hold an [`InstanceId`] (usually a plain field initialized
/// with `InstanceId::new()`) and return it here. The engine uses it to key
/// per-instance slot storage and autoset membership.
///
/// # Example
///
/// ```rust,ignore
/// struct Sensor {
///     id: InstanceId,
///     label: String,
/// }
///
/// impl Instance for Sensor {
///     fn instance_id(&self) -> InstanceId {
///         self.id
///     }
/// }
/// ```
pub trait Instance {
    /// The identity under which this instance's attribute state is stored.
    fn instance_id(&self) -> InstanceId;
}
