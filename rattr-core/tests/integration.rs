//! Integration Tests for the Reactive Attribute Engine
//!
//! These tests exercise whole classes end to end: memoization, cascading
//! invalidation, override protection, and multi-level dependency chains.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use rattr_core::reactive::{thunk, Attr, ClassBuilder, Instance, InstanceId, ReactiveClass};

struct Rec {
    id: InstanceId,
    normal: i64,
}

impl Rec {
    fn new(normal: i64) -> Self {
        Self {
            id: InstanceId::new(),
            normal,
        }
    }
}

impl Instance for Rec {
    fn instance_id(&self) -> InstanceId {
        self.id
    }
}

/// One class with a lazy input and a derived attribute reading it, plus a
/// counter for the derived computation's side effect.
fn int_and_derived() -> (Attr<Rec, i64>, Attr<Rec, i64>, ReactiveClass<Rec>, Arc<AtomicI32>) {
    let computes = Arc::new(AtomicI32::new(0));
    let computes_clone = computes.clone();

    let mut b = ClassBuilder::<Rec>::new();
    let my_int = b.attr_lazy("my_int", thunk(|| 12i64));
    let my_int_dep = my_int.clone();
    let x = b.derived("x", &[&my_int], move |rec: &Rec| {
        computes_clone.fetch_add(1, Ordering::SeqCst);
        Ok(rec.normal + my_int_dep.get(rec)?)
    });
    let class = b.build().unwrap();
    (my_int, x, class, computes)
}

/// First read computes once; second read is served from cache; an upstream
/// write invalidates and the next read recomputes.
#[test]
fn derived_attribute_memoizes_and_recomputes() {
    let (my_int, x, _class, computes) = int_and_derived();
    let rec = Rec::new(13);

    // First read: exactly one computation, 13 + 12.
    assert_eq!(x.get(&rec), Ok(25));
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    // Second read: cached.
    assert_eq!(x.get(&rec), Ok(25));
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    // Upstream write invalidates; next read recomputes.
    my_int.set(&rec, 13);
    assert_eq!(x.get(&rec), Ok(26));
    assert_eq!(computes.load(Ordering::SeqCst), 2);

    // And caches again.
    assert_eq!(x.get(&rec), Ok(26));
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}

/// Writing directly to the derived attribute suppresses automatic
/// invalidation from upstream writes.
#[test]
fn explicit_write_protects_against_invalidation() {
    let (my_int, x, _class, computes) = int_and_derived();
    let rec = Rec::new(13);

    assert_eq!(x.get(&rec), Ok(25));
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    // Override, then change the upstream value.
    x.set(&rec, 15);
    my_int.set(&rec, 1);

    // The override survives; no recomputation happened.
    assert_eq!(x.get(&rec), Ok(15));
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

/// Deleting an overridden derived attribute re-arms it: the next read
/// recomputes from the current upstream values.
#[test]
fn delete_after_override_recomputes() {
    let (my_int, x, _class, computes) = int_and_derived();
    let rec = Rec::new(13);

    assert_eq!(x.get(&rec), Ok(25));
    x.set(&rec, 15);
    my_int.set(&rec, 1);
    assert_eq!(x.get(&rec), Ok(15));
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    x.delete(&rec).unwrap();
    assert_eq!(x.get(&rec), Ok(14));
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}

/// A thunk runs on exactly the first read and never again for that
/// instance, even across writes to unrelated attributes.
#[test]
fn thunk_side_effect_happens_once() {
    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();

    let mut b = ClassBuilder::<Rec>::new();
    let other = b.attr::<i64>("other");
    let my_str = b.attr_lazy(
        "my_str",
        thunk(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            "world".to_string()
        }),
    );
    let _class = b.build().unwrap();

    let rec = Rec::new(0);
    assert_eq!(my_str.get(&rec).unwrap(), "world");
    assert_eq!(my_str.get(&rec).unwrap(), "world");
    other.set(&rec, 1);
    assert_eq!(my_str.get(&rec).unwrap(), "world");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Two-level chain: `more` is derived from `add`, which is derived from
/// `my_int`. Overrides at the bottom are preserved; a delete re-arms the
/// chain from the current values.
#[test]
fn two_level_chain_with_override_and_delete() {
    let add_runs = Arc::new(AtomicI32::new(0));
    let more_runs = Arc::new(AtomicI32::new(0));

    let mut b = ClassBuilder::<Rec>::new();
    let my_int = b.attr_lazy("my_int", thunk(|| 12i64));

    let my_int_dep = my_int.clone();
    let add_runs_clone = add_runs.clone();
    let add = b.derived("add", &[&my_int], move |rec: &Rec| {
        add_runs_clone.fetch_add(1, Ordering::SeqCst);
        Ok(rec.normal + my_int_dep.get(rec)?)
    });

    let add_dep = add.clone();
    let more_runs_clone = more_runs.clone();
    let more = b.derived("more", &[&add], move |rec: &Rec| {
        more_runs_clone.fetch_add(1, Ordering::SeqCst);
        Ok(add_dep.get(rec)? + 12)
    });

    let class = b.build().unwrap();
    let rec = Rec::new(13);

    // 13 + 12, computed once.
    assert_eq!(add.get(&rec), Ok(25));
    assert_eq!(add_runs.load(Ordering::SeqCst), 1);

    // Invalidate through my_int.
    my_int.set(&rec, 13);
    assert_eq!(add.get(&rec), Ok(26));
    assert_eq!(add_runs.load(Ordering::SeqCst), 2);

    // 26 + 12; reading `more` hits the cached `add`.
    assert_eq!(more.get(&rec), Ok(38));
    assert_eq!(more_runs.load(Ordering::SeqCst), 1);
    assert_eq!(add_runs.load(Ordering::SeqCst), 2);

    // Override the leaf, then write the middle of the chain. The leaf was
    // explicitly set, so the write must not discard it.
    more.set(&rec, 15);
    add.set(&rec, 1);
    assert_eq!(more.get(&rec), Ok(15));
    assert_eq!(more_runs.load(Ordering::SeqCst), 1);
    assert!(!class.is_autoset(&rec, "more"));

    // Deleting the leaf re-arms it; `add` is currently 1, so 1 + 12.
    more.delete(&rec).unwrap();
    assert_eq!(more.get(&rec), Ok(13));
    assert_eq!(more_runs.load(Ordering::SeqCst), 2);
}

/// Invalidation cascades down a chain of derived attributes: writing the
/// root clears every autoset descendant, and each recomputes on its next
/// read only.
#[test]
fn invalidation_cascades_through_derived_chain() {
    let mut b = ClassBuilder::<Rec>::new();
    let base = b.attr_default("base", 1i64);

    let base_dep = base.clone();
    let double = b.derived("double", &[&base], move |rec: &Rec| {
        Ok(base_dep.get(rec)? * 2)
    });

    let double_dep = double.clone();
    let quad = b.derived("quad", &[&double], move |rec: &Rec| {
        Ok(double_dep.get(rec)? * 2)
    });

    let _class = b.build().unwrap();
    let rec = Rec::new(0);

    assert_eq!(quad.get(&rec), Ok(4));
    assert!(double.is_set(&rec));

    base.set(&rec, 10);

    // Both derived slots were cleared, nothing recomputed yet.
    assert!(!double.is_set(&rec));
    assert!(!quad.is_set(&rec));

    assert_eq!(quad.get(&rec), Ok(40));
}

/// Diamond dependencies: the cascade reaches a dependent twice (directly and
/// through an intermediate) and must skip the second visit silently.
#[test]
fn diamond_cascade_is_best_effort() {
    let mut b = ClassBuilder::<Rec>::new();
    let base = b.attr_default("base", 2i64);

    let base_dep = base.clone();
    let double = b.derived("double", &[&base], move |rec: &Rec| {
        Ok(base_dep.get(rec)? * 2)
    });

    let base_dep2 = base.clone();
    let double_dep = double.clone();
    let sum = b.derived("sum", &[&base, &double], move |rec: &Rec| {
        Ok(base_dep2.get(rec)? + double_dep.get(rec)?)
    });

    let _class = b.build().unwrap();
    let rec = Rec::new(0);

    // 2 + 4.
    assert_eq!(sum.get(&rec), Ok(6));

    // Writing base visits both `double` and `sum`; `sum` is also reached
    // through `double`'s cascade and is already unset on the second visit.
    base.set(&rec, 3);
    assert!(!double.is_set(&rec));
    assert!(!sum.is_set(&rec));

    // 3 + 6.
    assert_eq!(sum.get(&rec), Ok(9));
}

/// A pending thunk written with `set_lazy` invalidates dependents at write
/// time and is forced on its own next read.
#[test]
fn lazy_write_invalidates_immediately() {
    let (my_int, x, _class, computes) = int_and_derived();
    let rec = Rec::new(13);

    assert_eq!(x.get(&rec), Ok(25));
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    my_int.set_lazy(&rec, thunk(|| 100i64));

    // The derived slot was cleared by the write itself.
    assert!(!x.is_set(&rec));
    assert_eq!(x.get(&rec), Ok(113));
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}

/// Each instance keeps independent slots, autoset marks, and overrides.
#[test]
fn instances_are_independent() {
    let (my_int, x, class, _computes) = int_and_derived();
    let first = Rec::new(13);
    let second = Rec::new(100);

    assert_eq!(x.get(&first), Ok(25));
    assert_eq!(x.get(&second), Ok(112));
    assert!(class.is_autoset(&first, "x"));
    assert!(class.is_autoset(&second, "x"));

    // Overriding one instance leaves the other derived.
    x.set(&first, 0);
    my_int.set(&first, 50);
    my_int.set(&second, 50);

    assert_eq!(x.get(&first), Ok(0));
    assert_eq!(x.get(&second), Ok(150));
}

/// Nested records: a derived attribute holds another reactive record, and a
/// parent's derived computation reads through to the child's derived value.
/// Changing the child invalidates the child's cache but not the parent's;
/// the parent is re-armed only by its own delete.
#[test]
fn nested_records_read_through() {
    struct Child {
        id: InstanceId,
        normal: i64,
    }

    impl Instance for Child {
        fn instance_id(&self) -> InstanceId {
            self.id
        }
    }

    let mut cb = ClassBuilder::<Child>::new();
    let child_int = cb.attr_default("my_int", 1000i64);
    let child_int_dep = child_int.clone();
    let child_add = cb.derived("add", &[&child_int], move |c: &Child| {
        Ok(c.normal + child_int_dep.get(c)?)
    });
    let _child_class = cb.build().unwrap();

    struct Parent {
        id: InstanceId,
        normal: i64,
    }

    impl Instance for Parent {
        fn instance_id(&self) -> InstanceId {
            self.id
        }
    }

    let mut pb = ClassBuilder::<Parent>::new();
    let my_dep = pb.attr::<Arc<Child>>("my_dep");
    let my_dep_read = my_dep.clone();
    let child_add_read = child_add.clone();
    let parent_add = pb.derived("add", &[&my_dep], move |p: &Parent| {
        let child = my_dep_read.get(p)?;
        Ok(p.normal + child_add_read.get(&child)?)
    });
    let _parent_class = pb.build().unwrap();

    let child = Arc::new(Child {
        id: InstanceId::new(),
        normal: 2,
    });
    let parent = Parent {
        id: InstanceId::new(),
        normal: 1,
    };
    my_dep.set(&parent, child.clone());

    // 1 + (2 + 1000).
    assert_eq!(parent_add.get(&parent), Ok(1003));

    // Changing the child's input invalidates the child's derived value, but
    // the parent's cache only tracks the parent's own dependencies.
    child_int.set(&child, 12);
    assert_eq!(child_add.get(&child), Ok(14));
    assert_eq!(parent_add.get(&parent), Ok(1003));

    parent_add.delete(&parent).unwrap();
    assert_eq!(parent_add.get(&parent), Ok(15));
}

/// A derived computation whose upstream is unset propagates `NotSet` to the
/// caller and stores nothing.
#[test]
fn derived_read_with_unset_upstream_fails() {
    use rattr_core::reactive::AttrError;

    let mut b = ClassBuilder::<Rec>::new();
    let base = b.attr::<i64>("base");
    let base_dep = base.clone();
    let double = b.derived("double", &[&base], move |rec: &Rec| {
        Ok(base_dep.get(rec)? * 2)
    });
    let class = b.build().unwrap();

    let rec = Rec::new(0);
    assert_eq!(double.get(&rec), Err(AttrError::NotSet { name: "base" }));
    assert!(!double.is_set(&rec));
    assert!(!class.is_autoset(&rec, "double"));

    base.set(&rec, 4);
    assert_eq!(double.get(&rec), Ok(8));
}
