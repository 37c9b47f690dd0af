//! Identity, const views, copies and singleton slots

use bindery_testlib::tech::CURRENT;

use super::harness::*;

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_stored_pointer_returns_same_proxy() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    let a = new(&mut rt, "A", none());

    call(&mut rt, &b, "store_a", vec![obj(&a)]);
    let back = handle(call(&mut rt, &b, "stored_a", none()));
    assert!(back.same_proxy(&a));
    assert_eq!(back, a);
}

#[test]
fn test_stored_pointer_after_destroy() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    let a = new(&mut rt, "A", none());
    call(&mut rt, &b, "store_a", vec![obj(&a)]);
    rt.destroy(&a).unwrap();

    assert_eq!(call(&mut rt, &b, "stored_a", none()), Variant::Nil);
    assert_eq!(
        call_err(&mut rt, &b, "stored_a_ref", none()).to_string(),
        "Null reference for return value in B::stored_a_ref"
    );
}

#[test]
fn test_stored_pointer_survives_host_drop_until_reclaim() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    let a = new(&mut rt, "A", vec![4.into()]);
    call(&mut rt, &b, "store_a", vec![obj(&a)]);
    drop(a);

    let back = handle(call(&mut rt, &b, "stored_a", none()));
    assert_eq!(int(&call(&mut rt, &back, "a1", none())), 4);
    drop(back);
    rt.reclaim();
    assert_eq!(call(&mut rt, &b, "stored_a", none()), Variant::Nil);
}

// ============================================================================
// Const Views
// ============================================================================

#[test]
fn test_const_view_rejects_mutation() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let view = a.as_const();

    assert_eq!(int(&call(&mut rt, &view, "a1", none())), 17);
    assert_eq!(
        call_err(&mut rt, &view, "a1=", vec![1.into()]).to_string(),
        "Cannot call non-const method A::a1= through a const reference"
    );
    assert!(!a.is_const());
    call(&mut rt, &a, "a1=", vec![1.into()]);
    assert_eq!(int(&call(&mut rt, &view, "a1", none())), 1);
}

#[test]
fn test_const_argument_is_read_only_inside_native() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    let a = new(&mut rt, "A", none());

    let err = call_err(&mut rt, &b, "mutate_const", vec![obj(&a)]);
    assert!(matches!(err, BindError::ConstViolation { .. }), "{err}");
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 17);
}

#[test]
fn test_const_object_to_mutable_reference() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    let a = new(&mut rt, "A", none());
    let err = call_err(&mut rt, &b, "take_a", vec![obj(&a.as_const())]);
    assert_eq!(
        err.to_string(),
        "Cannot call non-const method B::take_a through a const reference"
    );
}

#[test]
fn test_const_return_becomes_mutable_again() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    let a = new(&mut rt, "A", none());
    call(&mut rt, &b, "store_a", vec![obj(&a)]);
    drop(a);

    let c = handle(call(&mut rt, &b, "stored_a_const", none()));
    assert!(c.is_const());
    assert!(matches!(
        rt.call(&c, "a1=", vec![1.into()]),
        Err(BindError::ConstViolation { .. })
    ));

    let m = handle(call(&mut rt, &b, "stored_a", none()));
    assert!(m.same_proxy(&c));
    assert!(!m.is_const());
    assert!(!c.is_const());
    call(&mut rt, &c, "a1=", vec![1.into()]);
    assert_eq!(int(&call(&mut rt, &m, "a1", none())), 1);
}

#[test]
fn test_const_return_keeps_mutable_holder_mutable() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    let a = new(&mut rt, "A", none());
    call(&mut rt, &b, "store_a", vec![obj(&a)]);

    let c = handle(call(&mut rt, &b, "stored_a_const", none()));
    assert!(c.is_const());
    assert!(!a.is_const());
    assert!(c.same_object(&a));
    call(&mut rt, &a, "a1=", vec![2.into()]);
    assert_eq!(int(&call(&mut rt, &c, "a1", none())), 2);
}

// ============================================================================
// Copies and Equality
// ============================================================================

#[test]
fn test_dup_assign_equals() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", vec![3.into()]);
    let copy = rt.dup(&a).unwrap();

    assert!(!copy.same_object(&a));
    assert!(rt.equals(&a, &copy).unwrap());
    call(&mut rt, &copy, "a1=", vec![9.into()]);
    assert!(!rt.equals(&a, &copy).unwrap());
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 3);

    rt.assign(&a, &copy).unwrap();
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 9);
    assert!(rt.equals(&a, &copy).unwrap());
}

#[test]
fn test_assign_into_const_view_fails() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let other = new(&mut rt, "A", vec![1.into()]);
    assert!(matches!(
        rt.assign(&a.as_const(), &other),
        Err(BindError::ConstViolation { .. })
    ));
}

#[test]
fn test_uncopyable_class() {
    let mut rt = runtime();
    let b = new(&mut rt, "B", none());
    assert_eq!(rt.dup(&b).unwrap_err().to_string(), "Class B cannot be copied");

    let other = new(&mut rt, "B", none());
    assert!(!rt.equals(&b, &other).unwrap());
    assert!(rt.equals(&b, &b.clone()).unwrap());
}

#[test]
fn test_native_state_access() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", vec![6.into()]);
    assert_eq!(rt.native::<bindery_testlib::a::A>(&a).unwrap().n, 6);
    rt.native_mut::<bindery_testlib::a::A>(&a).unwrap().n = 8;
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 8);
    assert!(rt.native::<bindery_testlib::point::Point>(&a).is_err());
}

// ============================================================================
// Singleton Slots
// ============================================================================

#[test]
fn test_singleton_install_and_evict() {
    let mut rt = runtime();
    let tech = class(&rt, "Tech");

    let first = new(&mut rt, "Tech", vec!["one".into()]);
    call_static(&mut rt, "Tech", "set_current", vec![obj(&first)]);
    assert_eq!(rt.handle_state(&first), HandleState::Unmanaged);
    let current = handle(call_static(&mut rt, "Tech", "current", none()));
    assert!(current.same_object(&first));

    // re-installing the occupant is a no-op
    call_static(&mut rt, "Tech", "set_current", vec![obj(&first)]);
    assert!(!rt.is_destroyed(&first));

    let second = new(&mut rt, "Tech", vec!["two".into()]);
    call_static(&mut rt, "Tech", "set_current", vec![obj(&second)]);
    assert!(rt.is_destroyed(&first));
    let current = rt.singleton(tech, CURRENT).expect("slot is occupied");
    assert_eq!(text(&call(&mut rt, &current, "name", none())), "two");

    call_static(&mut rt, "Tech", "set_current", vec![Variant::Nil]);
    assert!(rt.is_destroyed(&second));
    assert_eq!(call_static(&mut rt, "Tech", "current", none()), Variant::Nil);
}

#[test]
fn test_singleton_owns_its_occupant() {
    let mut rt = runtime();
    let tech = class(&rt, "Tech");
    let t = new(&mut rt, "Tech", none());
    rt.install_singleton(tech, CURRENT, Some(&t)).unwrap();
    drop(t);

    assert_eq!(rt.reclaim(), 0);
    let current = rt.singleton(tech, CURRENT).expect("occupant survives reclaim");
    assert_eq!(text(&call(&mut rt, &current, "name", none())), "generic");
}

#[test]
fn test_singleton_destroyed_elsewhere() {
    let mut rt = runtime();
    let tech = class(&rt, "Tech");
    let t = new(&mut rt, "Tech", none());
    rt.install_singleton(tech, CURRENT, Some(&t)).unwrap();
    rt.destroy(&t).unwrap();

    assert!(rt.singleton(tech, CURRENT).is_none());
    let next = new(&mut rt, "Tech", none());
    rt.install_singleton(tech, CURRENT, Some(&next)).unwrap();
    assert!(!rt.is_destroyed(&next));
}
