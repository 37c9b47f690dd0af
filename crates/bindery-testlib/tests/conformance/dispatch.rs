//! Host overrides, protected access, iteration and the depth limit

use std::cell::RefCell;
use std::rc::Rc;

use bindery_testlib::a::live_iterators;

use super::harness::*;

fn times_ten() -> HostCallable {
    HostCallable::new(|_, call| Ok(Variant::Int(call.arg_as::<i64>(0)? * 10)))
}

// ============================================================================
// Overrides
// ============================================================================

#[test]
fn test_override_reached_from_native_caller() {
    let mut rt = runtime();
    let sub = rt.define_subclass("HostA", "A", [("vfunc", times_ten())]).unwrap();
    let h = rt.construct(sub, vec![3.into()]).unwrap();
    let plain = new(&mut rt, "A", none());

    assert_eq!(int(&call(&mut rt, &h, "vfunc", vec![4.into()])), 40);
    assert_eq!(int(&call(&mut rt, &h, "call_vfunc", vec![4.into()])), 40);
    assert_eq!(int(&call(&mut rt, &plain, "call_vfunc", vec![4.into()])), 5);
    assert_eq!(int(&call(&mut rt, &h, "a1", none())), 3);
}

#[test]
fn test_call_super_bypasses_override() {
    let mut rt = runtime();
    let super_plus = HostCallable::new(|rt, call| {
        let recv = call.receiver()?.clone();
        let base = rt.call_super(&recv, "vfunc", vec![call.arg(0)])?;
        Ok(Variant::Int(int(&base) + 100))
    });
    let sub = rt.define_subclass("HostA", "A", [("vfunc", super_plus)]).unwrap();
    let h = rt.construct(sub, none()).unwrap();

    assert_eq!(int(&rt.call_super(&h, "vfunc", vec![4.into()]).unwrap()), 5);
    assert_eq!(int(&call(&mut rt, &h, "call_vfunc", vec![4.into()])), 105);
}

#[test]
fn test_overrides_are_inherited() {
    let mut rt = runtime();
    rt.define_subclass("HostA", "A", [("vfunc", times_ten())]).unwrap();
    let grand = rt
        .define_subclass("HostA2", "HostA", Vec::<(String, HostCallable)>::new())
        .unwrap();
    let h = rt.construct(grand, none()).unwrap();
    assert_eq!(int(&call(&mut rt, &h, "call_vfunc", vec![2.into()])), 20);

    let a_id = class(&rt, "A");
    assert_eq!(rt.instance_count(grand), 1);
    assert_eq!(rt.instance_count_with_subclasses(a_id), 1);
}

#[test]
fn test_host_subclass_of_native_subclass_keeps_base_state() {
    let mut rt = runtime();
    let sub = rt.define_subclass("ChildSub", "AChild", [("vfunc", times_ten())]).unwrap();
    let h = rt.construct(sub, none()).unwrap();

    assert_eq!(int(&call(&mut rt, &h, "a1", none())), 17);
    call(&mut rt, &h, "a1=", vec![5.into()]);
    assert_eq!(int(&call(&mut rt, &h, "a1", none())), 5);
    call(&mut rt, &h, "flag=", vec![true.into()]);
    assert_eq!(call(&mut rt, &h, "flag", none()), Variant::Bool(true));
    assert_eq!(text(&call(&mut rt, &h, "child_only", none())), "child");
    assert_eq!(int(&call(&mut rt, &h, "call_vfunc", vec![2.into()])), 20);
}

#[test]
fn test_only_virtual_methods_can_be_overridden() {
    let mut rt = runtime();
    let err = rt
        .define_subclass("Bad", "A", [("a1", times_ten())])
        .unwrap_err();
    assert_eq!(err.to_string(), "Undefined method a1 for class A");
}

#[test]
fn test_override_error_propagates() {
    let mut rt = runtime();
    let failing = HostCallable::new(|_, _| Err(BindError::host("override failed")));
    let sub = rt.define_subclass("HostA", "A", [("vfunc", failing)]).unwrap();
    let h = rt.construct(sub, none()).unwrap();
    let err = call_err(&mut rt, &h, "call_vfunc", vec![1.into()]);
    assert_eq!(err, BindError::host("override failed"));
}

#[test]
fn test_override_result_is_converted() {
    let mut rt = runtime();
    let wrong = HostCallable::new(|_, _| Ok(Variant::from("not a number")));
    let sub = rt.define_subclass("HostA", "A", [("vfunc", wrong)]).unwrap();
    let h = rt.construct(sub, none()).unwrap();
    assert!(rt.call(&h, "vfunc", vec![1.into()]).is_err());
}

#[test]
fn test_override_gets_value_copies_and_reference_aliases() {
    let mut rt = runtime();
    let seen: Rc<RefCell<Vec<ObjectHandle>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let keep = HostCallable::new(move |_, call| {
        sink.borrow_mut().push(call.arg_as::<ObjectHandle>(0)?);
        Ok(Variant::Nil)
    });
    let sub = rt
        .define_subclass("Keeper", "A", [("vstore", keep.clone()), ("vstore_ref", keep)])
        .unwrap();
    let k = rt.construct(sub, none()).unwrap();
    let p = new(&mut rt, "P", vec![1.0.into(), 2.0.into()]);

    call(&mut rt, &k, "vstore", vec![obj(&p)]);
    call(&mut rt, &k, "vstore_ref", vec![obj(&p)]);
    call(&mut rt, &p, "x=", vec![9.0.into()]);

    let stored = seen.borrow().clone();
    assert_eq!(stored.len(), 2);
    assert!(!stored[0].same_object(&p));
    assert!(stored[1].same_object(&p));
    assert_eq!(call(&mut rt, &stored[0], "x", none()), Variant::Float(1.0));
    assert_eq!(call(&mut rt, &stored[1], "x", none()), Variant::Float(9.0));
}

// ============================================================================
// Protected Methods
// ============================================================================

#[test]
fn test_protected_rejected_from_host() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    assert_eq!(
        call_err(&mut rt, &a, "secret", none()).to_string(),
        "Protected method A::secret can only be called from a subclass"
    );
    // native code may call it
    assert_eq!(int(&call(&mut rt, &a, "reveal", none())), 34);
}

#[test]
fn test_protected_allowed_from_own_override() {
    let mut rt = runtime();
    let reveal = HostCallable::new(|rt, call| {
        let recv = call.receiver()?.clone();
        let secret = rt.call(&recv, "secret", Vec::<Variant>::new())?;
        Ok(Variant::Int(int(&secret) + 1))
    });
    let sub = rt.define_subclass("HostA", "A", [("reveal", reveal)]).unwrap();
    let h = rt.construct(sub, vec![3.into()]).unwrap();
    assert_eq!(int(&call(&mut rt, &h, "reveal", none())), 7);
}

#[test]
fn test_protected_rejected_for_other_instance() {
    let mut rt = runtime();
    let other = new(&mut rt, "A", none());
    let target = other.clone();
    let reveal = HostCallable::new(move |rt, _| rt.call(&target, "secret", Vec::<Variant>::new()));
    let sub = rt.define_subclass("HostA", "A", [("reveal", reveal)]).unwrap();
    let h = rt.construct(sub, none()).unwrap();
    assert!(matches!(
        rt.call(&h, "reveal", none()),
        Err(BindError::ProtectedAccess { .. })
    ));
}

// ============================================================================
// Iteration
// ============================================================================

#[test]
fn test_each_visits_every_element() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let mut seen = Vec::new();
    let out = rt
        .each(&a, "a_each", vec![3.into()], |_, item| {
            seen.push(int(&item));
            Ok(IterControl::Continue)
        })
        .unwrap();

    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(out, obj(&a));
    assert_eq!(live_iterators(), 0);
}

#[test]
fn test_enumerable_called_without_block_collects() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let out = call(&mut rt, &a, "a_each", vec![3.into()]);
    assert_eq!(
        out,
        Variant::List(vec![Variant::Int(0), Variant::Int(1), Variant::Int(2)])
    );
    assert_eq!(live_iterators(), 0);
}

#[test]
fn test_each_break_returns_value_and_drops_iterator() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let out = rt
        .each(&a, "a_each", vec![100.into()], |rt, item| {
            assert_eq!(live_iterators(), 1);
            // the runtime stays usable from inside the block
            let a1 = rt.call(&a, "a1", Vec::<Variant>::new())?;
            if int(&item) == 2 {
                return Ok(IterControl::Break(a1));
            }
            Ok(IterControl::Continue)
        })
        .unwrap();
    assert_eq!(int(&out), 17);
    assert_eq!(live_iterators(), 0);
}

#[test]
fn test_each_error_drops_iterator() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let err = rt
        .each(&a, "a_each", vec![100.into()], |_, item| {
            if int(&item) == 1 {
                return Err(BindError::host("block failed"));
            }
            Ok(IterControl::Continue)
        })
        .unwrap_err();
    assert_eq!(err, BindError::host("block failed"));
    assert_eq!(live_iterators(), 0);
}

#[test]
fn test_block_cannot_call_protected() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let err = rt
        .each(&a, "a_each", vec![1.into()], |rt, _| {
            rt.call(&a, "secret", Vec::<Variant>::new())?;
            Ok(IterControl::Continue)
        })
        .unwrap_err();
    assert!(matches!(err, BindError::ProtectedAccess { .. }), "{err}");
    assert_eq!(live_iterators(), 0);
}

#[test]
fn test_each_on_plain_method() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let err = rt
        .each(&a, "a1", none(), |_, _| Ok(IterControl::Continue))
        .unwrap_err();
    assert_eq!(err.to_string(), "A::a1 is not enumerable");
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[test]
fn test_dispatch_depth_is_bounded() {
    let mut rt = runtime_with(RuntimeOptions::new().with_max_dispatch_depth(3));
    let recurse = HostCallable::new(|rt, call| {
        let recv = call.receiver()?.clone();
        rt.call(&recv, "call_vfunc", vec![call.arg(0)])
    });
    let sub = rt.define_subclass("Loop", "A", [("vfunc", recurse)]).unwrap();
    let h = rt.construct(sub, none()).unwrap();

    let err = call_err(&mut rt, &h, "call_vfunc", vec![1.into()]);
    assert_eq!(err.to_string(), "dispatch depth limit exceeded (3)");

    // the runtime is usable again once the stack unwound
    let plain = new(&mut rt, "A", none());
    assert_eq!(int(&call(&mut rt, &plain, "call_vfunc", vec![1.into()])), 2);
}
