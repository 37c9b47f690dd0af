//! Construction, destruction, generations, reclaim and lazy state

use bindery_engine::bindery_sdk::NativeObject;
use bindery_engine::{ClassBuilder, ParamType, Signature};

use super::harness::*;

/// State of the failing classes registered below
struct Brittle;

impl NativeObject for Brittle {}

fn register_brittle(rt: &mut Runtime) {
    let eager = ClassBuilder::new("Brittle").constructor(
        Signature::new().with_param("n", ParamType::int()),
        |call| {
            if call.arg_as::<i64>(0)? < 0 {
                return Err(BindError::native("negative size"));
            }
            Ok(Box::new(Brittle))
        },
    );
    rt.register_class(eager).unwrap();

    let deferred = ClassBuilder::new("BrittleLazy")
        .lazy(|_| Err(BindError::native("no backing store")))
        .method("touch", Signature::new(), |call| {
            call.this::<Brittle>()?;
            Ok(Variant::Nil)
        });
    rt.register_class(deferred).unwrap();
}

// ============================================================================
// Construction and Destruction
// ============================================================================

#[test]
fn test_new_count_destroy() {
    let mut rt = runtime();
    let a_id = class(&rt, "A");

    let a = handle(call_static(&mut rt, "A", "new_a", vec![5.into()]));
    assert_eq!(rt.instance_count(a_id), 1);
    assert_eq!(int(&call_static(&mut rt, "A", "instance_count", none())), 1);
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 5);

    rt.destroy(&a).unwrap();
    assert_eq!(rt.instance_count(a_id), 0);
    assert!(rt.is_destroyed(&a));

    let err = call_err(&mut rt, &a, "a1", none());
    assert_eq!(
        err.to_string(),
        "Object of class A has been destroyed already (in a1)"
    );
    assert_eq!(
        rt.destroy(&a).unwrap_err().to_string(),
        "Object of class A has been destroyed already (in destroy)"
    );
}

#[test]
fn test_default_constructor_state() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 17);
    assert_eq!(call(&mut rt, &a, "flag", none()), Variant::Bool(false));

    let p = new(&mut rt, "P", vec![1.5.into()]);
    assert_eq!(text(&call(&mut rt, &p, "to_s", none())), "1.5,0");
}

#[test]
fn test_unknown_method_and_class() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    assert_eq!(
        call_err(&mut rt, &a, "nope", none()).to_string(),
        "Undefined method nope for class A"
    );
    assert!(matches!(rt.class_id("Nope"), Err(BindError::NoSuchClass(_))));
}

#[test]
fn test_generation_detects_slot_reuse() {
    let mut rt = runtime();
    let a_id = class(&rt, "A");

    let first = rt.construct(a_id, none()).unwrap();
    assert_eq!(rt.inspect(&first), "#<A:0.0>");
    rt.destroy(&first).unwrap();
    assert_eq!(rt.inspect(&first), "#<A:0.0 (destroyed)>");

    let second = rt.construct(a_id, none()).unwrap();
    assert_eq!(second.slot(), first.slot());
    assert_eq!(rt.inspect(&second), "#<A:0.1>");
    assert!(rt.is_destroyed(&first));
    assert!(!rt.is_destroyed(&second));
    assert!(!first.same_object(&second));
    assert!(matches!(
        rt.call(&first, "a1", none()),
        Err(BindError::UseAfterFree { .. })
    ));
    assert_eq!(int(&call(&mut rt, &second, "a1", none())), 17);
}

#[test]
fn test_destroyed_argument_is_rejected() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let b = new(&mut rt, "B", none());
    rt.destroy(&a).unwrap();

    let err = call_err(&mut rt, &b, "take_a", vec![obj(&a)]);
    assert_eq!(
        err.to_string(),
        "Object of class A has been destroyed already (in take_a)"
    );
}

#[test]
fn test_native_destroy_through_pointer() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let b = new(&mut rt, "B", none());

    call(&mut rt, &b, "destroy_a", vec![obj(&a)]);
    assert!(rt.is_destroyed(&a));
    assert_eq!(rt.handle_state(&a), HandleState::Detached);
    // nil is a valid pointer
    call(&mut rt, &b, "destroy_a", vec![Variant::Nil]);
}

// ============================================================================
// Handle States
// ============================================================================

#[test]
fn test_handle_states() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());

    assert_eq!(rt.handle_state(&a), HandleState::Managed);
    assert_eq!(rt.handle_state(&a.as_const()), HandleState::ConstRef);
    rt.unmanage(&a).unwrap();
    assert_eq!(rt.handle_state(&a), HandleState::Unmanaged);
    rt.manage(&a).unwrap();
    assert_eq!(rt.handle_state(&a), HandleState::Managed);
    rt.destroy(&a).unwrap();
    assert_eq!(rt.handle_state(&a), HandleState::Detached);
    assert_eq!(
        rt.manage(&a).unwrap_err().to_string(),
        "Object of class A has been destroyed already (in _manage)"
    );
}

#[test]
fn test_inspect_marks_const_views() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    assert_eq!(rt.inspect(&a.as_const()), "#<const A:0.0>");
}

// ============================================================================
// Reclaim
// ============================================================================

#[test]
fn test_reclaim_collects_dropped_managed() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let kept = new(&mut rt, "A", none());
    let r = a.instance_ref();
    drop(a);

    assert_eq!(rt.live_count(), 2);
    assert_eq!(rt.reclaim(), 1);
    assert_eq!(rt.live_count(), 1);
    assert!(rt.upgrade(r).is_none());
    assert!(!rt.is_destroyed(&kept));
}

#[test]
fn test_aliases_keep_instance_alive() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let view = a.as_const();
    drop(a);

    assert_eq!(rt.reclaim(), 0);
    assert_eq!(int(&call(&mut rt, &view, "a1", none())), 17);
    drop(view);
    assert_eq!(rt.reclaim(), 1);
}

#[test]
fn test_unmanaged_survives_reclaim() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    rt.unmanage(&a).unwrap();
    let r = a.instance_ref();
    drop(a);

    assert_eq!(rt.reclaim(), 0);
    let again = rt.upgrade(r).expect("unmanaged instance is still alive");
    assert_eq!(rt.handle_state(&again), HandleState::Unmanaged);

    rt.manage(&again).unwrap();
    drop(again);
    assert_eq!(rt.reclaim(), 1);
    assert_eq!(rt.live_count(), 0);
}

#[test]
fn test_auto_reclaim_bounds_live_instances() {
    let mut rt = runtime_with(RuntimeOptions::new().with_auto_reclaim(4));
    let a_id = class(&rt, "A");
    for _ in 0..20 {
        let h = rt.construct(a_id, none()).unwrap();
        drop(h);
        assert!(rt.instance_count(a_id) <= 4);
    }
}

#[test]
fn test_auto_reclaim_disabled_by_default() {
    let mut rt = runtime();
    let a_id = class(&rt, "A");
    for _ in 0..10 {
        rt.construct(a_id, none()).unwrap();
    }
    assert_eq!(rt.instance_count(a_id), 10);
    assert_eq!(rt.reclaim(), 10);
}

// ============================================================================
// Lazy Construction
// ============================================================================

#[test]
fn test_lazy_default_construction_is_deferred() {
    let mut rt = runtime();
    let lazy = class(&rt, "Lazy");

    let l = rt.construct(lazy, none()).unwrap();
    assert_eq!(rt.instance_count(lazy), 0);
    assert_eq!(rt.live_count(), 1);

    assert_eq!(int(&call(&mut rt, &l, "value", none())), 5);
    assert_eq!(rt.instance_count(lazy), 1);
}

#[test]
fn test_failing_constructor_registers_nothing() {
    let mut rt = runtime();
    register_brittle(&mut rt);
    let brittle = class(&rt, "Brittle");
    let live = rt.live_count();

    let err = rt.construct(brittle, vec![Variant::Int(-1)]).unwrap_err();
    assert_eq!(err, BindError::native("negative size"));
    assert_eq!(rt.instance_count(brittle), 0);
    assert_eq!(rt.live_count(), live);

    let ok = rt.construct(brittle, vec![Variant::Int(1)]).unwrap();
    assert_eq!(rt.instance_count(brittle), 1);
    assert_eq!(rt.handle_state(&ok), HandleState::Managed);
}

#[test]
fn test_failing_deferred_constructor_leaves_handle_unmaterialized() {
    let mut rt = runtime();
    register_brittle(&mut rt);
    let lazy = class(&rt, "BrittleLazy");

    let l = rt.construct(lazy, none()).unwrap();
    let live = rt.live_count();
    assert_eq!(rt.instance_count(lazy), 0);

    let err = call_err(&mut rt, &l, "touch", none());
    assert_eq!(err.to_string(), "no backing store");
    assert_eq!(rt.instance_count(lazy), 0);
    assert_eq!(rt.live_count(), live);

    // Still deferred: the next use retries and fails the same way.
    assert_eq!(call_err(&mut rt, &l, "touch", none()), err);
}

#[test]
fn test_lazy_with_arguments_is_immediate() {
    let mut rt = runtime();
    let lazy = class(&rt, "Lazy");
    let l = rt.construct(lazy, vec![Variant::Int(7)]).unwrap();
    assert_eq!(rt.instance_count(lazy), 1);
    assert_eq!(int(&call(&mut rt, &l, "value", none())), 7);
}

#[test]
fn test_subclass_counts() {
    let mut rt = runtime();
    let a_id = class(&rt, "A");
    let child = class(&rt, "AChild");
    let _a = new(&mut rt, "A", none());
    let _c = new(&mut rt, "AChild", none());

    assert_eq!(rt.instance_count(a_id), 1);
    assert_eq!(rt.instance_count(child), 1);
    assert_eq!(rt.instance_count_with_subclasses(a_id), 2);
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_options_from_toml_drive_reclaim() {
    let options = RuntimeOptions::from_toml_str("auto_reclaim_threshold = 2\ntrace_calls = true\n")
        .expect("options parse");
    assert!(options.trace_calls);

    let mut rt = runtime_with(options);
    let a_id = class(&rt, "A");
    for _ in 0..6 {
        rt.construct(a_id, none()).unwrap();
    }
    assert!(rt.instance_count(a_id) <= 2);
}

#[test]
fn test_unknown_option_is_rejected() {
    assert!(RuntimeOptions::from_toml_str("reclaim_everything = true").is_err());
}
