//! Per-instance event multicast

use std::cell::RefCell;
use std::rc::Rc;

use super::harness::*;

type Log = Rc<RefCell<Vec<String>>>;

fn recorder(log: &Log, tag: &'static str) -> HostCallable {
    let log = Rc::clone(log);
    HostCallable::new(move |_, call| {
        log.borrow_mut().push(format!("{tag}{}", int(&call.arg(0))));
        Ok(Variant::Nil)
    })
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn test_setter_fires_event() {
    let mut rt = runtime();
    let log = Log::default();
    let a = new(&mut rt, "A", none());
    rt.event_add(&a, "a_changed", recorder(&log, "f")).unwrap();

    call(&mut rt, &a, "a1=", vec![5.into()]);
    assert_eq!(entries(&log), vec!["f5"]);
}

#[test]
fn test_handlers_are_deduplicated() {
    let mut rt = runtime();
    let log = Log::default();
    let a = new(&mut rt, "A", none());
    let f = recorder(&log, "f");

    rt.event_add(&a, "a_changed", f.clone()).unwrap();
    rt.event_add(&a, "a_changed", f.clone()).unwrap();
    assert_eq!(rt.event_handler_count(&a, "a_changed").unwrap(), 1);

    rt.event_remove(&a, "a_changed", &f).unwrap();
    assert_eq!(rt.event_handler_count(&a, "a_changed").unwrap(), 0);
    // removing an absent handler is not an error
    rt.event_remove(&a, "a_changed", &f).unwrap();
}

#[test]
fn test_handlers_run_in_connection_order() {
    let mut rt = runtime();
    let log = Log::default();
    let a = new(&mut rt, "A", none());
    rt.event_add(&a, "a_changed", recorder(&log, "f")).unwrap();
    rt.event_add(&a, "a_changed", recorder(&log, "g")).unwrap();

    rt.trigger_event(&a, "a_changed", vec![1.into()]).unwrap();
    assert_eq!(entries(&log), vec!["f1", "g1"]);
}

#[test]
fn test_set_and_clear_replace_handlers() {
    let mut rt = runtime();
    let log = Log::default();
    let a = new(&mut rt, "A", none());
    rt.event_add(&a, "a_changed", recorder(&log, "f")).unwrap();
    rt.event_add(&a, "a_changed", recorder(&log, "g")).unwrap();

    rt.event_set(&a, "a_changed", recorder(&log, "h")).unwrap();
    assert_eq!(rt.event_handler_count(&a, "a_changed").unwrap(), 1);
    call(&mut rt, &a, "a1=", vec![2.into()]);
    assert_eq!(entries(&log), vec!["h2"]);

    rt.event_clear(&a, "a_changed").unwrap();
    call(&mut rt, &a, "a1=", vec![3.into()]);
    assert_eq!(entries(&log), vec!["h2"]);
}

#[test]
fn test_failing_handler_aborts_dispatch() {
    let mut rt = runtime();
    let log = Log::default();
    let a = new(&mut rt, "A", none());
    let failing = HostCallable::new(|_, _| Err(BindError::host("handler failed")));
    rt.event_add(&a, "a_changed", failing).unwrap();
    rt.event_add(&a, "a_changed", recorder(&log, "g")).unwrap();

    let err = call_err(&mut rt, &a, "a1=", vec![4.into()]);
    assert_eq!(err, BindError::host("handler failed"));
    assert!(entries(&log).is_empty());
    // the setter ran before the event fired
    assert_eq!(int(&call(&mut rt, &a, "a1", none())), 4);
}

#[test]
fn test_dispatch_uses_a_snapshot() {
    let mut rt = runtime();
    let log = Log::default();
    let a = new(&mut rt, "A", none());
    let g = recorder(&log, "g");

    let target = g.clone();
    let remover = HostCallable::new(move |rt, call| {
        let recv = call.receiver()?.clone();
        rt.event_remove(&recv, "a_changed", &target)?;
        Ok(Variant::Nil)
    });
    rt.event_add(&a, "a_changed", remover).unwrap();
    rt.event_add(&a, "a_changed", g).unwrap();

    rt.trigger_event(&a, "a_changed", vec![1.into()]).unwrap();
    rt.trigger_event(&a, "a_changed", vec![2.into()]).unwrap();
    assert_eq!(entries(&log), vec!["g1"]);
}

#[test]
fn test_slots_are_per_instance() {
    let mut rt = runtime();
    let log = Log::default();
    let a = new(&mut rt, "A", none());
    let other = new(&mut rt, "A", none());
    rt.event_add(&a, "a_changed", recorder(&log, "f")).unwrap();

    assert_eq!(rt.event_handler_count(&other, "a_changed").unwrap(), 0);
    call(&mut rt, &other, "a1=", vec![9.into()]);
    assert!(entries(&log).is_empty());
}

#[test]
fn test_unknown_event() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    let err = rt
        .event_add(&a, "nope", HostCallable::new(|_, _| Ok(Variant::Nil)))
        .unwrap_err();
    assert_eq!(err.to_string(), "Undefined event nope for class A");
}

#[test]
fn test_event_arguments_are_checked() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());

    let err = rt
        .trigger_event(&a, "a_changed", vec!["x".into()])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot convert string to int for argument #1 in A::a_changed"
    );
    let err = rt.trigger_event(&a, "a_changed", none()).unwrap_err();
    assert_eq!(err.to_string(), "Event A::a_changed expects 1 arguments, got 0");
}

#[test]
fn test_events_on_destroyed_instance() {
    let mut rt = runtime();
    let a = new(&mut rt, "A", none());
    rt.destroy(&a).unwrap();
    assert!(matches!(
        rt.event_handler_count(&a, "a_changed"),
        Err(BindError::UseAfterFree { .. })
    ));
}

#[test]
fn test_subclass_inherits_events() {
    let mut rt = runtime();
    let log = Log::default();
    let child = new(&mut rt, "AChild", none());
    rt.event_add(&child, "a_changed", recorder(&log, "c")).unwrap();
    call(&mut rt, &child, "a1=", vec![6.into()]);
    assert_eq!(entries(&log), vec!["c6"]);
}
