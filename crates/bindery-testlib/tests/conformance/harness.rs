//! Shared helpers for the conformance suite

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

pub use bindery_engine::bindery_sdk::{
    BindError, ClassId, ObjectHandle, ValueBox, Variant, VariantMap,
};
pub use bindery_engine::{CallArgs, HandleState, HostCallable, IterControl, Runtime, RuntimeOptions};

static TRACING: OnceLock<()> = OnceLock::new();

/// Route engine logs to the test writer (filter with `RUST_LOG`)
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fresh runtime with the test library registered
pub fn runtime() -> Runtime {
    runtime_with(RuntimeOptions::default())
}

/// Fresh runtime with custom options and the test library registered
pub fn runtime_with(options: RuntimeOptions) -> Runtime {
    init_tracing();
    let mut rt = Runtime::with_options(options);
    bindery_testlib::register_testlib(&mut rt).expect("test library registers");
    rt
}

pub fn class(rt: &Runtime, name: &str) -> ClassId {
    rt.class_id(name).expect("class is registered")
}

pub fn new(rt: &mut Runtime, name: &str, args: Vec<Variant>) -> ObjectHandle {
    let id = class(rt, name);
    rt.construct(id, args).expect("construction succeeds")
}

pub fn call(rt: &mut Runtime, recv: &ObjectHandle, method: &str, args: Vec<Variant>) -> Variant {
    rt.call(recv, method, args)
        .unwrap_or_else(|e| panic!("{method} failed: {e}"))
}

pub fn call_err(rt: &mut Runtime, recv: &ObjectHandle, method: &str, args: Vec<Variant>) -> BindError {
    match rt.call(recv, method, args) {
        Ok(v) => panic!("{method} unexpectedly returned {v:?}"),
        Err(e) => e,
    }
}

pub fn call_static(rt: &mut Runtime, class_name: &str, method: &str, args: Vec<Variant>) -> Variant {
    let id = class(rt, class_name);
    rt.call_static(id, method, args)
        .unwrap_or_else(|e| panic!("{class_name}.{method} failed: {e}"))
}

pub fn none() -> Vec<Variant> {
    Vec::new()
}

pub fn int(v: &Variant) -> i64 {
    v.as_i64().unwrap_or_else(|| panic!("expected an integer, got {v:?}"))
}

pub fn text(v: &Variant) -> String {
    v.as_str()
        .unwrap_or_else(|| panic!("expected a string, got {v:?}"))
        .to_string()
}

pub fn handle(v: Variant) -> ObjectHandle {
    match v {
        Variant::Object(h) => h,
        other => panic!("expected an object, got {other:?}"),
    }
}

pub fn obj(h: &ObjectHandle) -> Variant {
    Variant::Object(h.clone())
}
