//! `A` and `AChild`: identity-preserving objects
//!
//! `A` carries the plain attribute `a1`, a boolean attribute, a virtual
//! method pair (`vfunc` and its native caller `call_vfunc`), a protected
//! method reachable from overrides of `reveal`, the enumerable `a_each`, and
//! the event `a_changed` fired by the `a1` setter.

use std::cell::Cell;
use std::ops::Range;

use bindery_engine::bindery_sdk::{BindResult, IntType, NativeObject, Variant};
use bindery_engine::{
    ClassBuilder, NativeCall, NativeIter, ParamSpec, ParamType, RefKind, Runtime, Signature,
};

use crate::enums;

thread_local! {
    static LIVE_ITERATORS: Cell<usize> = const { Cell::new(0) };
}

/// Native iterators of `a_each` not yet dropped on this thread
pub fn live_iterators() -> usize {
    LIVE_ITERATORS.with(Cell::get)
}

/// Native state of `A`
#[derive(Debug, Clone, PartialEq)]
pub struct A {
    /// Backs the `a1` attribute
    pub n: i32,
    /// Backs the `flag` attribute
    pub flag: bool,
    /// Backs `get_u16` / `set_u16`
    pub u: u16,
}

impl A {
    /// New state with the given `a1`
    pub fn new(n: i32) -> Self {
        A {
            n,
            flag: false,
            u: 0,
        }
    }
}

impl Default for A {
    fn default() -> Self {
        A::new(17)
    }
}

impl NativeObject for A {
    fn duplicate(&self) -> Option<Box<dyn NativeObject>> {
        Some(Box::new(self.clone()))
    }

    fn assign_from(&mut self, other: &dyn NativeObject) -> bool {
        other.downcast_ref::<A>().map(|a| *self = a.clone()).is_some()
    }

    fn equals(&self, other: &dyn NativeObject) -> Option<bool> {
        other.downcast_ref::<A>().map(|a| a.n == self.n)
    }
}

/// Native state of `AChild`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AChild {
    /// Inherited `A` state
    pub base: A,
}

impl NativeObject for AChild {
    fn duplicate(&self) -> Option<Box<dyn NativeObject>> {
        Some(Box::new(self.clone()))
    }
}

/// Native iterator of `a_each`, counted while alive
struct Steps {
    range: Range<i64>,
}

impl Steps {
    fn new(range: Range<i64>) -> Self {
        LIVE_ITERATORS.with(|c| c.set(c.get() + 1));
        Steps { range }
    }
}

impl Iterator for Steps {
    type Item = BindResult<Variant>;

    fn next(&mut self) -> Option<Self::Item> {
        self.range.next().map(|i| Ok(Variant::Int(i)))
    }
}

impl Drop for Steps {
    fn drop(&mut self) {
        LIVE_ITERATORS.with(|c| c.set(c.get().saturating_sub(1)));
    }
}

/// Whether the receiver carries `AChild` state (`AChild` or a host subclass)
fn holds_child(call: &mut NativeCall<'_>) -> BindResult<bool> {
    let class = call.receiver()?.class();
    let classes = call.runtime().classes();
    let child = classes.require("AChild")?;
    Ok(classes.is_subclass_of(class, child))
}

/// `A` state of an `A` or `AChild` receiver
fn state<'a>(call: &'a mut NativeCall<'_>) -> BindResult<&'a mut A> {
    if holds_child(call)? {
        return Ok(&mut call.this_mut::<AChild>()?.base);
    }
    call.this_mut::<A>()
}

fn state_ref<'a>(call: &'a mut NativeCall<'_>) -> BindResult<&'a A> {
    if holds_child(call)? {
        return Ok(&call.this::<AChild>()?.base);
    }
    call.this::<A>()
}

fn set_a1(call: &mut NativeCall<'_>, value: Variant) -> BindResult<()> {
    let n = value.as_i64().unwrap_or_default() as i32;
    state(call)?.n = n;
    let recv = call.receiver()?.clone();
    call.runtime()
        .trigger_event(&recv, "a_changed", vec![Variant::from(n)])
}

fn call_vfunc(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let recv = call.receiver()?.clone();
    let x = call.arg(0);
    call.runtime().call(&recv, "vfunc", vec![x])
}

fn reveal(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let recv = call.receiver()?.clone();
    call.runtime().call(&recv, "secret", Vec::<Variant>::new())
}

fn a_each(call: &mut NativeCall<'_>) -> BindResult<NativeIter> {
    let n = call.arg_as::<i64>(0)?;
    Ok(Box::new(Steps::new(0..n)))
}

pub(crate) fn register(rt: &mut Runtime) -> BindResult<()> {
    let enum_decl = enums::signed_enum();

    let class = ClassBuilder::new("A")
        .constant("VERSION", 2)
        .enum_decl(enum_decl.clone())
        .mixin(enums::flavors())
        .constructor(Signature::new(), |_| Ok(Box::new(A::default())))
        .constructor(
            Signature::new().with_param("n", ParamType::int()),
            |call| Ok(Box::new(A::new(call.arg_as(0)?))),
        )
        .static_method(
            "new_a",
            Signature::new()
                .with_param("n", ParamType::int())
                .returns(ParamType::object("A")),
            |call| {
                let n = call.arg_as::<i32>(0)?;
                let h = call.runtime().new_object("A", Box::new(A::new(n)))?;
                Ok(Variant::Object(h))
            },
        )
        .static_method(
            "instance_count",
            Signature::new().returns(ParamType::Int(IntType::U64)),
            |call| {
                let rt = call.runtime();
                let id = rt.class_id("A")?;
                Ok(Variant::from(rt.instance_count(id)))
            },
        )
        .static_method(
            "live_iterators",
            Signature::new().returns(ParamType::Int(IntType::U64)),
            |_| Ok(Variant::from(live_iterators())),
        )
        .attribute(
            "a1",
            ParamType::int(),
            |call| Ok(Variant::from(state_ref(call)?.n)),
            set_a1,
        )
        .attribute(
            "flag",
            ParamType::Bool,
            |call| Ok(Variant::Bool(state_ref(call)?.flag)),
            |call, v| {
                state(call)?.flag = v.as_bool().unwrap_or_default();
                Ok(())
            },
        )
        .method(
            "set_u16",
            Signature::new().with_param("v", ParamType::Int(IntType::U16)),
            |call| {
                let u = call.arg_as::<u16>(0)?;
                state(call)?.u = u;
                Ok(Variant::Nil)
            },
        )
        .method(
            "get_u16",
            Signature::new()
                .returns(ParamType::Int(IntType::U16))
                .as_const(),
            |call| Ok(Variant::from(state_ref(call)?.u)),
        )
        .method(
            "set_e",
            Signature::new().with_param("e", ParamType::Enum(enum_decl.clone())),
            |call| {
                let e = call.arg_as::<i32>(0)?;
                state(call)?.n = e;
                Ok(Variant::Nil)
            },
        )
        .method(
            "vfunc",
            Signature::new()
                .with_param("x", ParamType::int())
                .returns(ParamType::int())
                .as_virtual(),
            |call| Ok(Variant::Int(call.arg_as::<i64>(0)? + 1)),
        )
        .method(
            "call_vfunc",
            Signature::new()
                .with_param("x", ParamType::int())
                .returns(ParamType::int()),
            call_vfunc,
        )
        .method(
            "vstore",
            Signature::new()
                .with_param("p", ParamType::object("P"))
                .as_virtual(),
            |_| Ok(Variant::Nil),
        )
        .method(
            "vstore_ref",
            Signature::new()
                .with_param_kind("p", ParamType::object("P"), RefKind::Ref)
                .as_virtual(),
            |_| Ok(Variant::Nil),
        )
        .method(
            "secret",
            Signature::new()
                .returns(ParamType::int())
                .as_const()
                .as_protected(),
            |call| Ok(Variant::from(state_ref(call)?.n * 2)),
        )
        .method(
            "reveal",
            Signature::new().returns(ParamType::int()).as_virtual(),
            reveal,
        )
        .iterator(
            "a_each",
            Signature::new()
                .with_param("n", ParamType::int())
                .returns(ParamType::int())
                .as_const(),
            a_each,
        )
        .event("a_changed", vec![ParamSpec::new("value", ParamType::int())]);
    rt.register_class(class)?;

    let child = ClassBuilder::new("AChild")
        .base("A")
        .constructor(Signature::new(), |_| Ok(Box::new(AChild::default())))
        .method(
            "child_only",
            Signature::new().returns(ParamType::String).as_const(),
            |_| Ok(Variant::from("child")),
        );
    rt.register_class(child)?;
    Ok(())
}
