//! `B`: the marshaling lab
//!
//! Each entry point takes its argument through one specific reference kind
//! so the caller-observable effects of `T`, `T &`, `const T &`, `T *` and
//! `const T *` can be compared side by side.

use bindery_engine::bindery_sdk::{
    BindError, BindResult, Bytes, FlagSet, InstanceRef, IntType, NativeObject, ObjectHandle, Variant,
    VariantMap,
};
use bindery_engine::{ClassBuilder, NativeCall, ParamType, RefKind, Runtime, Signature};

/// Native state of `B`
#[derive(Debug, Clone, Default)]
pub struct B {
    /// Non-owning pointer set by `store_a`
    pub stored: Option<InstanceRef>,
}

impl NativeObject for B {}

fn inc_ref(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let v = call.arg_as::<i64>(0)?;
    call.set_arg(0, v + 1);
    Ok(Variant::Nil)
}

fn inc_ptr(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    match call.arg_as::<Option<i64>>(0)? {
        Some(v) => {
            call.set_arg(0, v + 1);
            Ok(Variant::Bool(true))
        }
        None => Ok(Variant::Bool(false)),
    }
}

fn inc_local(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let v = call.arg_as::<i64>(0)? + 1;
    call.set_arg(0, v);
    Ok(Variant::Int(v))
}

fn push_99(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let mut items = match call.arg_as::<Option<Vec<Variant>>>(0)? {
        Some(items) => items,
        None => return Ok(Variant::from(0usize)),
    };
    items.push(Variant::Int(99));
    let len = items.len();
    call.set_arg(0, Variant::List(items));
    Ok(Variant::from(len))
}

fn map_ref(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let mut map = call.arg_as::<VariantMap>(0)?;
    map.insert(Variant::from("k"), Variant::Int(1));
    call.set_arg(0, map);
    Ok(Variant::Nil)
}

fn a1_of(call: &mut NativeCall<'_>, a: &ObjectHandle) -> BindResult<Variant> {
    call.runtime().call(a, "a1", Vec::<Variant>::new())
}

fn take_a_value(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let a = call.arg_as::<ObjectHandle>(0)?;
    let before = a1_of(call, &a)?;
    call.runtime().call(&a, "a1=", vec![Variant::Int(-1)])?;
    Ok(before)
}

fn store_a(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let a = call.arg_as::<Option<ObjectHandle>>(0)?;
    call.this_mut::<B>()?.stored = a.map(|h| h.instance_ref());
    Ok(Variant::Nil)
}

fn stored_a(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let stored = call.this::<B>()?.stored;
    Ok(stored
        .and_then(|r| call.runtime().upgrade(r))
        .map(Variant::Object)
        .unwrap_or_default())
}

fn flags_of(value: &Variant) -> BindResult<FlagSet> {
    match value {
        Variant::Flags(f) => Ok(f.clone()),
        other => Err(BindError::UnexpectedValue {
            expected: "flags".to_string(),
            actual: other.type_name(),
        }),
    }
}

pub(crate) fn register(rt: &mut Runtime) -> BindResult<()> {
    let a_class = rt.class_id("A")?;
    let enum_decl = rt.enum_decl(a_class, "Enum")?;
    let uenum_decl = rt.enum_decl(a_class, "UEnum")?;
    let int_list = || ParamType::list(ParamType::int());

    let class = ClassBuilder::new("B")
        .constructor(Signature::new(), |_| Ok(Box::new(B::default())))
        // Primitive reference kinds
        .method(
            "inc_ref",
            Signature::new().with_param_kind("v", ParamType::int(), RefKind::Ref),
            inc_ref,
        )
        .method(
            "inc_ptr",
            Signature::new()
                .with_param_kind("v", ParamType::int(), RefKind::Ptr)
                .returns(ParamType::Bool),
            inc_ptr,
        )
        .method(
            "inc_value",
            Signature::new()
                .with_param("v", ParamType::int())
                .returns(ParamType::int()),
            inc_local,
        )
        .method(
            "inc_const",
            Signature::new()
                .with_param_kind("v", ParamType::int(), RefKind::ConstRef)
                .returns(ParamType::int()),
            inc_local,
        )
        // Container out-parameters
        .method(
            "push_ref",
            Signature::new()
                .with_param_kind("l", int_list(), RefKind::Ref)
                .returns(ParamType::int()),
            push_99,
        )
        .method(
            "push_ptr",
            Signature::new()
                .with_param_kind("l", int_list(), RefKind::Ptr)
                .returns(ParamType::int()),
            push_99,
        )
        .method(
            "push_value",
            Signature::new()
                .with_param("l", int_list())
                .returns(ParamType::int()),
            push_99,
        )
        .method(
            "push_const",
            Signature::new()
                .with_param_kind("l", int_list(), RefKind::ConstRef)
                .returns(ParamType::int()),
            push_99,
        )
        .method(
            "map_ref",
            Signature::new().with_param_kind(
                "m",
                ParamType::map(ParamType::String, ParamType::int()),
                RefKind::Ref,
            ),
            map_ref,
        )
        // Keyword arguments and overloads
        .method(
            "method",
            Signature::new()
                .with_param("a", ParamType::int())
                .with_param("s", ParamType::String)
                .with_param("d", ParamType::Double)
                .with_param("e", ParamType::int())
                .with_default(0)
                .returns(ParamType::String),
            |call| {
                Ok(Variant::from(format!(
                    "{}:{}:{}:{}",
                    call.arg_as::<i64>(0)?,
                    call.arg_as::<String>(1)?,
                    call.arg_as::<f64>(2)?,
                    call.arg_as::<i64>(3)?
                )))
            },
        )
        .method(
            "method",
            Signature::new()
                .with_param("s", ParamType::String)
                .returns(ParamType::String),
            |call| Ok(Variant::from(format!("s:{}", call.arg_as::<String>(0)?))),
        )
        .method(
            "kwargs",
            Signature::new()
                .with_param("a", ParamType::int())
                .with_param("b", ParamType::int())
                .with_param("c", ParamType::int())
                .with_param("d", ParamType::String)
                .with_default("x")
                .returns(ParamType::String),
            |call| {
                Ok(Variant::from(format!(
                    "{},{},{},{}",
                    call.arg_as::<i64>(0)?,
                    call.arg_as::<i64>(1)?,
                    call.arg_as::<i64>(2)?,
                    call.arg_as::<String>(3)?
                )))
            },
        )
        .method(
            "over",
            Signature::new()
                .with_param("x", ParamType::int())
                .returns(ParamType::String),
            |_| Ok(Variant::from("int")),
        )
        .method(
            "over",
            Signature::new()
                .with_param("x", ParamType::Double)
                .returns(ParamType::String),
            |_| Ok(Variant::from("double")),
        )
        .method(
            "over",
            Signature::new()
                .with_param("s", ParamType::String)
                .returns(ParamType::String),
            |_| Ok(Variant::from("string")),
        )
        .method(
            "over",
            Signature::new()
                .with_param_kind("a", ParamType::object("A"), RefKind::ConstRef)
                .returns(ParamType::String),
            |_| Ok(Variant::from("A")),
        )
        // Object reference kinds
        .method(
            "take_a",
            Signature::new()
                .with_param_kind("a", ParamType::object("A"), RefKind::Ref)
                .returns(ParamType::int()),
            |call| {
                let a = call.arg_as::<ObjectHandle>(0)?;
                a1_of(call, &a)
            },
        )
        .method(
            "take_a_ptr",
            Signature::new()
                .with_param_kind("a", ParamType::object("A"), RefKind::Ptr)
                .returns(ParamType::Bool),
            |call| Ok(Variant::Bool(!call.arg(0).is_nil())),
        )
        .method(
            "take_a_value",
            Signature::new()
                .with_param("a", ParamType::object("A"))
                .returns(ParamType::int()),
            take_a_value,
        )
        .method(
            "mutate_const",
            Signature::new().with_param_kind("a", ParamType::object("A"), RefKind::ConstRef),
            |call| {
                let a = call.arg_as::<ObjectHandle>(0)?;
                call.runtime().call(&a, "a1=", vec![Variant::Int(0)])
            },
        )
        .method(
            "destroy_a",
            Signature::new().with_param_kind("a", ParamType::object("A"), RefKind::Ptr),
            |call| {
                if let Some(a) = call.arg_as::<Option<ObjectHandle>>(0)? {
                    call.runtime().destroy(&a)?;
                }
                Ok(Variant::Nil)
            },
        )
        .method(
            "store_a",
            Signature::new().with_param_kind("a", ParamType::object("A"), RefKind::Ptr),
            store_a,
        )
        .method(
            "stored_a",
            Signature::new()
                .returns_kind(ParamType::object("A"), RefKind::Ptr)
                .as_const(),
            stored_a,
        )
        .method(
            "stored_a_const",
            Signature::new()
                .returns_kind(ParamType::object("A"), RefKind::ConstPtr)
                .as_const(),
            stored_a,
        )
        .method(
            "stored_a_ref",
            Signature::new()
                .returns_kind(ParamType::object("A"), RefKind::Ref)
                .as_const(),
            stored_a,
        )
        // Value class crossings
        .method(
            "shift",
            Signature::new()
                .with_param_kind("p", ParamType::object("P"), RefKind::Ref)
                .with_param("d", ParamType::Double),
            |call| {
                let p = call.arg_as::<ObjectHandle>(0)?;
                let d = call.arg(1);
                call.runtime().call(&p, "translate", vec![d.clone(), d])
            },
        )
        .method(
            "shift_copy",
            Signature::new()
                .with_param("p", ParamType::object("P"))
                .with_param("d", ParamType::Double)
                .returns(ParamType::object("P")),
            |call| {
                let p = call.arg_as::<ObjectHandle>(0)?;
                let d = call.arg(1);
                call.runtime().call(&p, "translate", vec![d.clone(), d])?;
                Ok(Variant::Object(p))
            },
        )
        // Strings, bytes and fixed-width integers
        .method(
            "byte_count",
            Signature::new()
                .with_param("b", ParamType::Bytes)
                .returns(ParamType::Int(IntType::U64))
                .as_const(),
            |call| Ok(Variant::from(call.arg_as::<Bytes>(0)?.len())),
        )
        .method(
            "char_count",
            Signature::new()
                .with_param("s", ParamType::String)
                .returns(ParamType::Int(IntType::U64))
                .as_const(),
            |call| Ok(Variant::from(call.arg_as::<String>(0)?.chars().count())),
        )
        .method(
            "echo",
            Signature::new()
                .with_param("s", ParamType::String)
                .returns(ParamType::String)
                .as_const(),
            |call| Ok(call.arg(0)),
        )
        .method(
            "u16_echo",
            Signature::new()
                .with_param("v", ParamType::Int(IntType::U16))
                .returns(ParamType::Int(IntType::U16))
                .as_const(),
            |call| Ok(call.arg(0)),
        )
        // Enums and flags
        .method(
            "enum_name",
            Signature::new()
                .with_param("e", ParamType::Enum(enum_decl.clone()))
                .returns(ParamType::String)
                .as_const(),
            |call| Ok(Variant::from(call.arg(0).to_string())),
        )
        .method(
            "combine",
            Signature::new()
                .with_param("x", ParamType::Flags(enum_decl.clone()))
                .with_param("y", ParamType::Flags(enum_decl.clone()))
                .returns(ParamType::Flags(enum_decl))
                .as_const(),
            |call| {
                let x = flags_of(&call.arg(0))?;
                let y = flags_of(&call.arg(1))?;
                Ok(Variant::Flags(x | y))
            },
        )
        .method(
            "invert",
            Signature::new()
                .with_param("f", ParamType::Flags(uenum_decl.clone()))
                .returns(ParamType::Flags(uenum_decl))
                .as_const(),
            |call| Ok(Variant::Flags(!flags_of(&call.arg(0))?)),
        );
    rt.register_class(class)?;
    Ok(())
}
