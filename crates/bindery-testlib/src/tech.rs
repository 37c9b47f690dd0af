//! `Tech`: a class with a "current instance"
//!
//! `Tech.set_current(t)` installs `t` into the class's singleton slot, which
//! takes ownership of it; the previous occupant is destroyed.

use bindery_engine::bindery_sdk::{BindResult, NativeObject, ObjectHandle, Variant};
use bindery_engine::{ClassBuilder, ParamType, RefKind, Runtime, Signature};

/// Singleton slot name
pub const CURRENT: &str = "current";

/// Native state of `Tech`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tech {
    /// Technology name
    pub name: String,
}

impl NativeObject for Tech {}

pub(crate) fn register(rt: &mut Runtime) -> BindResult<()> {
    let class = ClassBuilder::new("Tech")
        .constructor(
            Signature::new()
                .with_param("name", ParamType::String)
                .with_default("generic"),
            |call| {
                Ok(Box::new(Tech {
                    name: call.arg_as(0)?,
                }))
            },
        )
        .attribute(
            "name",
            ParamType::String,
            |call| Ok(Variant::from(call.this::<Tech>()?.name.clone())),
            |call, v| {
                call.this_mut::<Tech>()?.name = v.as_str().unwrap_or_default().to_string();
                Ok(())
            },
        )
        .static_method(
            "set_current",
            Signature::new().with_param_kind("t", ParamType::object("Tech"), RefKind::Ptr),
            |call| {
                let t = call.arg_as::<Option<ObjectHandle>>(0)?;
                let rt = call.runtime();
                let id = rt.class_id("Tech")?;
                rt.install_singleton(id, CURRENT, t.as_ref())?;
                Ok(Variant::Nil)
            },
        )
        .static_method(
            "current",
            Signature::new().returns_kind(ParamType::object("Tech"), RefKind::Ptr),
            |call| {
                let rt = call.runtime();
                let id = rt.class_id("Tech")?;
                Ok(rt.singleton(id, CURRENT).map(Variant::Object).unwrap_or_default())
            },
        );
    rt.register_class(class)?;
    Ok(())
}
