//! `P`: a value class
//!
//! Every by-value crossing produces an independent copy with its own host
//! proxy, so mutations on either side never alias.

use bindery_engine::bindery_sdk::{BindResult, NativeObject, Variant};
use bindery_engine::{ClassBuilder, ClassKind, NativeCall, ParamType, Runtime, Signature};

/// Native state of `P`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl NativeObject for Point {
    fn duplicate(&self) -> Option<Box<dyn NativeObject>> {
        Some(Box::new(*self))
    }

    fn assign_from(&mut self, other: &dyn NativeObject) -> bool {
        other.downcast_ref::<Point>().map(|p| *self = *p).is_some()
    }

    fn equals(&self, other: &dyn NativeObject) -> Option<bool> {
        other.downcast_ref::<Point>().map(|p| p == self)
    }
}

fn translate(call: &mut NativeCall<'_>) -> BindResult<Variant> {
    let dx = call.arg_as::<f64>(0)?;
    let dy = call.arg_as::<f64>(1)?;
    let p = call.this_mut::<Point>()?;
    p.x += dx;
    p.y += dy;
    Ok(Variant::Nil)
}

pub(crate) fn register(rt: &mut Runtime) -> BindResult<()> {
    let class = ClassBuilder::new("P")
        .kind(ClassKind::Value)
        .constructor(
            Signature::new()
                .with_param("x", ParamType::Double)
                .with_default(0.0)
                .with_param("y", ParamType::Double)
                .with_default(0.0),
            |call| {
                Ok(Box::new(Point {
                    x: call.arg_as(0)?,
                    y: call.arg_as(1)?,
                }))
            },
        )
        .attribute(
            "x",
            ParamType::Double,
            |call| Ok(Variant::Float(call.this::<Point>()?.x)),
            |call, v| {
                call.this_mut::<Point>()?.x = v.as_f64().unwrap_or_default();
                Ok(())
            },
        )
        .attribute(
            "y",
            ParamType::Double,
            |call| Ok(Variant::Float(call.this::<Point>()?.y)),
            |call, v| {
                call.this_mut::<Point>()?.y = v.as_f64().unwrap_or_default();
                Ok(())
            },
        )
        .method(
            "translate",
            Signature::new()
                .with_param("dx", ParamType::Double)
                .with_param("dy", ParamType::Double),
            translate,
        )
        .method(
            "to_s",
            Signature::new().returns(ParamType::String).as_const(),
            |call| {
                let p = call.this::<Point>()?;
                Ok(Variant::from(format!("{},{}", p.x, p.y)))
            },
        )
        .static_method(
            "origin",
            Signature::new().returns(ParamType::object("P")),
            |call| {
                let h = call.runtime().new_object("P", Box::new(Point::default()))?;
                Ok(Variant::Object(h))
            },
        );
    rt.register_class(class)?;
    Ok(())
}
