//! `Lazy`: deferred default construction
//!
//! `Lazy.new` without arguments registers a handle with no native state;
//! the state is allocated on first use and only then counted.

use bindery_engine::bindery_sdk::{BindResult, NativeObject, Variant};
use bindery_engine::{ClassBuilder, ParamType, Runtime, Signature};

/// Native state of `Lazy`
#[derive(Debug, Clone, PartialEq)]
pub struct Lazy {
    /// Payload
    pub value: i64,
}

impl NativeObject for Lazy {
    fn duplicate(&self) -> Option<Box<dyn NativeObject>> {
        Some(Box::new(self.clone()))
    }

    fn equals(&self, other: &dyn NativeObject) -> Option<bool> {
        other.downcast_ref::<Lazy>().map(|l| l == self)
    }
}

pub(crate) fn register(rt: &mut Runtime) -> BindResult<()> {
    let class = ClassBuilder::new("Lazy")
        .lazy(|_| Ok(Box::new(Lazy { value: 5 })))
        .constructor(
            Signature::new().with_param("value", ParamType::int()),
            |call| {
                Ok(Box::new(Lazy {
                    value: call.arg_as(0)?,
                }))
            },
        )
        .method(
            "value",
            Signature::new().returns(ParamType::int()).as_const(),
            |call| Ok(Variant::Int(call.this::<Lazy>()?.value)),
        );
    rt.register_class(class)?;
    Ok(())
}
