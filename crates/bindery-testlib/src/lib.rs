//! Bindery Test Library
//!
//! A small native class library registered into a [`Runtime`] to exercise
//! the binding machinery end to end:
//!
//! - `A` / `AChild`: identity-preserving objects with attributes, virtual
//!   and protected methods, an enumerable and an event
//! - `B`: the marshaling lab (reference kinds, out-parameters, overloads,
//!   keyword arguments, stored native pointers)
//! - `P`: a value class copied on every by-value crossing
//! - `Lazy`: deferred default construction
//! - `Tech`: a class with a "current instance" singleton slot
//! - `Enum` / `UEnum`: signed and unsigned flag enums

#![warn(missing_docs)]

use bindery_engine::bindery_sdk::BindResult;
use bindery_engine::Runtime;

pub mod a;
pub mod b;
pub mod enums;
pub mod lazy;
pub mod point;
pub mod tech;

/// Register every test class into the given runtime
///
/// Base classes are registered before the classes deriving from them.
pub fn register_testlib(rt: &mut Runtime) -> BindResult<()> {
    point::register(rt)?;
    a::register(rt)?;
    b::register(rt)?;
    lazy::register(rt)?;
    tech::register(rt)?;
    tracing::debug!(classes = rt.classes().len(), "test library registered");
    Ok(())
}

/// A runtime with the test library registered
pub fn runtime() -> BindResult<Runtime> {
    let mut rt = Runtime::new();
    register_testlib(&mut rt)?;
    Ok(rt)
}
