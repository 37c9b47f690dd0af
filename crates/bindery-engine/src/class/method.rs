//! Method descriptors and native call context

use std::fmt;
use std::rc::Rc;

use bindery_sdk::{BindError, BindResult, FromVariant, NativeObject, ObjectHandle, Variant};

use super::signature::Signature;
use crate::runtime::Runtime;

/// Native method body
pub type NativeFn = Rc<dyn Fn(&mut NativeCall<'_>) -> BindResult<Variant>>;

/// Native constructor body
pub type CtorFn = Rc<dyn Fn(&mut NativeCall<'_>) -> BindResult<Box<dyn NativeObject>>>;

/// Element stream produced by an enumerable method
pub type NativeIter = Box<dyn Iterator<Item = BindResult<Variant>>>;

/// Native body of an enumerable (`each`-style) method
pub type IterFn = Rc<dyn Fn(&mut NativeCall<'_>) -> BindResult<NativeIter>>;

/// What runs when an overload is selected
#[derive(Clone)]
pub enum MethodBody {
    /// Plain native function
    Native(NativeFn),
    /// Driver for a block-based iteration
    Iterator(IterFn),
    /// Constructor producing the native state of a new instance
    Constructor(CtorFn),
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodBody::Native(_) => f.write_str("Native"),
            MethodBody::Iterator(_) => f.write_str("Iterator"),
            MethodBody::Constructor(_) => f.write_str("Constructor"),
        }
    }
}

/// One overload: a signature plus its body
#[derive(Debug, Clone)]
pub struct Overload {
    /// Declared shape
    pub sig: Signature,
    /// Implementation
    pub body: MethodBody,
}

/// All overloads sharing one method name within one class
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Method name
    pub name: String,
    /// Overloads in declaration order
    pub overloads: Vec<Rc<Overload>>,
}

impl MethodDescriptor {
    /// Create an empty descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// Whether any overload may be overridden by host subclasses
    pub fn is_virtual(&self) -> bool {
        self.overloads.iter().any(|o| o.sig.is_virtual)
    }
}

/// Arguments and receiver handed to a native body
///
/// Arguments are already converted to the declared parameter types. A body
/// may replace an argument with [`NativeCall::set_arg`]; for non-const
/// reference and pointer parameters the new value is written back to the
/// caller's box, list or map.
pub struct NativeCall<'rt> {
    pub(crate) rt: &'rt mut Runtime,
    pub(crate) receiver: Option<ObjectHandle>,
    pub(crate) args: Vec<Variant>,
}

impl<'rt> NativeCall<'rt> {
    /// Create a call context
    pub fn new(rt: &'rt mut Runtime, receiver: Option<ObjectHandle>, args: Vec<Variant>) -> Self {
        Self { rt, receiver, args }
    }

    /// The runtime, for re-entrant calls, object creation and events
    pub fn runtime(&mut self) -> &mut Runtime {
        self.rt
    }

    /// Receiver handle of an instance method
    pub fn receiver(&self) -> BindResult<&ObjectHandle> {
        self.receiver
            .as_ref()
            .ok_or_else(|| BindError::native("static context has no receiver"))
    }

    /// Number of bound arguments
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Bound argument (nil when out of range)
    pub fn arg(&self, index: usize) -> Variant {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Bound argument extracted as a native type
    pub fn arg_as<T: FromVariant>(&self, index: usize) -> BindResult<T> {
        match self.args.get(index) {
            Some(value) => T::from_variant(value),
            None => T::from_variant(&Variant::Nil),
        }
    }

    /// Replace a bound argument (out-parameters)
    pub fn set_arg(&mut self, index: usize, value: impl Into<Variant>) {
        if let Some(slot) = self.args.get_mut(index) {
            *slot = value.into();
        }
    }

    /// Native state of the receiver
    pub fn this<T: NativeObject>(&mut self) -> BindResult<&T> {
        let recv = self
            .receiver
            .as_ref()
            .ok_or_else(|| BindError::native("static context has no receiver"))?;
        self.rt.native::<T>(recv)
    }

    /// Mutable native state of the receiver
    pub fn this_mut<T: NativeObject>(&mut self) -> BindResult<&mut T> {
        let recv = self
            .receiver
            .as_ref()
            .ok_or_else(|| BindError::native("static context has no receiver"))?;
        self.rt.native_mut::<T>(recv)
    }

    pub(crate) fn into_args(self) -> Vec<Variant> {
        self.args
    }
}
