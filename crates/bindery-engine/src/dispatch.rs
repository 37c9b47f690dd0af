//! Virtual dispatch bridge
//!
//! Host subclasses carry an [`OverrideTable`] that maps virtual method names to
//! host callables. Every instance of such a subclass shares its class's table;
//! the runtime consults it before running the compiled native default.
//!
//! Host code never unwinds through native frames: a callable returns a
//! `BindResult`, and block-driven iteration returns an [`IterControl`], so
//! exceptions and early exits are plain values on the way back.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use bindery_sdk::{BindError, BindResult, FromVariant, InstanceRef, ObjectHandle, Variant};

use crate::runtime::Runtime;

/// Host function body
pub type HostFn = dyn Fn(&mut Runtime, &mut HostCall) -> BindResult<Variant>;

/// A host-side callable: override, event handler or block
///
/// Clones share identity; two callables built from separate closures are
/// distinct even when they behave the same.
#[derive(Clone)]
pub struct HostCallable(Rc<HostFn>);

impl HostCallable {
    /// Wrap a host function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Runtime, &mut HostCall) -> BindResult<Variant> + 'static,
    {
        HostCallable(Rc::new(f))
    }

    /// Identity comparison
    pub fn same(&self, other: &HostCallable) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }

    /// Invoke
    pub fn invoke(&self, rt: &mut Runtime, call: &mut HostCall) -> BindResult<Variant> {
        (self.0)(rt, call)
    }
}

impl fmt::Debug for HostCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostCallable({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Receiver and marshaled arguments delivered to host code
#[derive(Debug, Clone, Default)]
pub struct HostCall {
    /// Instance the override runs for (none for plain blocks)
    pub receiver: Option<ObjectHandle>,
    /// Arguments after outward marshaling
    pub args: Vec<Variant>,
}

impl HostCall {
    /// Create a call record
    pub fn new(receiver: Option<ObjectHandle>, args: Vec<Variant>) -> Self {
        Self { receiver, args }
    }

    /// Receiver handle
    pub fn receiver(&self) -> BindResult<&ObjectHandle> {
        self.receiver
            .as_ref()
            .ok_or_else(|| BindError::host("no receiver"))
    }

    /// Argument (nil when out of range)
    pub fn arg(&self, index: usize) -> Variant {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Argument extracted as a native type
    pub fn arg_as<T: FromVariant>(&self, index: usize) -> BindResult<T> {
        match self.args.get(index) {
            Some(value) => T::from_variant(value),
            None => T::from_variant(&Variant::Nil),
        }
    }
}

/// Host overrides of one host-defined subclass
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: FxHashMap<String, HostCallable>,
}

impl OverrideTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an override, replacing any previous one of the same name
    pub fn insert(&mut self, name: impl Into<String>, f: HostCallable) {
        self.entries.insert(name.into(), f);
    }

    /// Override for a method
    pub fn get(&self, name: &str) -> Option<&HostCallable> {
        self.entries.get(name)
    }

    /// Number of overrides
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overridden method names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// What a block tells the iteration driver
#[derive(Debug, Clone, PartialEq)]
pub enum IterControl {
    /// Ask for the next element
    Continue,
    /// Stop; the enumerable call returns this value
    Break(Variant),
}

/// Who is currently executing on the runtime's call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A native method body
    Native,
    /// A host override running for the given instance
    Override(InstanceRef),
    /// An event handler or iteration block
    Host,
}

impl Frame {
    pub(crate) fn is_host(self) -> bool {
        !matches!(self, Frame::Native)
    }
}
