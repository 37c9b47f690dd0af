//! The native-state trait stored in every instance slot
//!
//! Implement `NativeObject` for the Rust struct backing a bound class. The
//! optional hooks enable `dup`, `assign` and value equality; classes that
//! leave them at their defaults are identity-only and cannot be copied.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Clone, PartialEq, Default)]
//! struct Point { x: f64, y: f64 }
//!
//! impl NativeObject for Point {
//!     fn duplicate(&self) -> Option<Box<dyn NativeObject>> {
//!         Some(Box::new(self.clone()))
//!     }
//!     fn assign_from(&mut self, other: &dyn NativeObject) -> bool {
//!         other.downcast_ref::<Point>().map(|p| *self = p.clone()).is_some()
//!     }
//!     fn equals(&self, other: &dyn NativeObject) -> Option<bool> {
//!         other.downcast_ref::<Point>().map(|p| p == self)
//!     }
//! }
//! ```

use std::any::Any;

/// Upcast helper implemented for every sized `'static` type
pub trait AsAny: Any + 'static {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Native state of a bound instance
pub trait NativeObject: AsAny + 'static {
    /// Independent copy for `dup` and by-value crossings
    fn duplicate(&self) -> Option<Box<dyn NativeObject>> {
        None
    }

    /// Overwrite this state from another instance; `false` if unsupported
    fn assign_from(&mut self, _other: &dyn NativeObject) -> bool {
        false
    }

    /// Value equality; `None` falls back to identity
    fn equals(&self, _other: &dyn NativeObject) -> Option<bool> {
        None
    }
}

impl dyn NativeObject {
    /// Downcast to the concrete state type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to the concrete state type
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Check the concrete state type
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}
