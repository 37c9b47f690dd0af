//! Bindery Engine
//!
//! The binding runtime that exposes native classes to a dynamic host:
//! - **Classes**: descriptors, signatures and the registration builder (`class` module)
//! - **Registry**: generation-stamped instance arena, ownership and singletons (`registry` module)
//! - **Marshaling**: value conversion, out-parameter write-back and return handling (`marshal` module)
//! - **Resolution**: overload selection with keyword arguments and defaults (`resolve` module)
//! - **Dispatch**: host overrides of virtual methods and iteration control (`dispatch` module)
//! - **Events**: per-instance multicast handler lists (`events` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use bindery_engine::{ClassBuilder, ParamType, Runtime, Signature};
//!
//! let mut rt = Runtime::new();
//! let id = rt.register_class(
//!     ClassBuilder::new("Point")
//!         .constructor(Signature::new(), |_| Ok(Box::new(Point::default())))
//!         .attribute("x", ParamType::Double, get_x, set_x),
//! )?;
//!
//! let p = rt.construct(id, vec![])?;
//! rt.call(&p, "x=", vec![1.5.into()])?;
//! assert_eq!(rt.call(&p, "x", vec![])?, 1.5.into());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Class descriptors, signatures and the registration builder
pub mod class;

/// Default limits
pub mod defaults;

/// Host overrides, host callables and the dispatch frame stack
pub mod dispatch;

/// Event handler lists
pub mod events;

/// Argument and return value conversion
pub mod marshal;

/// Runtime options
pub mod options;

/// Instance registry and singleton slots
pub mod registry;

/// Overload resolution
pub mod resolve;

/// The runtime facade
pub mod runtime;

// ============================================================================
// Re-exports
// ============================================================================

pub use class::method::{NativeCall, NativeIter};
pub use class::signature::{ParamSpec, ParamType, RefKind, ReturnType, Signature};
pub use class::{ClassBuilder, ClassKind, ClassRegistry, TraitDescriptor};
pub use dispatch::{HostCall, HostCallable, IterControl, OverrideTable};
pub use events::EventSlot;
pub use options::{OptionsError, RuntimeOptions};
pub use registry::{HandleState, Keep, SingletonSlot};
pub use resolve::CallArgs;
pub use runtime::Runtime;

pub use bindery_sdk;
