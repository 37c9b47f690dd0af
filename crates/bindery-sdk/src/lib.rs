//! Bindery SDK - value model shared by the runtime and native class libraries
//!
//! This crate provides the leaf types that cross the host/native boundary
//! without depending on the runtime itself:
//!
//! - [`Variant`]: the tagged dynamic value (primitives, strings, byte buffers,
//!   enums, flags, lists, maps, object handles, boxes, nil)
//! - [`ObjectHandle`] / [`InstanceRef`]: generation-stamped references to
//!   native instances
//! - [`EnumDecl`], [`EnumValue`], [`FlagSet`]: enum and flag binding
//! - [`NativeObject`]: the trait backing every bound instance
//! - [`BindError`]: the error taxonomy raised at call sites
//!
//! # Example
//!
//! ```ignore
//! use bindery_sdk::{EnumDecl, EnumValue, Backing};
//!
//! let decl = EnumDecl::new("Enum", Backing::Signed(32))
//!     .with_entry("a", 1)
//!     .with_entry("b", 2)
//!     .into_shared();
//! assert_eq!(EnumValue::parse(&decl, "a")?.to_string(), "a");
//! assert_eq!(EnumValue::default_for(&decl).to_string(), "#0");
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod enums;
pub mod error;
pub mod handle;
pub mod native;
pub mod value;

pub use convert::{Bytes, FromVariant, IntType};
pub use enums::{Backing, EnumDecl, EnumValue, FlagSet};
pub use error::{BindError, BindResult, CandidateFailure};
pub use handle::{Anchor, ClassId, InstanceRef, ObjectHandle, Proxy};
pub use native::{AsAny, NativeObject};
pub use value::{ValueBox, Variant, VariantMap};
