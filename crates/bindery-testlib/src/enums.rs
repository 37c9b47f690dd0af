//! Enum declarations shared by the test classes
//!
//! `Enum` is backed by a signed 32-bit integer, `UEnum` by an unsigned
//! 8-bit one, so the complement of a flag set prints negative for the first
//! and as a wrapped byte for the second.

use std::sync::Arc;

use bindery_engine::bindery_sdk::{Backing, EnumDecl};
use bindery_engine::TraitDescriptor;

/// `Enum { a = 1, b = 2, c = 4 }`
pub fn signed_enum() -> Arc<EnumDecl> {
    EnumDecl::new("Enum", Backing::Signed(32))
        .with_entry("a", 1)
        .with_entry("b", 2)
        .with_entry("c", 4)
        .into_shared()
}

/// `UEnum : uint8_t { x = 1, y = 2, z = 4 }`
pub fn unsigned_enum() -> Arc<EnumDecl> {
    EnumDecl::new("UEnum", Backing::Unsigned(8))
        .with_entry("x", 1)
        .with_entry("y", 2)
        .with_entry("z", 4)
        .into_shared()
}

/// Mixin contributing flavor constants and `UEnum`
pub fn flavors() -> TraitDescriptor {
    TraitDescriptor::new("Flavors")
        .with_constant("SWEET", 1)
        .with_constant("SOUR", 2)
        .with_constant("VERSION", "mixin")
        .with_enum(unsigned_enum())
}
