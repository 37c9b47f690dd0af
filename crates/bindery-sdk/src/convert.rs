//! Fixed-width integers and Variant extraction traits
//!
//! Integer parameters are declared with an exact native width. Values forced
//! into a narrower field wrap with two's complement semantics instead of
//! failing, exactly as a native cast would.

use crate::enums::{EnumValue, FlagSet};
use crate::error::{BindError, BindResult};
use crate::handle::ObjectHandle;
use crate::value::{ValueBox, Variant, VariantMap};

/// A native integer type: bit width plus signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntType {
    /// Width in bits (8, 16, 32 or 64)
    pub bits: u8,
    /// Whether the type is signed
    pub signed: bool,
}

impl IntType {
    /// `int8`
    pub const I8: IntType = IntType { bits: 8, signed: true };
    /// `uint8`
    pub const U8: IntType = IntType { bits: 8, signed: false };
    /// `int16`
    pub const I16: IntType = IntType { bits: 16, signed: true };
    /// `uint16`
    pub const U16: IntType = IntType { bits: 16, signed: false };
    /// `int`
    pub const I32: IntType = IntType { bits: 32, signed: true };
    /// `uint`
    pub const U32: IntType = IntType { bits: 32, signed: false };
    /// `long`
    pub const I64: IntType = IntType { bits: 64, signed: true };
    /// `ulong`
    pub const U64: IntType = IntType { bits: 64, signed: false };

    /// Type name used in signatures
    pub fn name(self) -> &'static str {
        match (self.bits, self.signed) {
            (8, true) => "int8",
            (8, false) => "uint8",
            (16, true) => "int16",
            (16, false) => "uint16",
            (32, true) => "int",
            (32, false) => "uint",
            (_, true) => "long",
            (_, false) => "ulong",
        }
    }

    /// Truncate to the type's width, sign-aware
    pub fn wrap(self, raw: i128) -> Variant {
        let bits = u32::from(self.bits).clamp(1, 64);
        let truncated = (raw as u128) & (u128::MAX >> (128 - bits));
        if self.signed {
            let shift = 128 - bits;
            Variant::Int((((truncated << shift) as i128) >> shift) as i64)
        } else {
            Variant::UInt(truncated as u64)
        }
    }
}

/// Extract a native value from a marshaled argument
pub trait FromVariant: Sized {
    /// Convert, failing with `UnexpectedValue` on a type mismatch
    fn from_variant(value: &Variant) -> BindResult<Self>;
}

fn unexpected(expected: &str, got: &Variant) -> BindError {
    BindError::UnexpectedValue {
        expected: expected.to_string(),
        actual: got.type_name(),
    }
}

macro_rules! int_from_variant {
    ($($ty:ty => $name:expr),* $(,)?) => {
        $(
            impl FromVariant for $ty {
                fn from_variant(value: &Variant) -> BindResult<Self> {
                    match value {
                        Variant::Int(i) => Ok(*i as $ty),
                        Variant::UInt(u) => Ok(*u as $ty),
                        Variant::Enum(e) => Ok(e.to_i() as $ty),
                        Variant::Flags(f) => Ok(f.to_i() as $ty),
                        other => Err(unexpected($name, other)),
                    }
                }
            }
        )*
    };
}

int_from_variant! {
    i8 => "int8",
    u8 => "uint8",
    i16 => "int16",
    u16 => "uint16",
    i32 => "int",
    u32 => "uint",
    i64 => "long",
    u64 => "ulong",
    usize => "ulong",
}

impl FromVariant for f64 {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        match value {
            Variant::Float(f) => Ok(*f),
            Variant::Int(i) => Ok(*i as f64),
            Variant::UInt(u) => Ok(*u as f64),
            other => Err(unexpected("double", other)),
        }
    }
}

impl FromVariant for bool {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        value.as_bool().ok_or_else(|| unexpected("bool", value))
    }
}

impl FromVariant for String {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        match value {
            Variant::String(s) => Ok(s.clone()),
            other => Err(unexpected("string", other)),
        }
    }
}

/// Raw byte payload extracted from a `bytes` argument
///
/// A separate type keeps byte extraction apart from `Vec<T>` list
/// extraction, which would otherwise also match `Vec<u8>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl FromVariant for Bytes {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        match value {
            Variant::Bytes(b) => Ok(Bytes(b.clone())),
            Variant::String(s) => Ok(Bytes(s.as_bytes().to_vec())),
            other => Err(unexpected("bytes", other)),
        }
    }
}

impl FromVariant for ObjectHandle {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        value.as_handle().cloned().ok_or_else(|| unexpected("object", value))
    }
}

impl FromVariant for EnumValue {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        match value {
            Variant::Enum(e) => Ok(e.clone()),
            other => Err(unexpected("enum", other)),
        }
    }
}

impl FromVariant for FlagSet {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        match value {
            Variant::Flags(f) => Ok(f.clone()),
            Variant::Enum(e) => Ok(e.to_flags()),
            other => Err(unexpected("flags", other)),
        }
    }
}

impl FromVariant for VariantMap {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        value.as_map().cloned().ok_or_else(|| unexpected("map", value))
    }
}

impl FromVariant for ValueBox {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        value.as_box().cloned().ok_or_else(|| unexpected("box", value))
    }
}

impl FromVariant for Variant {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromVariant> FromVariant for Vec<T> {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        match value {
            Variant::List(items) => items.iter().map(T::from_variant).collect(),
            other => Err(unexpected("list", other)),
        }
    }
}

impl<T: FromVariant> FromVariant for Option<T> {
    fn from_variant(value: &Variant) -> BindResult<Self> {
        if value.is_nil() {
            Ok(None)
        } else {
            T::from_variant(value).map(Some)
        }
    }
}
