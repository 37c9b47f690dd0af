//! Variant: the tagged dynamic value crossing the host/native boundary

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::enums::{EnumValue, FlagSet};
use crate::handle::ObjectHandle;

/// Any value a host call can pass or receive
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Variant {
    /// No value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Double precision float
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw byte buffer
    Bytes(Vec<u8>),
    /// Enum value
    Enum(EnumValue),
    /// Flag combination
    Flags(FlagSet),
    /// Ordered list
    List(Vec<Variant>),
    /// Ordered map
    Map(VariantMap),
    /// Handle to a native instance
    Object(ObjectHandle),
    /// Mutable single-value box shared with the caller
    Boxed(ValueBox),
}

impl Variant {
    /// Create a byte buffer value
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Variant::Bytes(data.into())
    }

    /// Check if value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// Host-facing type name used in diagnostics
    pub fn type_name(&self) -> String {
        match self {
            Variant::Nil => "nil".to_string(),
            Variant::Bool(_) => "bool".to_string(),
            Variant::Int(_) => "int".to_string(),
            Variant::UInt(_) => "uint".to_string(),
            Variant::Float(_) => "float".to_string(),
            Variant::String(_) => "string".to_string(),
            Variant::Bytes(_) => "bytes".to_string(),
            Variant::Enum(e) => e.decl().name().to_string(),
            Variant::Flags(f) => format!("{} flags", f.decl().name()),
            Variant::List(_) => "list".to_string(),
            Variant::Map(_) => "map".to_string(),
            Variant::Object(h) => h.class_name().to_string(),
            Variant::Boxed(_) => "box".to_string(),
        }
    }

    /// Get as i64 (signed or in-range unsigned)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            Variant::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Get as u64 (unsigned or non-negative signed)
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Variant::UInt(u) => Some(*u),
            Variant::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as object handle
    pub fn as_handle(&self) -> Option<&ObjectHandle> {
        match self {
            Variant::Object(h) => Some(h),
            _ => None,
        }
    }

    /// Get as list
    pub fn as_list(&self) -> Option<&[Variant]> {
        match self {
            Variant::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as map
    pub fn as_map(&self) -> Option<&VariantMap> {
        match self {
            Variant::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get as box
    pub fn as_box(&self) -> Option<&ValueBox> {
        match self {
            Variant::Boxed(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => f.write_str("nil"),
            Variant::Bool(b) => write!(f, "{}", b),
            Variant::Int(i) => write!(f, "{}", i),
            Variant::UInt(u) => write!(f, "{}", u),
            Variant::Float(x) => write!(f, "{}", x),
            Variant::String(s) => write!(f, "{:?}", s),
            Variant::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Variant::Enum(e) => write!(f, "{}", e),
            Variant::Flags(fl) => write!(f, "{}", fl),
            Variant::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Variant::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}=>{}", k, v)?;
                }
                f.write_str("}")
            }
            Variant::Object(h) => write!(f, "#<{}>", h.class_name()),
            Variant::Boxed(b) => write!(f, "#<box {}>", b.get()),
        }
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Variant::Int(i64::from(i))
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Variant::Int(i)
    }
}

impl From<u16> for Variant {
    fn from(u: u16) -> Self {
        Variant::UInt(u64::from(u))
    }
}

impl From<u32> for Variant {
    fn from(u: u32) -> Self {
        Variant::UInt(u64::from(u))
    }
}

impl From<u64> for Variant {
    fn from(u: u64) -> Self {
        Variant::UInt(u)
    }
}

impl From<usize> for Variant {
    fn from(u: usize) -> Self {
        Variant::UInt(u as u64)
    }
}

impl From<f64> for Variant {
    fn from(f: f64) -> Self {
        Variant::Float(f)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_string())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(s)
    }
}

impl From<EnumValue> for Variant {
    fn from(e: EnumValue) -> Self {
        Variant::Enum(e)
    }
}

impl From<FlagSet> for Variant {
    fn from(f: FlagSet) -> Self {
        Variant::Flags(f)
    }
}

impl From<ObjectHandle> for Variant {
    fn from(h: ObjectHandle) -> Self {
        Variant::Object(h)
    }
}

impl From<ValueBox> for Variant {
    fn from(b: ValueBox) -> Self {
        Variant::Boxed(b)
    }
}

impl From<VariantMap> for Variant {
    fn from(m: VariantMap) -> Self {
        Variant::Map(m)
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(items: Vec<T>) -> Self {
        Variant::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Variant::Nil)
    }
}

/// Insertion-ordered map keyed by `Variant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantMap {
    entries: Vec<(Variant, Variant)>,
}

impl VariantMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous value
    pub fn insert(&mut self, key: Variant, value: Variant) -> Option<Variant> {
        for entry in &mut self.entries {
            if entry.0 == key {
                return Some(std::mem::replace(&mut entry.1, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    /// Look up a value
    pub fn get(&self, key: &Variant) -> Option<&Variant> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Remove a key
    pub fn remove(&mut self, key: &Variant) -> Option<Variant> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Variant, &Variant)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Variant, Variant)> for VariantMap {
    fn from_iter<I: IntoIterator<Item = (Variant, Variant)>>(iter: I) -> Self {
        let mut map = VariantMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Mutable single-value box passed by reference
///
/// Clones share the cell, so a native write through a reference parameter is
/// visible to every holder of the box. A box holding nil stands for "no value"
/// while still being passable by reference.
#[derive(Debug, Clone, Default)]
pub struct ValueBox(Rc<RefCell<Variant>>);

impl ValueBox {
    /// Create a box holding a value
    pub fn new(value: impl Into<Variant>) -> Self {
        ValueBox(Rc::new(RefCell::new(value.into())))
    }

    /// Create an empty (nil) box
    pub fn empty() -> Self {
        Self::default()
    }

    /// Current value
    pub fn get(&self) -> Variant {
        self.0.borrow().clone()
    }

    /// Replace the value
    pub fn set(&self, value: impl Into<Variant>) {
        *self.0.borrow_mut() = value.into();
    }

    /// Whether the box holds nil
    pub fn is_nil(&self) -> bool {
        self.0.borrow().is_nil()
    }

    /// Whether both boxes share one cell
    pub fn same_box(&self, other: &ValueBox) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ValueBox {
    fn eq(&self, other: &Self) -> bool {
        self.same_box(other) || *self.0.borrow() == *other.0.borrow()
    }
}
