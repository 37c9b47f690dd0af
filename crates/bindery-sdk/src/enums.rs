//! Enum and flag binding
//!
//! An `EnumDecl` is a class-scoped bidirectional name table over an integer
//! payload with a declared backing width. `EnumValue` renders its mapped name
//! or `#<N>`; `FlagSet` renders the `|`-joined names of the entries that
//! exactly compose the payload, or the bare integer when they do not.
//!
//! The backing width also fixes how the complement of a flag set prints:
//! `Signed` backings sign-extend (`~a` prints negative), `Unsigned` backings
//! wrap to the positive value within the width.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::sync::Arc;

use crate::error::{BindError, BindResult};

/// Integer representation behind an enum declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backing {
    /// Two's complement signed integer of the given bit width
    Signed(u8),
    /// Unsigned integer of the given bit width
    Unsigned(u8),
}

impl Backing {
    fn bits(self) -> u32 {
        match self {
            Backing::Signed(bits) | Backing::Unsigned(bits) => u32::from(bits).clamp(1, 64),
        }
    }

    fn mask(self) -> u64 {
        let bits = self.bits();
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    /// Truncate a raw payload to the backing width
    pub fn normalize(self, raw: i64) -> i64 {
        let masked = (raw as u64) & self.mask();
        match self {
            Backing::Signed(_) => {
                let shift = 64 - self.bits();
                ((masked << shift) as i64) >> shift
            }
            Backing::Unsigned(_) => masked as i64,
        }
    }

    /// Render a normalized payload as the backing integer type prints it
    pub fn render(self, value: i64) -> String {
        match self {
            Backing::Signed(_) => value.to_string(),
            Backing::Unsigned(_) => ((value as u64) & self.mask()).to_string(),
        }
    }
}

/// Enum declaration: name, backing and entry table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    name: String,
    backing: Backing,
    entries: Vec<(String, i64)>,
}

impl EnumDecl {
    /// Create a declaration with no entries
    pub fn new(name: impl Into<String>, backing: Backing) -> Self {
        EnumDecl {
            name: name.into(),
            backing,
            entries: Vec::new(),
        }
    }

    /// Add an entry
    pub fn with_entry(mut self, name: impl Into<String>, value: i64) -> Self {
        let value = self.backing.normalize(value);
        self.entries.push((name.into(), value));
        self
    }

    /// Freeze the declaration for sharing
    pub fn into_shared(self) -> Arc<EnumDecl> {
        Arc::new(self)
    }

    /// Declaration name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing integer type
    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Entries in declaration order
    pub fn entries(&self) -> &[(String, i64)] {
        &self.entries
    }

    /// Value of a named entry
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// First name mapped to a value
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    fn parse_numeric(&self, text: &str) -> Option<i64> {
        let digits = text.strip_prefix('#')?;
        parse_integer(digits).map(|v| self.backing.normalize(v))
    }

    fn unknown(&self, text: &str) -> BindError {
        BindError::UnknownEnumName {
            decl: self.name.clone(),
            text: text.to_string(),
        }
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<u64>().ok().map(|u| u as i64))
}

fn same_decl(a: &Arc<EnumDecl>, b: &Arc<EnumDecl>) -> bool {
    Arc::ptr_eq(a, b) || a.name == b.name
}

/// A single enum value
#[derive(Debug, Clone)]
pub struct EnumValue {
    decl: Arc<EnumDecl>,
    value: i64,
}

impl EnumValue {
    /// Wrap a raw payload
    pub fn new(decl: &Arc<EnumDecl>, value: i64) -> Self {
        EnumValue {
            decl: Arc::clone(decl),
            value: decl.backing.normalize(value),
        }
    }

    /// Default-constructed value (payload 0)
    pub fn default_for(decl: &Arc<EnumDecl>) -> Self {
        Self::new(decl, 0)
    }

    /// Named entry
    pub fn named(decl: &Arc<EnumDecl>, name: &str) -> BindResult<Self> {
        decl.value_of(name)
            .map(|v| Self::new(decl, v))
            .ok_or_else(|| decl.unknown(name))
    }

    /// Parse a name, falling back to the `#<N>` numeric form
    pub fn parse(decl: &Arc<EnumDecl>, text: &str) -> BindResult<Self> {
        if let Some(v) = decl.value_of(text) {
            return Ok(Self::new(decl, v));
        }
        decl.parse_numeric(text)
            .map(|v| Self::new(decl, v))
            .ok_or_else(|| decl.unknown(text))
    }

    /// Declaration
    pub fn decl(&self) -> &Arc<EnumDecl> {
        &self.decl
    }

    /// Integer payload
    pub fn to_i(&self) -> i64 {
        self.value
    }

    /// Mapped name, if any
    pub fn name(&self) -> Option<&str> {
        self.decl.name_of(self.value)
    }

    /// `name (N)` debugging form
    pub fn inspect(&self) -> String {
        format!("{} ({})", self, self.decl.backing.render(self.value))
    }

    /// View as a flag set
    pub fn to_flags(&self) -> FlagSet {
        FlagSet::new(&self.decl, self.value)
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "#{}", self.decl.backing.render(self.value)),
        }
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        same_decl(&self.decl, &other.decl) && self.value == other.value
    }
}

/// A combination of flag bits over an enum declaration
#[derive(Debug, Clone)]
pub struct FlagSet {
    decl: Arc<EnumDecl>,
    bits: i64,
}

impl FlagSet {
    /// Wrap a raw payload
    pub fn new(decl: &Arc<EnumDecl>, bits: i64) -> Self {
        FlagSet {
            decl: Arc::clone(decl),
            bits: decl.backing.normalize(bits),
        }
    }

    /// The empty set
    pub fn empty(decl: &Arc<EnumDecl>) -> Self {
        Self::new(decl, 0)
    }

    /// Parse `a|b`, a bare integer, or `#<N>`
    pub fn parse(decl: &Arc<EnumDecl>, text: &str) -> BindResult<Self> {
        if let Some(v) = parse_integer(text.trim()) {
            return Ok(Self::new(decl, v));
        }
        let mut bits = 0i64;
        for part in text.split('|').map(str::trim) {
            let v = decl
                .value_of(part)
                .or_else(|| decl.parse_numeric(part))
                .or_else(|| parse_integer(part))
                .ok_or_else(|| decl.unknown(text))?;
            bits |= v;
        }
        Ok(Self::new(decl, bits))
    }

    /// Declaration
    pub fn decl(&self) -> &Arc<EnumDecl> {
        &self.decl
    }

    /// Integer payload
    pub fn to_i(&self) -> i64 {
        self.bits
    }

    /// Whether every bit of `flag` is set
    pub fn contains(&self, flag: &EnumValue) -> bool {
        flag.value != 0 && (self.bits & flag.value) == flag.value
    }

    /// Names whose bits are all set, sorted; `None` unless they compose the payload exactly
    pub fn names(&self) -> Option<Vec<&str>> {
        if self.bits == 0 {
            return self.decl.name_of(0).map(|n| vec![n]);
        }
        let mut covered = 0i64;
        let mut names: Vec<&str> = Vec::new();
        for (name, value) in &self.decl.entries {
            if *value != 0 && (self.bits & value) == *value {
                covered |= value;
                names.push(name.as_str());
            }
        }
        if covered != self.bits {
            return None;
        }
        names.sort_unstable();
        names.dedup();
        Some(names)
    }

    /// Same as the display form
    pub fn inspect(&self) -> String {
        self.to_string()
    }

    fn combine(&self, other: i64, op: fn(i64, i64) -> i64) -> FlagSet {
        FlagSet::new(&self.decl, op(self.bits, other))
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.names() {
            Some(names) => f.write_str(&names.join("|")),
            None => f.write_str(&self.decl.backing.render(self.bits)),
        }
    }
}

impl PartialEq for FlagSet {
    fn eq(&self, other: &Self) -> bool {
        same_decl(&self.decl, &other.decl) && self.bits == other.bits
    }
}

// Operators act on the raw payload; the result keeps the left operand's
// declaration.

impl BitOr for FlagSet {
    type Output = FlagSet;
    fn bitor(self, rhs: FlagSet) -> FlagSet {
        self.combine(rhs.bits, |a, b| a | b)
    }
}

impl BitOr<EnumValue> for FlagSet {
    type Output = FlagSet;
    fn bitor(self, rhs: EnumValue) -> FlagSet {
        self.combine(rhs.value, |a, b| a | b)
    }
}

impl BitOr for EnumValue {
    type Output = FlagSet;
    fn bitor(self, rhs: EnumValue) -> FlagSet {
        self.to_flags().combine(rhs.value, |a, b| a | b)
    }
}

impl BitAnd for FlagSet {
    type Output = FlagSet;
    fn bitand(self, rhs: FlagSet) -> FlagSet {
        self.combine(rhs.bits, |a, b| a & b)
    }
}

impl BitAnd<EnumValue> for FlagSet {
    type Output = FlagSet;
    fn bitand(self, rhs: EnumValue) -> FlagSet {
        self.combine(rhs.value, |a, b| a & b)
    }
}

impl BitXor for FlagSet {
    type Output = FlagSet;
    fn bitxor(self, rhs: FlagSet) -> FlagSet {
        self.combine(rhs.bits, |a, b| a ^ b)
    }
}

impl Not for FlagSet {
    type Output = FlagSet;
    fn not(self) -> FlagSet {
        FlagSet::new(&self.decl, !self.bits)
    }
}

impl Not for EnumValue {
    type Output = FlagSet;
    fn not(self) -> FlagSet {
        !self.to_flags()
    }
}
