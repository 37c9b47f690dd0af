//! Parameter and return declarations
//!
//! A [`Signature`] is the declared shape of one overload. It also knows how to
//! pretty-print itself for overload diagnostics:
//!
//! ```text
//! [static ]<ret> <name>(<type> <param>[ = <default>], ...)[ const]
//! ```

use std::fmt;
use std::sync::Arc;

use bindery_sdk::{EnumDecl, IntType, Variant};

/// How a value crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// `T` (always copies)
    Value,
    /// `T &` (aliases, nil rejected)
    Ref,
    /// `const T &`
    ConstRef,
    /// `T *` (aliases, nil accepted)
    Ptr,
    /// `const T *`
    ConstPtr,
}

impl RefKind {
    /// Whether mutation through the crossing value is forbidden
    pub fn is_const(self) -> bool {
        matches!(self, RefKind::ConstRef | RefKind::ConstPtr)
    }

    /// Whether nil is a legal value
    pub fn is_nullable(self) -> bool {
        matches!(self, RefKind::Ptr | RefKind::ConstPtr)
    }

    /// Whether the crossing aliases the caller's value
    pub fn aliases(self) -> bool {
        !matches!(self, RefKind::Value)
    }

    /// Whether native mutations are written back to the caller
    pub fn writes_back(self) -> bool {
        matches!(self, RefKind::Ref | RefKind::Ptr)
    }

    fn decorate(self, base: &str) -> String {
        match self {
            RefKind::Value => base.to_string(),
            RefKind::Ref => format!("{} &", base),
            RefKind::ConstRef => format!("const {} &", base),
            RefKind::Ptr => format!("{} *", base),
            RefKind::ConstPtr => format!("const {} *", base),
        }
    }
}

/// Declared type of a parameter or return value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    /// `bool`
    Bool,
    /// Fixed-width integer
    Int(IntType),
    /// `double`
    Double,
    /// UTF-8 string counted in characters
    String,
    /// Byte buffer counted in bytes
    Bytes,
    /// Enum of the given declaration
    Enum(Arc<EnumDecl>),
    /// Flag set over the given declaration
    Flags(Arc<EnumDecl>),
    /// Homogeneous list
    List(Box<ParamType>),
    /// Map with typed keys and values
    Map(Box<ParamType>, Box<ParamType>),
    /// Instance of the named class or a subclass
    Object(String),
    /// Any value, passed through untouched
    Any,
}

impl ParamType {
    /// Shorthand for `int`
    pub fn int() -> Self {
        ParamType::Int(IntType::I32)
    }

    /// Shorthand for an object parameter
    pub fn object(class: impl Into<String>) -> Self {
        ParamType::Object(class.into())
    }

    /// Shorthand for a list parameter
    pub fn list(item: ParamType) -> Self {
        ParamType::List(Box::new(item))
    }

    /// Shorthand for a map parameter
    pub fn map(key: ParamType, value: ParamType) -> Self {
        ParamType::Map(Box::new(key), Box::new(value))
    }

    /// Name without reference decoration
    pub fn name(&self) -> String {
        match self {
            ParamType::Bool => "bool".to_string(),
            ParamType::Int(it) => it.name().to_string(),
            ParamType::Double => "double".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::Enum(decl) => decl.name().to_string(),
            ParamType::Flags(decl) => format!("{} flags", decl.name()),
            ParamType::List(item) => format!("{}[]", item.name()),
            ParamType::Map(k, v) => format!("map<{},{}>", k.name(), v.name()),
            ParamType::Object(class) => class.clone(),
            ParamType::Any => "variant".to_string(),
        }
    }

    /// Class name for object types
    pub fn class_name(&self) -> Option<&str> {
        match self {
            ParamType::Object(class) => Some(class),
            _ => None,
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Keyword name
    pub name: String,
    /// Declared type
    pub ty: ParamType,
    /// Reference kind
    pub kind: RefKind,
    /// Value used when neither a positional nor a keyword value is given
    pub default: Option<Variant>,
}

impl ParamSpec {
    /// Create a by-value parameter without a default
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: RefKind::Value,
            default: None,
        }
    }

    /// Whether the parameter must be bound by the caller
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Rendered type including reference decoration
    pub fn type_string(&self) -> String {
        self.kind.decorate(&self.ty.name())
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_string(), self.name)?;
        if let Some(default) = &self.default {
            write!(f, " = {}", default)?;
        }
        Ok(())
    }
}

/// Declared return of an overload
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnType {
    /// No value (the call yields nil)
    Void,
    /// A typed value with its reference kind
    Value(ParamType, RefKind),
}

impl ReturnType {
    fn render(&self) -> String {
        match self {
            ReturnType::Void => "void".to_string(),
            ReturnType::Value(ty, kind) => kind.decorate(&ty.name()),
        }
    }
}

/// Declared shape of one overload
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Ordered parameters
    pub params: Vec<ParamSpec>,
    /// Return declaration
    pub ret: ReturnType,
    /// Callable through const views
    pub is_const: bool,
    /// Class-level method without a receiver
    pub is_static: bool,
    /// Callable only from natives or overrides of the same instance
    pub is_protected: bool,
    /// May be overridden by host subclasses
    pub is_virtual: bool,
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

impl Signature {
    /// A void, non-const instance signature with no parameters
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            ret: ReturnType::Void,
            is_const: false,
            is_static: false,
            is_protected: false,
            is_virtual: false,
        }
    }

    /// Append a by-value parameter
    pub fn with_param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec::new(name, ty));
        self
    }

    /// Append a parameter with an explicit reference kind
    pub fn with_param_kind(mut self, name: impl Into<String>, ty: ParamType, kind: RefKind) -> Self {
        let mut param = ParamSpec::new(name, ty);
        param.kind = kind;
        self.params.push(param);
        self
    }

    /// Give the most recently added parameter a default value
    pub fn with_default(mut self, value: impl Into<Variant>) -> Self {
        if let Some(param) = self.params.last_mut() {
            param.default = Some(value.into());
        }
        self
    }

    /// Return a value of the given type
    pub fn returns(self, ty: ParamType) -> Self {
        self.returns_kind(ty, RefKind::Value)
    }

    /// Return a value with an explicit reference kind
    pub fn returns_kind(mut self, ty: ParamType, kind: RefKind) -> Self {
        self.ret = ReturnType::Value(ty, kind);
        self
    }

    /// Mark as const
    pub fn as_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as protected
    pub fn as_protected(mut self) -> Self {
        self.is_protected = true;
        self
    }

    /// Mark as virtual
    pub fn as_virtual(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Index of the parameter with the given keyword name
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Pretty-print with the method name
    pub fn render(&self, method: &str) -> String {
        let params = self
            .params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}{} {}({}){}",
            if self.is_static { "static " } else { "" },
            self.ret.render(),
            method,
            params,
            if self.is_const { " const" } else { "" }
        )
    }
}
