//! Class descriptors and the class table
//!
//! A class is described once, at registration, and is immutable afterwards.
//! Method lookup walks the class itself first and then its base chain, so a
//! subclass sees every overload its ancestors declare, own ones first.
//! Constants resolve by first match: own constants and enums, then mixin
//! traits in declaration order, then the base chain.

pub mod builder;
pub mod method;
pub mod signature;

use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use bindery_sdk::{BindError, BindResult, ClassId, EnumDecl, EnumValue, Variant};

use crate::dispatch::OverrideTable;
use method::{CtorFn, MethodDescriptor, Overload};
use signature::ParamSpec;

pub use builder::ClassBuilder;

/// How instances of a class cross the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    /// Reference-counted identity: one host proxy per instance, reused on
    /// every crossing
    #[default]
    Object,
    /// Value semantics: every crossing yields a fresh proxy
    Value,
}

/// A mixin contributing only constants and enums
#[derive(Debug, Clone, Default)]
pub struct TraitDescriptor {
    /// Trait name
    pub name: String,
    /// Named constants
    pub constants: Vec<(String, Variant)>,
    /// Enum declarations whose entries are exposed as constants
    pub enums: Vec<Arc<EnumDecl>>,
}

impl TraitDescriptor {
    /// Create an empty trait
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a constant
    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.constants.push((name.into(), value.into()));
        self
    }

    /// Add an enum declaration
    pub fn with_enum(mut self, decl: Arc<EnumDecl>) -> Self {
        self.enums.push(decl);
        self
    }

    fn constant(&self, name: &str) -> Option<Variant> {
        lookup_constant(&self.constants, &self.enums, name)
    }

    fn enum_decl(&self, name: &str) -> Option<Arc<EnumDecl>> {
        self.enums.iter().find(|d| d.name() == name).cloned()
    }
}

fn lookup_constant(
    constants: &[(String, Variant)],
    enums: &[Arc<EnumDecl>],
    name: &str,
) -> Option<Variant> {
    if let Some((_, value)) = constants.iter().find(|(n, _)| n == name) {
        return Some(value.clone());
    }
    enums.iter().find_map(|decl| {
        decl.value_of(name)
            .map(|v| Variant::Enum(EnumValue::new(decl, v)))
    })
}

/// Declared event of a class
#[derive(Debug, Clone)]
pub struct EventDecl {
    /// Event name
    pub name: String,
    /// Parameters delivered to every handler
    pub params: Vec<ParamSpec>,
}

/// Registered class
pub struct ClassDescriptor {
    pub(crate) id: ClassId,
    pub(crate) name: Rc<str>,
    pub(crate) base: Option<ClassId>,
    pub(crate) kind: ClassKind,
    pub(crate) mixins: Vec<TraitDescriptor>,
    pub(crate) constants: Vec<(String, Variant)>,
    pub(crate) enums: Vec<Arc<EnumDecl>>,
    pub(crate) methods: FxHashMap<String, MethodDescriptor>,
    pub(crate) constructors: Vec<Rc<Overload>>,
    pub(crate) events: Vec<EventDecl>,
    pub(crate) lazy: Option<CtorFn>,
    pub(crate) overrides: Option<Rc<OverrideTable>>,
}

impl ClassDescriptor {
    /// Class id
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared class name
    pub fn name_rc(&self) -> Rc<str> {
        Rc::clone(&self.name)
    }

    /// Direct base class
    pub fn base(&self) -> Option<ClassId> {
        self.base
    }

    /// Crossing semantics
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Whether the class was defined by the host with overrides
    pub fn is_host_subclass(&self) -> bool {
        self.overrides.is_some()
    }

    /// Own method descriptor
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Own method names, sorted
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base", &self.base)
            .field("kind", &self.kind)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Overloads gathered for one call site
#[derive(Debug, Clone)]
pub struct Candidates {
    /// Name of the nearest class declaring the method
    pub owner: Rc<str>,
    /// Overloads, nearest class first, each class in declaration order
    pub overloads: Vec<Rc<Overload>>,
}

/// Table of registered classes
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassDescriptor>,
    by_name: FxHashMap<String, ClassId>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next registered class will receive
    pub fn next_id(&self) -> ClassId {
        ClassId(self.classes.len() as u32)
    }

    /// Add a class; names must be unique
    pub fn register(&mut self, desc: ClassDescriptor) -> BindResult<ClassId> {
        if self.by_name.contains_key(desc.name()) {
            return Err(BindError::native(format!(
                "Class {} is already registered",
                desc.name()
            )));
        }
        let id = desc.id;
        self.by_name.insert(desc.name().to_string(), id);
        self.classes.push(desc);
        Ok(id)
    }

    /// Descriptor by id
    pub fn get(&self, id: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(id.index())
    }

    /// Descriptor by id, failing with `NoSuchClass`
    pub fn descriptor(&self, id: ClassId) -> BindResult<&ClassDescriptor> {
        self.get(id)
            .ok_or_else(|| BindError::NoSuchClass(format!("#{}", id.0)))
    }

    /// Id by name
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Id by name, failing with `NoSuchClass`
    pub fn require(&self, name: &str) -> BindResult<ClassId> {
        self.lookup(name)
            .ok_or_else(|| BindError::NoSuchClass(name.to_string()))
    }

    /// Name of a class (empty for unknown ids)
    pub fn name_of(&self, id: ClassId) -> &str {
        self.get(id).map(|c| c.name()).unwrap_or("")
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The class followed by its base chain
    pub fn ancestors(&self, id: ClassId) -> impl Iterator<Item = &ClassDescriptor> + '_ {
        std::iter::successors(self.get(id), move |c| c.base.and_then(|b| self.get(b)))
    }

    /// Whether `id` is `ancestor` or derives from it
    pub fn is_subclass_of(&self, id: ClassId, ancestor: ClassId) -> bool {
        self.ancestors(id).any(|c| c.id == ancestor)
    }

    /// Every class deriving from `id`, including `id` itself
    pub fn descendants(&self, id: ClassId) -> Vec<ClassId> {
        self.classes
            .iter()
            .filter(|c| self.is_subclass_of(c.id, id))
            .map(|c| c.id)
            .collect()
    }

    /// Overloads of a method visible from `id`
    pub fn find_method(&self, id: ClassId, name: &str) -> Option<Candidates> {
        let mut owner: Option<Rc<str>> = None;
        let mut overloads = Vec::new();
        for class in self.ancestors(id) {
            if let Some(method) = class.methods.get(name) {
                owner.get_or_insert_with(|| class.name_rc());
                overloads.extend(method.overloads.iter().cloned());
            }
        }
        owner.map(|owner| Candidates { owner, overloads })
    }

    /// Whether a virtual overload of `name` is visible from `id`
    pub fn is_virtual(&self, id: ClassId, name: &str) -> bool {
        self.ancestors(id)
            .filter_map(|c| c.methods.get(name))
            .any(MethodDescriptor::is_virtual)
    }

    /// Constructors of the nearest class declaring any
    pub fn find_constructors(&self, id: ClassId) -> Option<Candidates> {
        self.ancestors(id)
            .find(|c| !c.constructors.is_empty())
            .map(|c| Candidates {
                owner: c.name_rc(),
                overloads: c.constructors.clone(),
            })
    }

    /// Deferred default constructor of the nearest lazy class
    pub fn find_lazy(&self, id: ClassId) -> Option<CtorFn> {
        self.ancestors(id).find_map(|c| c.lazy.clone())
    }

    /// Event declaration visible from `id`
    pub fn find_event(&self, id: ClassId, name: &str) -> Option<&EventDecl> {
        self.ancestors(id)
            .find_map(|c| c.events.iter().find(|e| e.name == name))
    }

    /// Override table of the instance's dynamic class
    pub fn overrides(&self, id: ClassId) -> Option<Rc<OverrideTable>> {
        self.get(id).and_then(|c| c.overrides.clone())
    }

    /// Constant visible from `id`
    pub fn constant(&self, id: ClassId, name: &str) -> Option<Variant> {
        self.ancestors(id).find_map(|class| {
            lookup_constant(&class.constants, &class.enums, name)
                .or_else(|| class.mixins.iter().find_map(|m| m.constant(name)))
        })
    }

    /// Enum declaration visible from `id`
    pub fn enum_decl(&self, id: ClassId, name: &str) -> Option<Arc<EnumDecl>> {
        self.ancestors(id).find_map(|class| {
            class
                .enums
                .iter()
                .find(|d| d.name() == name)
                .cloned()
                .or_else(|| class.mixins.iter().find_map(|m| m.enum_decl(name)))
        })
    }
}
