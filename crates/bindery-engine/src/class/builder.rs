//! Fluent class declaration
//!
//! ```ignore
//! let class = ClassBuilder::new("A")
//!     .constructor(Signature::new(), |_| Ok(Box::new(AState::default())))
//!     .method("a1_plus", Signature::new().with_param("d", ParamType::int()).with_default(1)
//!         .returns(ParamType::int()).as_const(), |call| { ... })
//!     .attribute("a1", ParamType::int(), get_a1, set_a1);
//! runtime.register_class(class)?;
//! ```

use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use bindery_sdk::{BindError, BindResult, ClassId, EnumDecl, NativeObject, Variant};

use super::method::{
    CtorFn, IterFn, MethodBody, MethodDescriptor, NativeCall, NativeFn, NativeIter, Overload,
};
use super::signature::{ParamSpec, ParamType, Signature};
use super::{ClassDescriptor, ClassKind, ClassRegistry, EventDecl, TraitDescriptor};

/// Builder for a native class
pub struct ClassBuilder {
    name: String,
    base: Option<String>,
    kind: ClassKind,
    mixins: Vec<TraitDescriptor>,
    constants: Vec<(String, Variant)>,
    enums: Vec<Arc<EnumDecl>>,
    methods: Vec<(String, Overload)>,
    constructors: Vec<Overload>,
    events: Vec<EventDecl>,
    lazy: Option<CtorFn>,
}

impl ClassBuilder {
    /// Start declaring a class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            kind: ClassKind::Object,
            mixins: Vec::new(),
            constants: Vec::new(),
            enums: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            events: Vec::new(),
            lazy: None,
        }
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derive from an already registered class
    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.base = Some(name.into());
        self
    }

    /// Select crossing semantics
    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    /// Include a constants/enums mixin
    pub fn mixin(mut self, mixin: TraitDescriptor) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// Declare a class constant
    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.constants.push((name.into(), value.into()));
        self
    }

    /// Declare an enum scoped to this class
    pub fn enum_decl(mut self, decl: Arc<EnumDecl>) -> Self {
        self.enums.push(decl);
        self
    }

    /// Add a constructor overload
    pub fn constructor<F>(mut self, sig: Signature, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> BindResult<Box<dyn NativeObject>> + 'static,
    {
        let body: CtorFn = Rc::new(f);
        self.constructors.push(Overload {
            sig,
            body: MethodBody::Constructor(body),
        });
        self
    }

    /// Add an instance method overload
    pub fn method<F>(mut self, name: impl Into<String>, sig: Signature, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> BindResult<Variant> + 'static,
    {
        let body: NativeFn = Rc::new(f);
        self.methods.push((
            name.into(),
            Overload {
                sig,
                body: MethodBody::Native(body),
            },
        ));
        self
    }

    /// Add a static method overload
    pub fn static_method<F>(self, name: impl Into<String>, sig: Signature, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> BindResult<Variant> + 'static,
    {
        self.method(name, sig.as_static(), f)
    }

    /// Add an enumerable method driven with a host block
    pub fn iterator<F>(mut self, name: impl Into<String>, sig: Signature, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> BindResult<NativeIter> + 'static,
    {
        let body: IterFn = Rc::new(f);
        self.methods.push((
            name.into(),
            Overload {
                sig,
                body: MethodBody::Iterator(body),
            },
        ));
        self
    }

    /// Add the `x` / `x=` pair, plus `x?` for boolean attributes
    pub fn attribute<G, S>(self, name: &str, ty: ParamType, get: G, set: S) -> Self
    where
        G: Fn(&mut NativeCall<'_>) -> BindResult<Variant> + 'static,
        S: Fn(&mut NativeCall<'_>, Variant) -> BindResult<()> + 'static,
    {
        let get: NativeFn = Rc::new(get);
        let getter_sig = Signature::new().returns(ty.clone()).as_const();
        let setter_sig = Signature::new().with_param("value", ty.clone());

        let predicate = (ty == ParamType::Bool).then(|| Rc::clone(&get));
        let getter = Rc::clone(&get);
        let mut builder = self
            .method(name, getter_sig.clone(), move |call: &mut NativeCall<'_>| {
                getter(call)
            })
            .method(
                format!("{}=", name),
                setter_sig,
                move |call: &mut NativeCall<'_>| {
                    let value = call.arg(0);
                    set(call, value)?;
                    Ok(Variant::Nil)
                },
            );
        if let Some(get) = predicate {
            builder = builder.method(
                format!("{}?", name),
                getter_sig,
                move |call: &mut NativeCall<'_>| get(call),
            );
        }
        builder
    }

    /// Declare an event
    pub fn event(mut self, name: impl Into<String>, params: Vec<ParamSpec>) -> Self {
        self.events.push(EventDecl {
            name: name.into(),
            params,
        });
        self
    }

    /// Defer allocation of argument-less constructions until first use
    pub fn lazy<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> BindResult<Box<dyn NativeObject>> + 'static,
    {
        self.lazy = Some(Rc::new(f));
        self
    }

    /// Freeze into a descriptor with the given id
    pub fn build(self, id: ClassId, classes: &ClassRegistry) -> BindResult<ClassDescriptor> {
        let base = match &self.base {
            Some(name) => Some(classes.require(name)?),
            None => None,
        };
        let mut methods: FxHashMap<String, MethodDescriptor> = FxHashMap::default();
        for (name, overload) in self.methods {
            if overload.sig.is_virtual && overload.sig.is_static {
                return Err(BindError::native(format!(
                    "Static method {}::{} cannot be virtual",
                    self.name, name
                )));
            }
            methods
                .entry(name.clone())
                .or_insert_with(|| MethodDescriptor::new(name))
                .overloads
                .push(Rc::new(overload));
        }
        Ok(ClassDescriptor {
            id,
            name: Rc::from(self.name.as_str()),
            base,
            kind: self.kind,
            mixins: self.mixins,
            constants: self.constants,
            enums: self.enums,
            methods,
            constructors: self.constructors.into_iter().map(Rc::new).collect(),
            events: self.events,
            lazy: self.lazy,
            overrides: None,
        })
    }
}
