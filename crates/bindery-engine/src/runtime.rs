//! The runtime facade
//!
//! [`Runtime`] owns the class table, the instance registry, singleton slots
//! and the dispatch frame stack. Every host-facing operation goes through it:
//!
//! ```text
//! call ──▶ liveness ──▶ lazy materialize ──▶ const filter ──▶ resolve
//!      ──▶ prepare args ──▶ override? ──▶ native body ──▶ write back
//!      ──▶ marshal return
//! ```
//!
//! Everything runs on the caller's thread. Managed instances are only ever
//! destroyed at [`Runtime::reclaim`] (or an automatic sweep at construction
//! time), never in the middle of a call.

use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use bindery_sdk::{
    BindError, BindResult, ClassId, EnumDecl, InstanceRef, NativeObject, ObjectHandle, Variant,
};

use crate::class::method::{MethodBody, NativeCall, NativeIter, Overload};
use crate::class::signature::{ParamSpec, ReturnType};
use crate::class::{Candidates, ClassBuilder, ClassRegistry};
use crate::defaults::MAX_RECLAIM_PASSES;
use crate::dispatch::{Frame, HostCall, HostCallable, IterControl, OverrideTable};
use crate::events::EventSlot;
use crate::marshal::convert_value;
use crate::options::RuntimeOptions;
use crate::registry::{
    Constness, HandleState, InstanceRegistry, Keep, NewInstance, SingletonSlot,
};
use crate::resolve::{resolve, Binding, CallArgs};

/// An overload picked for a call site
struct Selected {
    overload: Rc<Overload>,
    binding: Binding,
    owner: Rc<str>,
}

/// The binding runtime
pub struct Runtime {
    pub(crate) options: RuntimeOptions,
    pub(crate) classes: ClassRegistry,
    pub(crate) instances: InstanceRegistry,
    singletons: FxHashMap<(ClassId, String), SingletonSlot>,
    frames: Vec<Frame>,
    host_depth: usize,
    constructions: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with default options
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    /// Create a runtime with explicit options
    pub fn with_options(options: RuntimeOptions) -> Self {
        Self {
            options,
            classes: ClassRegistry::new(),
            instances: InstanceRegistry::new(),
            singletons: FxHashMap::default(),
            frames: Vec::new(),
            host_depth: 0,
            constructions: 0,
        }
    }

    /// Active options
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// The class table
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Register a native class; its base must already be registered
    pub fn register_class(&mut self, builder: ClassBuilder) -> BindResult<ClassId> {
        let desc = builder.build(self.classes.next_id(), &self.classes)?;
        debug!(class = %desc.name(), id = desc.id().0, "registered class");
        self.classes.register(desc)
    }

    /// Id of a registered class
    pub fn class_id(&self, name: &str) -> BindResult<ClassId> {
        self.classes.require(name)
    }

    /// Define a host subclass whose instances route the named virtual
    /// methods to host callables
    pub fn define_subclass<I, S>(&mut self, name: &str, base: &str, overrides: I) -> BindResult<ClassId>
    where
        I: IntoIterator<Item = (S, HostCallable)>,
        S: Into<String>,
    {
        let base_id = self.classes.require(base)?;
        let base_desc = self.classes.descriptor(base_id)?;
        let kind = base_desc.kind();
        let mut table = base_desc
            .overrides
            .as_deref()
            .cloned()
            .unwrap_or_else(OverrideTable::new);

        for (method, f) in overrides {
            let method = method.into();
            if !self.classes.is_virtual(base_id, &method) {
                return Err(BindError::NoSuchMethod {
                    class: base.to_string(),
                    method,
                });
            }
            table.insert(method, f);
        }

        let mut desc = ClassBuilder::new(name)
            .base(base)
            .kind(kind)
            .build(self.classes.next_id(), &self.classes)?;
        debug!(class = name, base, overrides = table.len(), "defined host subclass");
        desc.overrides = Some(Rc::new(table));
        self.classes.register(desc)
    }

    /// Constant visible from a class: own, then mixins, then base chain
    pub fn constant(&self, class: ClassId, name: &str) -> BindResult<Variant> {
        self.classes
            .constant(class, name)
            .ok_or_else(|| BindError::NoSuchMethod {
                class: self.classes.name_of(class).to_string(),
                method: name.to_string(),
            })
    }

    /// Enum declaration visible from a class
    pub fn enum_decl(&self, class: ClassId, name: &str) -> BindResult<Arc<EnumDecl>> {
        self.classes.enum_decl(class, name).ok_or_else(|| {
            BindError::NoSuchClass(format!("{}::{}", self.classes.name_of(class), name))
        })
    }

    // ========================================================================
    // Construction and lifetime
    // ========================================================================

    /// Construct an instance (`new`)
    pub fn construct(&mut self, class: ClassId, args: impl Into<CallArgs>) -> BindResult<ObjectHandle> {
        let mut args = args.into();
        self.construct_with(class, &mut args)
    }

    /// Construct with keyword arguments and out-parameter write-back
    pub fn construct_with(&mut self, class: ClassId, args: &mut CallArgs) -> BindResult<ObjectHandle> {
        let desc = self.classes.descriptor(class)?;
        let class_name = desc.name_rc();
        let kind = desc.kind();
        let overrides = self.classes.overrides(class);

        if args.is_empty() && self.classes.find_lazy(class).is_some() {
            self.count_construction();
            let handle = self.instances.register(NewInstance {
                class,
                class_name,
                kind,
                native: None,
                keep: Keep::Managed,
                overrides,
            })?;
            debug!(class = %handle.class_name(), slot = handle.slot(), "registered deferred instance");
            return Ok(handle);
        }

        let Candidates { owner, overloads } =
            self.classes
                .find_constructors(class)
                .ok_or_else(|| BindError::NoSuchMethod {
                    class: class_name.to_string(),
                    method: "new".to_string(),
                })?;
        let binding = resolve(&self.classes, &self.instances, &owner, "new", &overloads, args)?;
        let overload = Rc::clone(&overloads[binding.index]);
        let Binding { values, sources, .. } = binding;
        let values = self.prepare_args(&overload.sig.params, values)?;
        let MethodBody::Constructor(ctor) = &overload.body else {
            return Err(BindError::native(format!("{}::new is not a constructor", owner)));
        };

        let (native, updated) = self.run_native(None, values, |call| ctor(call));
        let native = native?;
        Self::write_back(&overload.sig.params, &sources, &updated, args);

        self.count_construction();
        let handle = self.instances.register(NewInstance {
            class,
            class_name,
            kind,
            native: Some(native),
            keep: Keep::Managed,
            overrides,
        })?;
        debug!(class = %handle.class_name(), slot = handle.slot(), generation = handle.generation(), "registered instance");
        Ok(handle)
    }

    /// Register native state created by native code
    pub fn create_object(
        &mut self,
        class: ClassId,
        native: Box<dyn NativeObject>,
        keep: Keep,
    ) -> BindResult<ObjectHandle> {
        let desc = self.classes.descriptor(class)?;
        let new = NewInstance {
            class,
            class_name: desc.name_rc(),
            kind: desc.kind(),
            native: Some(native),
            keep,
            overrides: self.classes.overrides(class),
        };
        let handle = self.instances.register(new)?;
        trace!(class = %handle.class_name(), slot = handle.slot(), "native code created instance");
        Ok(handle)
    }

    /// Register a Managed instance of a class by name
    pub fn new_object(&mut self, class: &str, native: Box<dyn NativeObject>) -> BindResult<ObjectHandle> {
        let id = self.classes.require(class)?;
        self.create_object(id, native, Keep::Managed)
    }

    fn count_construction(&mut self) {
        let threshold = self.options.auto_reclaim_threshold;
        if threshold == 0 || !self.frames.is_empty() {
            return;
        }
        self.constructions += 1;
        if self.constructions >= threshold {
            self.reclaim();
        }
    }

    /// Destroy an instance; a second destroy raises `UseAfterFree`
    pub fn destroy(&mut self, handle: &ObjectHandle) -> BindResult<()> {
        let inst = self.instances.destroy(handle)?;
        debug!(class = %handle.class_name(), slot = handle.slot(), "destroyed instance");
        drop(inst);
        Ok(())
    }

    /// Liveness probe; never fails
    pub fn is_destroyed(&self, handle: &ObjectHandle) -> bool {
        self.instances.is_destroyed(handle)
    }

    /// Make an instance eligible for reclaim again
    pub fn manage(&mut self, handle: &ObjectHandle) -> BindResult<()> {
        self.instances.set_keep(handle, Keep::Managed, "_manage")
    }

    /// Freeze an instance against reclaim
    pub fn unmanage(&mut self, handle: &ObjectHandle) -> BindResult<()> {
        self.instances.set_keep(handle, Keep::Unmanaged, "_unmanage")
    }

    /// Ownership state seen through a handle
    pub fn handle_state(&self, handle: &ObjectHandle) -> HandleState {
        self.instances.handle_state(handle)
    }

    /// Debug rendering: `#<A:3.1>`, `#<const A:3.1>`, `#<A:3.1 (destroyed)>`
    pub fn inspect(&self, handle: &ObjectHandle) -> String {
        format!(
            "#<{}{}:{}.{}{}>",
            if handle.is_const() { "const " } else { "" },
            handle.class_name(),
            handle.slot(),
            handle.generation(),
            if self.is_destroyed(handle) { " (destroyed)" } else { "" }
        )
    }

    /// Live instances whose exact dynamic class is `class`
    pub fn instance_count(&self, class: ClassId) -> usize {
        self.instances.instance_count(class)
    }

    /// Live instances of `class` and every class deriving from it
    pub fn instance_count_with_subclasses(&self, class: ClassId) -> usize {
        self.classes
            .descendants(class)
            .into_iter()
            .map(|c| self.instances.instance_count(c))
            .sum()
    }

    /// Live instances of any class
    pub fn live_count(&self) -> usize {
        self.instances.live_count()
    }

    /// Reclaim point: destroy every Managed instance without host holders
    ///
    /// Destroying an instance can release handles its native state held, so
    /// sweeps repeat until one frees nothing. Returns the number destroyed.
    pub fn reclaim(&mut self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_RECLAIM_PASSES {
            let victims = self.instances.collectable();
            if victims.is_empty() {
                break;
            }
            for victim in victims {
                if let Some(inst) = self.instances.destroy_ref(victim) {
                    trace!(class = %inst.class_name(), slot = victim.slot, "reclaimed instance");
                    total += 1;
                    drop(inst);
                }
            }
        }
        self.constructions = 0;
        debug!(reclaimed = total, live = self.instances.live_count(), "reclaim sweep");
        total
    }

    /// Independent copy: new identity, equal state
    pub fn dup(&mut self, handle: &ObjectHandle) -> BindResult<ObjectHandle> {
        self.materialize(handle, "dup")?;
        let inst = self.instances.resolve(handle, "dup")?;
        let copy = inst
            .native()
            .and_then(|n| n.duplicate())
            .ok_or_else(|| {
                BindError::native(format!("Class {} cannot be copied", handle.class_name()))
            })?;
        let class = inst.class();
        let overrides = inst.overrides().cloned();
        let desc = self.classes.descriptor(class)?;
        self.instances.register(NewInstance {
            class,
            class_name: desc.name_rc(),
            kind: desc.kind(),
            native: Some(copy),
            keep: Keep::Managed,
            overrides,
        })
    }

    /// Overwrite the state of `dst` from `src`
    pub fn assign(&mut self, dst: &ObjectHandle, src: &ObjectHandle) -> BindResult<()> {
        if dst.is_const() {
            return Err(BindError::ConstViolation {
                class: dst.class_name().to_string(),
                method: "assign".to_string(),
            });
        }
        self.materialize(dst, "assign")?;
        self.materialize(src, "assign")?;
        if !self.classes.is_subclass_of(src.class(), dst.class()) {
            return Err(BindError::TypeMismatch {
                expected: dst.class_name().to_string(),
                actual: src.class_name().to_string(),
                index: 1,
                class: dst.class_name().to_string(),
                method: "assign".to_string(),
            });
        }
        if dst.same_object(src) {
            return Ok(());
        }
        let (target, source) = self
            .instances
            .pair_mut(dst.instance_ref(), src.instance_ref())
            .ok_or_else(|| BindError::native("assign: instance state unavailable"))?;
        if target.assign_from(source) {
            Ok(())
        } else {
            Err(BindError::native(format!(
                "Class {} does not support assign",
                dst.class_name()
            )))
        }
    }

    /// Value equality where the class defines it, identity otherwise
    pub fn equals(&mut self, a: &ObjectHandle, b: &ObjectHandle) -> BindResult<bool> {
        self.materialize(a, "==")?;
        self.materialize(b, "==")?;
        let na = self.instances.resolve(a, "==")?.native();
        let nb = self.instances.resolve(b, "==")?.native();
        let by_value = na.zip(nb).and_then(|(x, y)| x.equals(y));
        Ok(by_value.unwrap_or_else(|| a.same_object(b)))
    }

    /// Native state behind a handle
    pub fn native<T: NativeObject>(&mut self, handle: &ObjectHandle) -> BindResult<&T> {
        self.materialize(handle, "native")?;
        self.instances
            .resolve(handle, "native")?
            .native()
            .and_then(|n| n.downcast_ref::<T>())
            .ok_or_else(|| BindError::UnexpectedValue {
                expected: std::any::type_name::<T>().to_string(),
                actual: handle.class_name().to_string(),
            })
    }

    /// Mutable native state behind a handle; const views are rejected
    pub fn native_mut<T: NativeObject>(&mut self, handle: &ObjectHandle) -> BindResult<&mut T> {
        if handle.is_const() {
            return Err(BindError::ConstViolation {
                class: handle.class_name().to_string(),
                method: "native_mut".to_string(),
            });
        }
        self.materialize(handle, "native_mut")?;
        self.instances
            .resolve_mut(handle, "native_mut")?
            .native_mut()
            .and_then(|n| n.downcast_mut::<T>())
            .ok_or_else(|| BindError::UnexpectedValue {
                expected: std::any::type_name::<T>().to_string(),
                actual: handle.class_name().to_string(),
            })
    }

    /// Turn a stored non-owning reference back into a handle
    pub fn upgrade(&mut self, r: InstanceRef) -> Option<ObjectHandle> {
        self.instances.issue(r, Constness::Keep)
    }

    pub(crate) fn issue(&mut self, handle: &ObjectHandle, constness: Constness) -> BindResult<ObjectHandle> {
        self.instances
            .issue(handle.instance_ref(), constness)
            .ok_or_else(|| BindError::UseAfterFree {
                class: handle.class_name().to_string(),
                operation: "return".to_string(),
            })
    }

    fn materialize(&mut self, handle: &ObjectHandle, operation: &str) -> BindResult<()> {
        let inst = self.instances.resolve(handle, operation)?;
        if inst.is_materialized() {
            return Ok(());
        }
        let ctor = self.classes.find_lazy(inst.class()).ok_or_else(|| {
            BindError::native(format!(
                "Class {} has no deferred constructor",
                handle.class_name()
            ))
        })?;
        let (native, _) = self.run_native(None, Vec::new(), |call| ctor(call));
        self.instances.materialize(handle.instance_ref(), native?)?;
        debug!(class = %handle.class_name(), slot = handle.slot(), "materialized deferred instance");
        Ok(())
    }

    // ========================================================================
    // Singletons
    // ========================================================================

    /// Install an instance into a class's named singleton slot (`None` clears)
    pub fn install_singleton(
        &mut self,
        class: ClassId,
        slot: &str,
        value: Option<&ObjectHandle>,
    ) -> BindResult<()> {
        let entry = self.singletons.entry((class, slot.to_string())).or_default();
        if let Some(evicted) = entry.install(&mut self.instances, value)? {
            debug!(class = %evicted.class_name(), slot, "evicted singleton");
        }
        Ok(())
    }

    /// The instance currently installed in a singleton slot
    pub fn singleton(&mut self, class: ClassId, slot: &str) -> Option<ObjectHandle> {
        let entry = self.singletons.get(&(class, slot.to_string()))?;
        entry.current(&mut self.instances)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call an instance method with positional arguments
    pub fn call(
        &mut self,
        recv: &ObjectHandle,
        method: &str,
        args: impl Into<CallArgs>,
    ) -> BindResult<Variant> {
        let mut args = args.into();
        self.invoke(recv, method, &mut args, true)
    }

    /// Call an instance method; out-parameters are written back into `args`
    pub fn call_with(&mut self, recv: &ObjectHandle, method: &str, args: &mut CallArgs) -> BindResult<Variant> {
        self.invoke(recv, method, args, true)
    }

    /// Call the native implementation, bypassing host overrides
    pub fn call_super(
        &mut self,
        recv: &ObjectHandle,
        method: &str,
        args: impl Into<CallArgs>,
    ) -> BindResult<Variant> {
        let mut args = args.into();
        self.invoke(recv, method, &mut args, false)
    }

    /// Call a static method
    pub fn call_static(&mut self, class: ClassId, method: &str, args: impl Into<CallArgs>) -> BindResult<Variant> {
        let mut args = args.into();
        self.call_static_with(class, method, &mut args)
    }

    /// Call a static method with write-back into `args`
    pub fn call_static_with(
        &mut self,
        class: ClassId,
        method: &str,
        args: &mut CallArgs,
    ) -> BindResult<Variant> {
        let class_name = self.classes.name_of(class).to_string();
        let no_method = || BindError::NoSuchMethod {
            class: class_name.clone(),
            method: method.to_string(),
        };
        let Candidates { owner, overloads } =
            self.classes.find_method(class, method).ok_or_else(no_method)?;
        let overloads: Vec<_> = overloads.into_iter().filter(|o| o.sig.is_static).collect();
        if overloads.is_empty() {
            return Err(no_method());
        }
        let binding = resolve(&self.classes, &self.instances, &owner, method, &overloads, args)?;
        let overload = Rc::clone(&overloads[binding.index]);
        if overload.sig.is_protected && self.frames.last() != Some(&Frame::Native) {
            return Err(BindError::ProtectedAccess {
                class: owner.to_string(),
                method: method.to_string(),
            });
        }
        self.trace_selected(&owner, method, &overload);
        self.execute(None, overload, binding, &owner, method, args, false)
    }

    fn invoke(
        &mut self,
        recv: &ObjectHandle,
        method: &str,
        args: &mut CallArgs,
        allow_override: bool,
    ) -> BindResult<Variant> {
        let Selected {
            overload,
            binding,
            owner,
        } = self.select(recv, method, args)?;

        if let MethodBody::Iterator(_) = overload.body {
            let values = self.prepare_args(&overload.sig.params, binding.values)?;
            let iter = self.start_iteration(recv, method, &overload, values)?;
            let mut items = Vec::new();
            for item in iter {
                items.push(self.marshal_return(&overload.sig.ret, item?, &owner, method)?);
            }
            return Ok(Variant::List(items));
        }

        self.execute(Some(recv), overload, binding, &owner, method, args, allow_override)
    }

    fn select(&mut self, recv: &ObjectHandle, method: &str, args: &CallArgs) -> BindResult<Selected> {
        self.materialize(recv, method)?;
        let Candidates { owner, overloads } = self
            .classes
            .find_method(recv.class(), method)
            .ok_or_else(|| BindError::NoSuchMethod {
                class: recv.class_name().to_string(),
                method: method.to_string(),
            })?;
        let mut overloads: Vec<_> = overloads.into_iter().filter(|o| !o.sig.is_static).collect();
        if overloads.is_empty() {
            return Err(BindError::NoSuchMethod {
                class: recv.class_name().to_string(),
                method: method.to_string(),
            });
        }
        if recv.is_const() {
            overloads.retain(|o| o.sig.is_const);
            if overloads.is_empty() {
                return Err(BindError::ConstViolation {
                    class: owner.to_string(),
                    method: method.to_string(),
                });
            }
        }

        let binding = resolve(&self.classes, &self.instances, &owner, method, &overloads, args)?;
        let overload = Rc::clone(&overloads[binding.index]);
        if overload.sig.is_protected && !self.protected_allowed(recv) {
            return Err(BindError::ProtectedAccess {
                class: owner.to_string(),
                method: method.to_string(),
            });
        }
        self.trace_selected(&owner, method, &overload);
        Ok(Selected {
            overload,
            binding,
            owner,
        })
    }

    fn trace_selected(&self, owner: &str, method: &str, overload: &Overload) {
        if self.options.trace_calls {
            trace!(class = owner, signature = %overload.sig.render(method), "resolved call");
        }
    }

    fn protected_allowed(&self, recv: &ObjectHandle) -> bool {
        match self.frames.last() {
            Some(Frame::Native) => true,
            Some(Frame::Override(r)) => *r == recv.instance_ref(),
            _ => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        recv: Option<&ObjectHandle>,
        overload: Rc<Overload>,
        binding: Binding,
        owner: &str,
        method: &str,
        args: &mut CallArgs,
        allow_override: bool,
    ) -> BindResult<Variant> {
        let Binding { values, sources, .. } = binding;
        let params = &overload.sig.params;
        let values = self.prepare_args(params, values)?;

        let host = match recv {
            Some(recv) if allow_override && overload.sig.is_virtual => self
                .instances
                .resolve(recv, method)?
                .overrides()
                .and_then(|table| table.get(method).cloned())
                .map(|f| (recv, f)),
            _ => None,
        };

        let (result, updated) = match (host, &overload.body) {
            (Some((recv, f)), _) => {
                trace!(class = owner, method, "dispatching to host override");
                self.run_override(recv, &f, params, values)
            }
            (None, MethodBody::Native(f)) => self.run_native(recv.cloned(), values, |call| f(call)),
            (None, _) => (
                Err(BindError::native(format!(
                    "{}::{} cannot be called directly",
                    owner, method
                ))),
                Vec::new(),
            ),
        };
        let value = result?;
        Self::write_back(params, &sources, &updated, args);
        // Released before the return is marshaled so a returned by-value
        // argument is handed over without a second copy.
        drop(updated);
        self.marshal_return(&overload.sig.ret, value, owner, method)
    }

    fn run_native<T>(
        &mut self,
        receiver: Option<ObjectHandle>,
        args: Vec<Variant>,
        body: impl FnOnce(&mut NativeCall<'_>) -> BindResult<T>,
    ) -> (BindResult<T>, Vec<Variant>) {
        self.frames.push(Frame::Native);
        let mut call = NativeCall::new(self, receiver, args);
        let result = body(&mut call);
        let args = call.into_args();
        self.frames.pop();
        (result, args)
    }

    fn run_override(
        &mut self,
        recv: &ObjectHandle,
        f: &HostCallable,
        params: &[ParamSpec],
        mut values: Vec<Variant>,
    ) -> (BindResult<Variant>, Vec<Variant>) {
        let outward = Self::outward_args(params, &values);
        let mut call = HostCall::new(Some(recv.clone()), outward.clone());
        let result = self.with_host_frame(Frame::Override(recv.instance_ref()), |rt| {
            f.invoke(rt, &mut call)
        });
        Self::inward_args(&outward, &mut values);
        (result, values)
    }

    fn with_host_frame<T>(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Runtime) -> BindResult<T>,
    ) -> BindResult<T> {
        debug_assert!(frame.is_host());
        if self.host_depth >= self.options.max_dispatch_depth {
            return Err(BindError::native(format!(
                "dispatch depth limit exceeded ({})",
                self.options.max_dispatch_depth
            )));
        }
        self.host_depth += 1;
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        self.host_depth -= 1;
        result
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Drive an enumerable method, invoking `block` once per element
    ///
    /// Returns the value of a `Break`, or the receiver when the iteration ran
    /// to completion. An error from the block stops the iteration and is
    /// returned as is; the native iterator is dropped on every exit path.
    pub fn each<F>(
        &mut self,
        recv: &ObjectHandle,
        method: &str,
        args: impl Into<CallArgs>,
        mut block: F,
    ) -> BindResult<Variant>
    where
        F: FnMut(&mut Runtime, Variant) -> BindResult<IterControl>,
    {
        let args = args.into();
        let Selected {
            overload,
            binding,
            owner,
        } = self.select(recv, method, &args)?;
        let values = self.prepare_args(&overload.sig.params, binding.values)?;
        let iter = self.start_iteration(recv, method, &overload, values)?;
        match self.drive(iter, &overload.sig.ret, &owner, method, &mut block)? {
            Some(value) => Ok(value),
            None => Ok(Variant::Object(recv.clone())),
        }
    }

    fn start_iteration(
        &mut self,
        recv: &ObjectHandle,
        method: &str,
        overload: &Overload,
        values: Vec<Variant>,
    ) -> BindResult<NativeIter> {
        let MethodBody::Iterator(f) = &overload.body else {
            return Err(BindError::native(format!(
                "{}::{} is not enumerable",
                recv.class_name(),
                method
            )));
        };
        let (iter, _) = self.run_native(Some(recv.clone()), values, |call| f(call));
        iter
    }

    fn drive(
        &mut self,
        iter: NativeIter,
        ret: &ReturnType,
        owner: &str,
        method: &str,
        block: &mut dyn FnMut(&mut Runtime, Variant) -> BindResult<IterControl>,
    ) -> BindResult<Option<Variant>> {
        for item in iter {
            let item = self.marshal_return(ret, item?, owner, method)?;
            match self.with_host_frame(Frame::Host, |rt| block(rt, item))? {
                IterControl::Continue => {}
                IterControl::Break(value) => return Ok(Some(value)),
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn event_slot_mut(
        &mut self,
        handle: &ObjectHandle,
        event: &str,
        operation: &str,
    ) -> BindResult<&mut EventSlot> {
        self.materialize(handle, operation)?;
        if self.classes.find_event(handle.class(), event).is_none() {
            return Err(BindError::NoSuchEvent {
                class: handle.class_name().to_string(),
                event: event.to_string(),
            });
        }
        Ok(self.instances.resolve_mut(handle, operation)?.event_slot_mut(event))
    }

    /// Replace all handlers of an event with `f`
    pub fn event_set(&mut self, handle: &ObjectHandle, event: &str, f: HostCallable) -> BindResult<()> {
        self.event_slot_mut(handle, event, "event_set")?.set(f);
        Ok(())
    }

    /// Connect `f` unless already connected
    pub fn event_add(&mut self, handle: &ObjectHandle, event: &str, f: HostCallable) -> BindResult<()> {
        self.event_slot_mut(handle, event, "event_add")?.add(f);
        Ok(())
    }

    /// Disconnect `f`
    pub fn event_remove(&mut self, handle: &ObjectHandle, event: &str, f: &HostCallable) -> BindResult<()> {
        self.event_slot_mut(handle, event, "event_remove")?.remove(f);
        Ok(())
    }

    /// Disconnect every handler
    pub fn event_clear(&mut self, handle: &ObjectHandle, event: &str) -> BindResult<()> {
        self.event_slot_mut(handle, event, "event_clear")?.clear();
        Ok(())
    }

    /// Number of connected handlers
    pub fn event_handler_count(&mut self, handle: &ObjectHandle, event: &str) -> BindResult<usize> {
        Ok(self.event_slot_mut(handle, event, "event_handler_count")?.len())
    }

    /// Run every handler of an event in connection order
    ///
    /// The first failing handler aborts the dispatch; its error is returned.
    pub fn trigger_event(&mut self, handle: &ObjectHandle, event: &str, args: Vec<Variant>) -> BindResult<()> {
        self.materialize(handle, event)?;
        let decl = self
            .classes
            .find_event(handle.class(), event)
            .ok_or_else(|| BindError::NoSuchEvent {
                class: handle.class_name().to_string(),
                event: event.to_string(),
            })?;
        if args.len() != decl.params.len() {
            return Err(BindError::native(format!(
                "Event {}::{} expects {} arguments, got {}",
                handle.class_name(),
                event,
                decl.params.len(),
                args.len()
            )));
        }
        let mut values = Vec::with_capacity(args.len());
        for (i, (param, arg)) in decl.params.iter().zip(&args).enumerate() {
            let (value, _) = convert_value(&self.classes, &self.instances, &param.ty, param.kind, arg)
                .map_err(|_| BindError::ConversionError {
                    expected: param.ty.name(),
                    actual: arg.type_name(),
                    index: i + 1,
                    class: handle.class_name().to_string(),
                    method: event.to_string(),
                })?;
            values.push(value);
        }

        let handlers = self
            .instances
            .resolve(handle, event)?
            .event_slot(event)
            .map(EventSlot::snapshot)
            .unwrap_or_default();
        debug!(class = %handle.class_name(), event, handlers = handlers.len(), "triggering event");
        for handler in handlers {
            let mut call = HostCall::new(Some(handle.clone()), values.clone());
            self.with_host_frame(Frame::Host, |rt| handler.invoke(rt, &mut call))?;
        }
        Ok(())
    }
}
