//! Instance registry
//!
//! An arena of native instances addressed by slot index plus generation
//! stamp. Destroying an instance bumps its slot's generation, so every handle
//! issued before the destroy is detected as stale even after the slot is
//! reused.
//!
//! The registry never holds a strong reference to a host proxy. It keeps
//! `Weak` links to the proxy (for identity-preserving re-issue) and to the
//! shared anchor (for reclaim): a Managed instance whose anchor has no strong
//! holders left is collectable at the next reclaim point.

pub mod singleton;

use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use bindery_sdk::{
    Anchor, BindError, BindResult, ClassId, InstanceRef, NativeObject, ObjectHandle, Proxy,
};

use crate::class::ClassKind;
use crate::dispatch::OverrideTable;
use crate::events::EventSlot;

pub use singleton::SingletonSlot;

/// Who may destroy an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    /// Destroyed at a reclaim point once no host handle remains
    Managed,
    /// Only destroyed explicitly
    Unmanaged,
}

/// Ownership state observed through a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Live and collectable
    Managed,
    /// Live and frozen against collection
    Unmanaged,
    /// Live, viewed through a const reference
    ConstRef,
    /// The instance is gone
    Detached,
}

/// Const flag requested when issuing a handle for an existing instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constness {
    /// A const view; an existing proxy keeps its own flag
    Const,
    /// A mutable view; an existing const proxy becomes mutable
    NonConst,
    /// Whatever the existing proxy says (mutable for a new proxy)
    Keep,
}

/// One live instance
pub struct NativeInstance {
    class: ClassId,
    class_name: Rc<str>,
    kind: ClassKind,
    native: Option<Box<dyn NativeObject>>,
    keep: Keep,
    anchor: Weak<Anchor>,
    proxy: Weak<Proxy>,
    overrides: Option<Rc<OverrideTable>>,
    events: FxHashMap<String, EventSlot>,
}

impl std::fmt::Debug for NativeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeInstance")
            .field("class", &self.class_name)
            .field("kind", &self.kind)
            .field("keep", &self.keep)
            .field("materialized", &self.native.is_some())
            .field("overridden", &self.overrides.is_some())
            .finish_non_exhaustive()
    }
}

impl NativeInstance {
    /// Exact dynamic class
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Name of the dynamic class
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Native state, if allocated
    pub fn native(&self) -> Option<&(dyn NativeObject + 'static)> {
        self.native.as_deref()
    }

    /// Mutable native state, if allocated
    pub fn native_mut(&mut self) -> Option<&mut (dyn NativeObject + 'static)> {
        self.native.as_deref_mut()
    }

    /// Whether the native state exists (lazy classes defer it)
    pub fn is_materialized(&self) -> bool {
        self.native.is_some()
    }

    /// Ownership state
    pub fn keep(&self) -> Keep {
        self.keep
    }

    /// Host overrides of a host-defined subclass
    pub fn overrides(&self) -> Option<&Rc<OverrideTable>> {
        self.overrides.as_ref()
    }

    /// Event slot, if any handler was ever connected
    pub fn event_slot(&self, name: &str) -> Option<&EventSlot> {
        self.events.get(name)
    }

    /// Event slot, created on demand
    pub fn event_slot_mut(&mut self, name: &str) -> &mut EventSlot {
        self.events.entry(name.to_string()).or_default()
    }

    fn has_host_holders(&self) -> bool {
        self.anchor.strong_count() > 0
    }
}

struct Entry {
    generation: u32,
    instance: Option<NativeInstance>,
}

/// Arena of native instances
#[derive(Default)]
pub struct InstanceRegistry {
    entries: Vec<Entry>,
    free: Vec<u32>,
    counts: FxHashMap<ClassId, usize>,
    live: usize,
}

/// Parameters of a new instance
pub struct NewInstance {
    /// Exact dynamic class
    pub class: ClassId,
    /// Name of the dynamic class
    pub class_name: Rc<str>,
    /// Crossing semantics of the class
    pub kind: ClassKind,
    /// Native state (`None` defers allocation)
    pub native: Option<Box<dyn NativeObject>>,
    /// Initial ownership
    pub keep: Keep,
    /// Host overrides of the dynamic class
    pub overrides: Option<Rc<OverrideTable>>,
}

impl InstanceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new instance and issue its first (mutable) handle
    pub fn register(&mut self, new: NewInstance) -> BindResult<ObjectHandle> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                let slot: u32 = self
                    .entries
                    .len()
                    .try_into()
                    .map_err(|_| BindError::native("instance table overflow"))?;
                self.entries.push(Entry {
                    generation: 0,
                    instance: None,
                });
                slot
            }
        };
        let entry = self
            .entries
            .get_mut(slot as usize)
            .ok_or_else(|| BindError::native("instance slot out of range"))?;

        let handle = ObjectHandle::new(
            slot,
            entry.generation,
            new.class,
            Rc::clone(&new.class_name),
            false,
        );
        if new.native.is_some() {
            *self.counts.entry(new.class).or_insert(0) += 1;
        }
        entry.instance = Some(NativeInstance {
            class: new.class,
            class_name: new.class_name,
            kind: new.kind,
            native: new.native,
            keep: new.keep,
            anchor: Rc::downgrade(handle.anchor()),
            proxy: Rc::downgrade(handle.proxy()),
            overrides: new.overrides,
            events: FxHashMap::default(),
        });
        self.live += 1;
        Ok(handle)
    }

    fn entry(&self, r: InstanceRef) -> Option<&NativeInstance> {
        self.entries
            .get(r.slot as usize)
            .filter(|e| e.generation == r.generation)
            .and_then(|e| e.instance.as_ref())
    }

    fn entry_mut(&mut self, r: InstanceRef) -> Option<&mut NativeInstance> {
        self.entries
            .get_mut(r.slot as usize)
            .filter(|e| e.generation == r.generation)
            .and_then(|e| e.instance.as_mut())
    }

    /// Whether the referenced instance is still alive
    pub fn is_live(&self, r: InstanceRef) -> bool {
        self.entry(r).is_some()
    }

    /// Liveness probe through a handle; never fails
    pub fn is_destroyed(&self, handle: &ObjectHandle) -> bool {
        !self.is_live(handle.instance_ref())
    }

    /// Instance behind a non-owning reference
    pub fn get(&self, r: InstanceRef) -> Option<&NativeInstance> {
        self.entry(r)
    }

    /// Mutable instance behind a non-owning reference
    pub fn get_mut(&mut self, r: InstanceRef) -> Option<&mut NativeInstance> {
        self.entry_mut(r)
    }

    /// Instance behind a handle, failing with `UseAfterFree`
    pub fn resolve(&self, handle: &ObjectHandle, operation: &str) -> BindResult<&NativeInstance> {
        self.entry(handle.instance_ref())
            .ok_or_else(|| use_after_free(handle, operation))
    }

    /// Mutable instance behind a handle, failing with `UseAfterFree`
    pub fn resolve_mut(
        &mut self,
        handle: &ObjectHandle,
        operation: &str,
    ) -> BindResult<&mut NativeInstance> {
        self.entry_mut(handle.instance_ref())
            .ok_or_else(|| use_after_free(handle, operation))
    }

    /// Attach native state to a deferred instance
    pub fn materialize(&mut self, r: InstanceRef, native: Box<dyn NativeObject>) -> BindResult<()> {
        let inst = self
            .entry_mut(r)
            .ok_or_else(|| BindError::native("cannot materialize a destroyed instance"))?;
        if inst.native.is_some() {
            return Ok(());
        }
        inst.native = Some(native);
        let class = inst.class;
        *self.counts.entry(class).or_insert(0) += 1;
        Ok(())
    }

    /// Remove an instance; a second call for the same handle fails
    ///
    /// The removed instance is returned so the caller can drop its native
    /// state after the registry is consistent again.
    pub fn destroy(&mut self, handle: &ObjectHandle) -> BindResult<NativeInstance> {
        self.destroy_ref(handle.instance_ref())
            .ok_or_else(|| use_after_free(handle, "destroy"))
    }

    /// Remove an instance by reference; `None` if already gone
    pub fn destroy_ref(&mut self, r: InstanceRef) -> Option<NativeInstance> {
        let entry = self
            .entries
            .get_mut(r.slot as usize)
            .filter(|e| e.generation == r.generation)?;
        let inst = entry.instance.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(r.slot);
        self.live -= 1;
        if inst.native.is_some() {
            if let Some(count) = self.counts.get_mut(&inst.class) {
                *count = count.saturating_sub(1);
            }
        }
        Some(inst)
    }

    /// Change ownership state
    pub fn set_keep(&mut self, handle: &ObjectHandle, keep: Keep, operation: &str) -> BindResult<()> {
        self.resolve_mut(handle, operation)?.keep = keep;
        Ok(())
    }

    /// Observed ownership state of a handle
    pub fn handle_state(&self, handle: &ObjectHandle) -> HandleState {
        match self.entry(handle.instance_ref()) {
            None => HandleState::Detached,
            Some(_) if handle.is_const() => HandleState::ConstRef,
            Some(inst) => match inst.keep {
                Keep::Managed => HandleState::Managed,
                Keep::Unmanaged => HandleState::Unmanaged,
            },
        }
    }

    /// Live materialized instances of exactly `class`
    pub fn instance_count(&self, class: ClassId) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    /// Live instances of any class, materialized or not
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Issue a handle for an existing instance
    ///
    /// Identity-preserving classes get their existing proxy back when the
    /// host still holds one; value classes always get a fresh proxy.
    pub fn issue(&mut self, r: InstanceRef, constness: Constness) -> Option<ObjectHandle> {
        let inst = self.entry_mut(r)?;
        if inst.kind == ClassKind::Object {
            if let Some(proxy) = inst.proxy.upgrade() {
                let handle = ObjectHandle::from_proxy(proxy);
                return Some(match constness {
                    Constness::Const if !handle.is_const() => handle.as_const(),
                    Constness::NonConst => {
                        handle.proxy().set_const(false);
                        handle
                    }
                    _ => handle,
                });
            }
        }

        let is_const = constness == Constness::Const;
        let handle = match inst.anchor.upgrade() {
            Some(anchor) => {
                ObjectHandle::with_anchor(anchor, inst.class, Rc::clone(&inst.class_name), is_const)
            }
            None => ObjectHandle::new(
                r.slot,
                r.generation,
                inst.class,
                Rc::clone(&inst.class_name),
                is_const,
            ),
        };
        inst.anchor = Rc::downgrade(handle.anchor());
        if inst.kind == ClassKind::Object {
            inst.proxy = Rc::downgrade(handle.proxy());
        }
        Some(handle)
    }

    /// Managed instances no host handle refers to any more
    pub fn collectable(&self) -> Vec<InstanceRef> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, e)| {
                let inst = e.instance.as_ref()?;
                (inst.keep == Keep::Managed && !inst.has_host_holders()).then_some(InstanceRef {
                    slot: slot as u32,
                    generation: e.generation,
                })
            })
            .collect()
    }

    /// Native state of two distinct live instances, the first mutable
    pub fn pair_mut(
        &mut self,
        dst: InstanceRef,
        src: InstanceRef,
    ) -> Option<(&mut (dyn NativeObject + 'static), &(dyn NativeObject + 'static))> {
        if dst.slot == src.slot || !self.is_live(dst) || !self.is_live(src) {
            return None;
        }
        let (d, s) = (dst.slot as usize, src.slot as usize);
        let (dst_entry, src_entry) = if d < s {
            let (lo, hi) = self.entries.split_at_mut(s);
            (&mut lo[d], &hi[0])
        } else {
            let (lo, hi) = self.entries.split_at_mut(d);
            (&mut hi[0], &lo[s])
        };
        let dst_native = dst_entry.instance.as_mut()?.native.as_deref_mut()?;
        let src_native = src_entry.instance.as_ref()?.native.as_deref()?;
        Some((dst_native, src_native))
    }
}

fn use_after_free(handle: &ObjectHandle, operation: &str) -> BindError {
    BindError::UseAfterFree {
        class: handle.class_name().to_string(),
        operation: operation.to_string(),
    }
}
