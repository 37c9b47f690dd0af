//! Object handles: host-visible proxies for native instances
//!
//! A handle names an arena slot plus the generation stamp the slot had when
//! the handle was issued. Liveness is decided by comparing that stamp with the
//! slot's current generation, never by address.
//!
//! # Reference counting
//!
//! ```text
//! ObjectHandle ──Rc──▶ Proxy ──Rc──▶ Anchor { slot, generation }
//!                        ▲                ▲
//!   registry keeps Weak<Proxy>     registry keeps Weak<Anchor>
//! ```
//!
//! Every clone of a handle shares one `Proxy`; every proxy of one instance
//! shares one `Anchor`. The registry holds only weak references, so when the
//! last host handle is dropped the anchor's strong count reaches zero and a
//! Managed instance becomes eligible for the next reclaim sweep.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identifier of a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Index into the class table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Liveness anchor shared by every proxy of one instance
#[derive(Debug)]
pub struct Anchor {
    slot: u32,
    generation: u32,
}

impl Anchor {
    /// Arena slot index
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Generation stamp at issue time
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// The host-side object: one per instance for identity-preserving classes
#[derive(Debug)]
pub struct Proxy {
    anchor: Rc<Anchor>,
    class: ClassId,
    class_name: Rc<str>,
    is_const: Cell<bool>,
}

impl Proxy {
    /// Whether every handle sharing this proxy is a const view
    pub fn is_const(&self) -> bool {
        self.is_const.get()
    }

    /// Change the const flag for every handle sharing this proxy
    pub fn set_const(&self, is_const: bool) {
        self.is_const.set(is_const);
    }

    /// Liveness anchor of the instance
    pub fn anchor(&self) -> &Rc<Anchor> {
        &self.anchor
    }
}

/// Host-visible reference to a native instance
#[derive(Clone)]
pub struct ObjectHandle {
    proxy: Rc<Proxy>,
    const_view: bool,
}

impl ObjectHandle {
    /// Issue a handle with a fresh anchor and proxy
    pub fn new(
        slot: u32,
        generation: u32,
        class: ClassId,
        class_name: Rc<str>,
        is_const: bool,
    ) -> Self {
        let anchor = Rc::new(Anchor { slot, generation });
        Self::with_anchor(anchor, class, class_name, is_const)
    }

    /// Issue a handle with a new proxy on an existing anchor
    pub fn with_anchor(anchor: Rc<Anchor>, class: ClassId, class_name: Rc<str>, is_const: bool) -> Self {
        ObjectHandle {
            proxy: Rc::new(Proxy {
                anchor,
                class,
                class_name,
                is_const: Cell::new(is_const),
            }),
            const_view: false,
        }
    }

    /// Re-issue a handle for an existing proxy (identity preserved)
    pub fn from_proxy(proxy: Rc<Proxy>) -> Self {
        ObjectHandle {
            proxy,
            const_view: false,
        }
    }

    /// Arena slot index
    pub fn slot(&self) -> u32 {
        self.proxy.anchor.slot
    }

    /// Generation stamp at issue time
    pub fn generation(&self) -> u32 {
        self.proxy.anchor.generation
    }

    /// Dynamic class of the instance
    pub fn class(&self) -> ClassId {
        self.proxy.class
    }

    /// Name of the dynamic class
    pub fn class_name(&self) -> &str {
        &self.proxy.class_name
    }

    /// Whether mutating calls are forbidden through this handle
    pub fn is_const(&self) -> bool {
        self.const_view || self.proxy.is_const()
    }

    /// A const view of the same instance that leaves this handle untouched
    pub fn as_const(&self) -> Self {
        ObjectHandle {
            proxy: Rc::clone(&self.proxy),
            const_view: true,
        }
    }

    /// The shared proxy
    pub fn proxy(&self) -> &Rc<Proxy> {
        &self.proxy
    }

    /// The shared liveness anchor
    pub fn anchor(&self) -> &Rc<Anchor> {
        &self.proxy.anchor
    }

    /// A non-owning reference suitable for storing in native state
    pub fn instance_ref(&self) -> InstanceRef {
        InstanceRef {
            slot: self.slot(),
            generation: self.generation(),
        }
    }

    /// Identity comparison (`equal?`): same slot and generation
    pub fn same_object(&self, other: &ObjectHandle) -> bool {
        self.slot() == other.slot() && self.generation() == other.generation()
    }

    /// Whether both handles share one host proxy
    pub fn same_proxy(&self, other: &ObjectHandle) -> bool {
        Rc::ptr_eq(&self.proxy, &other.proxy)
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectHandle({}{}:{}.{})",
            if self.is_const() { "const " } else { "" },
            self.class_name(),
            self.slot(),
            self.generation()
        )
    }
}

/// Borrowed native pointer to an instance
///
/// Does not keep the instance alive; native code upgrades it through the
/// runtime, which yields nothing once the instance has been destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    /// Arena slot index
    pub slot: u32,
    /// Generation stamp at issue time
    pub generation: u32,
}
