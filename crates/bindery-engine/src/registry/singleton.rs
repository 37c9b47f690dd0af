//! "Current instance" slots
//!
//! A singleton slot owns the instance installed into it. Installing a new
//! instance evicts the previous occupant, but only while that occupant is
//! still alive and still the installed one; re-installing the current
//! occupant changes nothing. Installing nil clears the slot and destroys the
//! occupant.

use bindery_sdk::{BindResult, InstanceRef, ObjectHandle};

use super::{Constness, InstanceRegistry, Keep, NativeInstance};

/// A slot holding at most one owned instance
#[derive(Debug, Clone, Default)]
pub struct SingletonSlot {
    current: Option<InstanceRef>,
}

impl SingletonSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `next` (or clear with `None`)
    ///
    /// Returns the evicted instance, already removed from the registry, so the
    /// caller can drop it once the registry is consistent.
    pub fn install(
        &mut self,
        registry: &mut InstanceRegistry,
        next: Option<&ObjectHandle>,
    ) -> BindResult<Option<NativeInstance>> {
        let next_ref = next.map(ObjectHandle::instance_ref);
        if next_ref.is_some() && next_ref == self.current {
            return Ok(None);
        }
        if let Some(handle) = next {
            registry.set_keep(handle, Keep::Unmanaged, "install")?;
        }
        let evicted = self
            .current
            .take()
            .and_then(|previous| registry.destroy_ref(previous));
        self.current = next_ref;
        Ok(evicted)
    }

    /// The installed instance, if still alive
    pub fn current(&self, registry: &mut InstanceRegistry) -> Option<ObjectHandle> {
        self.current
            .and_then(|r| registry.issue(r, Constness::NonConst))
    }

    /// Reference to the installed instance, alive or not
    pub fn installed(&self) -> Option<InstanceRef> {
        self.current
    }
}
