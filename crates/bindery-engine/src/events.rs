//! Per-instance multicast event slots
//!
//! An [`EventSlot`] is an ordered set of host callables keyed by identity.
//! Triggering runs every handler once, in insertion order, with no isolation:
//! the first failing handler aborts the remaining dispatch and its error is
//! returned to whoever triggered the event.

use crate::dispatch::HostCallable;

/// Ordered, identity-deduplicated handler list
#[derive(Debug, Clone, Default)]
pub struct EventSlot {
    handlers: Vec<HostCallable>,
}

impl EventSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all handlers with `f`
    pub fn set(&mut self, f: HostCallable) {
        self.handlers.clear();
        self.handlers.push(f);
    }

    /// Append `f` unless the same callable is already connected
    pub fn add(&mut self, f: HostCallable) {
        if !self.contains(&f) {
            self.handlers.push(f);
        }
    }

    /// Disconnect the first handler identical to `f`
    pub fn remove(&mut self, f: &HostCallable) {
        if let Some(pos) = self.handlers.iter().position(|h| h.same(f)) {
            self.handlers.remove(pos);
        }
    }

    /// Disconnect everything
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Whether `f` is connected
    pub fn contains(&self, f: &HostCallable) -> bool {
        self.handlers.iter().any(|h| h.same(f))
    }

    /// Number of connected handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is connected
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Snapshot of the handlers, taken before dispatch so handlers may
    /// reconnect while running
    pub fn snapshot(&self) -> Vec<HostCallable> {
        self.handlers.clone()
    }
}
