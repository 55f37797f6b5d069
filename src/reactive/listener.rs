//! Listener cells - redirectable mutation listeners for reactive stores.
//!
//! A [`ListenerCell`] is the mutable reference a store is constructed with.
//! Consumers (normally the hooks runtime) add and remove listeners at any
//! time without re-wrapping the container; the store itself never removes a
//! listener - cleanup is the consumer's responsibility.
//!
//! Notification is synchronous and happens after the raw mutation has been
//! applied. The listener list is snapshotted before invocation, so a listener
//! may mutate the same cell (or the same store) re-entrantly; such writes are
//! observed as new notifications, never as recursion into a held borrow.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

// =============================================================================
// Change descriptions
// =============================================================================

/// What a single store write changed.
#[derive(Debug, Clone)]
pub enum Change {
    /// Object store: a property was written (fires even when the new value
    /// equals the old one).
    PropertySet { key: String, value: Value },
    /// Object store: a property was removed.
    PropertyDelete { key: String },
    /// Set / weak-set store: an element became a member.
    Added { element: Value },
    /// Set / weak-set store: an element stopped being a member.
    Removed { element: Value },
}

impl Change {
    /// The property key, for object-store changes.
    pub fn key(&self) -> Option<&str> {
        match self {
            Change::PropertySet { key, .. } | Change::PropertyDelete { key } => Some(key),
            _ => None,
        }
    }
}

// =============================================================================
// Listener cell
// =============================================================================

/// A mutation callback.
pub type Listener = Rc<dyn Fn(&Change)>;

/// Handle for removing a previously added listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerSlab {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

/// Shared, redirectable set of listeners.
///
/// Cloning the cell clones the handle, not the listeners: every clone sees
/// the same listener set.
#[derive(Clone)]
pub struct ListenerCell {
    inner: Rc<RefCell<ListenerSlab>>,
}

impl ListenerCell {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListenerSlab {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Add a listener; returns an id for later removal.
    pub fn add(&self, listener: Listener) -> ListenerId {
        let mut slab = self.inner.borrow_mut();
        let id = ListenerId(slab.next_id);
        slab.next_id += 1;
        slab.entries.push((id, listener));
        id
    }

    /// Remove a listener by id. Returns whether it was present.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut slab = self.inner.borrow_mut();
        let before = slab.entries.len();
        slab.entries.retain(|(entry_id, _)| *entry_id != id);
        slab.entries.len() != before
    }

    /// Replace every current listener with `listener`.
    pub fn redirect(&self, listener: Listener) -> ListenerId {
        self.inner.borrow_mut().entries.clear();
        self.add(listener)
    }

    /// Drop all listeners.
    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every current listener with `change`.
    ///
    /// The list is snapshotted first so listeners may add/remove listeners
    /// or trigger further writes without hitting a borrow conflict.
    pub fn notify(&self, change: &Change) {
        let snapshot: Vec<Listener> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in snapshot {
            listener(change);
        }
    }
}

impl Default for ListenerCell {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
