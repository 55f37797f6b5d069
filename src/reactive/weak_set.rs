//! Weak-set store - observable membership over weakly-held objects.
//!
//! Only object values can be members; mutating with any other value fails
//! with [`Error::InvalidKey`] and leaves the set untouched. Membership tests
//! are total: a non-object is simply never a member. Members are held
//! through `Weak` references, so dropping the last strong reference to an
//! object silently ends its membership; dead entries are pruned on access.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::listener::{Change, ListenerCell};
use crate::error::Error;
use crate::value::Value;

/// The raw container behind a weak-set store.
pub type RawWeakSet = Rc<RefCell<Vec<Weak<RefCell<BTreeMap<String, Value>>>>>>;

struct WeakSetCell {
    raw: RawWeakSet,
    listeners: ListenerCell,
}

/// Observable weak-set container. Cloning clones the handle, not the data.
#[derive(Clone)]
pub struct ReactiveWeakSet {
    inner: Rc<RefCell<WeakSetCell>>,
}

impl ReactiveWeakSet {
    pub fn new(raw: RawWeakSet, listeners: ListenerCell) -> Self {
        Self {
            inner: Rc::new(RefCell::new(WeakSetCell { raw, listeners })),
        }
    }

    /// The unwrapped container.
    pub fn raw(&self) -> RawWeakSet {
        self.inner.borrow().raw.clone()
    }

    pub fn listeners(&self) -> ListenerCell {
        self.inner.borrow().listeners.clone()
    }

    /// Insert an object member. Fails with `InvalidKey` for non-objects.
    /// Notifies only when membership changed.
    pub fn add(&self, element: &Value) -> Result<bool, Error> {
        let Value::Object(target) = element else {
            return Err(Error::InvalidKey);
        };
        let listeners = {
            let cell = self.inner.borrow();
            let mut raw = cell.raw.borrow_mut();
            prune(&mut raw);
            if raw.iter().any(|w| member_matches(w, target)) {
                return Ok(false);
            }
            raw.push(Rc::downgrade(target));
            cell.listeners.clone()
        };
        listeners.notify(&Change::Added {
            element: element.clone(),
        });
        Ok(true)
    }

    /// Remove an object member. Fails with `InvalidKey` for non-objects.
    /// Notifies only when membership changed.
    pub fn delete(&self, element: &Value) -> Result<bool, Error> {
        let Value::Object(target) = element else {
            return Err(Error::InvalidKey);
        };
        let listeners = {
            let cell = self.inner.borrow();
            let mut raw = cell.raw.borrow_mut();
            prune(&mut raw);
            let Some(position) = raw.iter().position(|w| member_matches(w, target)) else {
                return Ok(false);
            };
            raw.remove(position);
            cell.listeners.clone()
        };
        listeners.notify(&Change::Removed {
            element: element.clone(),
        });
        Ok(true)
    }

    /// Membership test. Non-object values are never members.
    pub fn has(&self, element: &Value) -> bool {
        let Value::Object(target) = element else {
            return false;
        };
        let cell = self.inner.borrow();
        let raw = cell.raw.borrow();
        raw.iter().any(|w| member_matches(w, target))
    }

    /// Count of live members (prunes dead entries).
    pub fn len(&self) -> usize {
        let cell = self.inner.borrow();
        let mut raw = cell.raw.borrow_mut();
        prune(&mut raw);
        raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn member_matches(
    entry: &Weak<RefCell<BTreeMap<String, Value>>>,
    target: &Rc<RefCell<BTreeMap<String, Value>>>,
) -> bool {
    entry
        .upgrade()
        .is_some_and(|live| Rc::ptr_eq(&live, target))
}

fn prune(entries: &mut Vec<Weak<RefCell<BTreeMap<String, Value>>>>) {
    entries.retain(|w| w.strong_count() > 0);
}

// =============================================================================
// Tests
// =============================================================================
