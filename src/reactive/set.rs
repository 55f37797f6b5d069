//! Set store - an observable membership container.
//!
//! Elements are [`Value`]s; membership uses value equality, which is
//! reference identity for object elements. `add` and `delete` report whether
//! membership actually changed and notify listeners only in that case.
//!
//! Object elements read back through `values()` are lazily wrapped into
//! [`ReactiveObject`] cells sharing this store's listener cell, memoized by
//! the element's allocation so repeated reads return the identical wrapper.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::listener::{Change, ListenerCell};
use super::object::{ReactiveObject, StoreEntry};
use crate::value::Value;

/// The raw container behind a set store: insertion-ordered unique elements.
pub type RawSet = Rc<RefCell<Vec<Value>>>;

struct SetCell {
    raw: RawSet,
    listeners: ListenerCell,
    single_level: bool,
    /// Lazy-wrap cache keyed by the object element's allocation address.
    wrapped: FxHashMap<usize, ReactiveObject>,
}

/// Observable set container. Cloning clones the handle, not the data.
#[derive(Clone)]
pub struct ReactiveSet {
    inner: Rc<RefCell<SetCell>>,
}

impl ReactiveSet {
    pub fn new(raw: RawSet, listeners: ListenerCell, single_level: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SetCell {
                raw,
                listeners,
                single_level,
                wrapped: FxHashMap::default(),
            })),
        }
    }

    /// The unwrapped container.
    pub fn raw(&self) -> RawSet {
        self.inner.borrow().raw.clone()
    }

    pub fn listeners(&self) -> ListenerCell {
        self.inner.borrow().listeners.clone()
    }

    /// Insert an element. Returns whether membership changed; listeners fire
    /// only on an actual insert.
    pub fn add(&self, element: impl Into<Value>) -> bool {
        let element = element.into();
        let listeners = {
            let cell = self.inner.borrow();
            let mut raw = cell.raw.borrow_mut();
            if raw.contains(&element) {
                return false;
            }
            raw.push(element.clone());
            cell.listeners.clone()
        };
        listeners.notify(&Change::Added { element });
        true
    }

    /// Remove an element. Returns whether membership changed; listeners fire
    /// only on an actual removal.
    pub fn delete(&self, element: &Value) -> bool {
        let listeners = {
            let mut cell = self.inner.borrow_mut();
            let position = {
                let raw = cell.raw.borrow();
                raw.iter().position(|e| e == element)
            };
            let Some(position) = position else {
                return false;
            };
            cell.raw.borrow_mut().remove(position);
            if let Value::Object(raw_obj) = element {
                cell.wrapped.remove(&(Rc::as_ptr(raw_obj) as usize));
            }
            cell.listeners.clone()
        };
        listeners.notify(&Change::Removed {
            element: element.clone(),
        });
        true
    }

    pub fn has(&self, element: &Value) -> bool {
        self.inner.borrow().raw.borrow().contains(element)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().raw.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the elements in insertion order; object elements come back
    /// wrapped unless this store is single-level.
    pub fn values(&self) -> Vec<StoreEntry> {
        let mut cell = self.inner.borrow_mut();
        let snapshot: Vec<Value> = cell.raw.borrow().clone();
        snapshot
            .into_iter()
            .map(|element| {
                let Value::Object(raw_obj) = &element else {
                    return StoreEntry::Primitive(element);
                };
                if cell.single_level {
                    return StoreEntry::Primitive(element);
                }
                let addr = Rc::as_ptr(raw_obj) as usize;
                if let Some(existing) = cell.wrapped.get(&addr) {
                    return StoreEntry::Reactive(existing.clone());
                }
                let wrapper =
                    ReactiveObject::new(raw_obj.clone(), cell.listeners.clone(), false);
                cell.wrapped.insert(addr, wrapper.clone());
                StoreEntry::Reactive(wrapper)
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counted_set() -> (ReactiveSet, Rc<Cell<usize>>) {
        let listeners = ListenerCell::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        listeners.add(Rc::new(move |_| hits_clone.set(hits_clone.get() + 1)));
        let set = ReactiveSet::new(Rc::new(RefCell::new(Vec::new())), listeners, false);
        (set, hits)
    }

    #[test]
    fn test_membership_change_only_notifies() {
        let (set, hits) = counted_set();

        assert!(set.add(1i64));
        assert!(!set.add(1i64)); // already a member: no notification
        assert_eq!(hits.get(), 1);

        assert!(set.delete(&Value::Int(1)));
        assert!(!set.delete(&Value::Int(1)));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_writes_reach_raw_target() {
        let raw: RawSet = Rc::new(RefCell::new(Vec::new()));
        let set = ReactiveSet::new(raw.clone(), ListenerCell::new(), false);

        set.add("a");
        assert_eq!(raw.borrow().len(), 1);
        set.delete(&Value::from("a"));
        assert!(raw.borrow().is_empty());
    }

    #[test]
    fn test_object_membership_is_identity() {
        let (set, _) = counted_set();
        let a = Value::object();
        let b = Value::object();

        set.add(a.clone());
        assert!(set.has(&a));
        assert!(!set.has(&b));
        assert!(set.add(b.clone()));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_values_wrap_objects_with_stable_identity() {
        let (set, hits) = counted_set();
        let obj = Value::object();
        set.add(obj);
        set.add(7i64);

        let first = set.values();
        let second = set.values();
        let a = first[0].as_reactive().unwrap();
        let b = second[0].as_reactive().unwrap();
        assert!(Rc::ptr_eq(&a.raw(), &b.raw()));
        assert!(matches!(first[1], StoreEntry::Primitive(Value::Int(7))));

        // Mutating through the wrapper notifies this set's listeners.
        a.set("x", 1i64);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn test_single_level_values_stay_raw() {
        let listeners = ListenerCell::new();
        let set = ReactiveSet::new(Rc::new(RefCell::new(Vec::new())), listeners, true);
        set.add(Value::object());

        match &set.values()[0] {
            StoreEntry::Primitive(Value::Object(_)) => {}
            _ => panic!("single-level set must not wrap elements"),
        }
    }
}
