//! Object store - an observable wrapper around a plain key/value container.
//!
//! The wrapper is behaviorally transparent for reads and intercepted for
//! writes: `set`/`delete` apply the mutation to the raw target first, then
//! notify the listener cell. Writes are never buffered - reading the raw
//! target immediately after a wrapped write always shows the mutation.
//!
//! # Lazy nested wrapping
//!
//! Unless constructed single-level, reading a property whose value is itself
//! an object returns a nested [`ReactiveObject`] sharing the same listener
//! cell. Wrappers are memoized per key: repeated reads of the same key return
//! the identical wrapper instance, so downstream identity checks stay
//! meaningful. Raw containers never escape through a multi-level cell.
//!
//! # Notification semantics
//!
//! `set` always notifies, even when the new value equals the stored one;
//! `delete` notifies only when the key existed. Both are pinned by tests.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::listener::{Change, ListenerCell};
use crate::value::{RawObject, Value};

/// A property read: either a plain value or a nested reactive wrapper.
#[derive(Clone)]
pub enum StoreEntry {
    Primitive(Value),
    Reactive(ReactiveObject),
}

impl StoreEntry {
    /// The plain value form of this entry (the raw container for nested
    /// wrappers).
    pub fn value(&self) -> Value {
        match self {
            StoreEntry::Primitive(v) => v.clone(),
            StoreEntry::Reactive(cell) => Value::Object(cell.raw()),
        }
    }

    pub fn as_reactive(&self) -> Option<&ReactiveObject> {
        match self {
            StoreEntry::Reactive(cell) => Some(cell),
            _ => None,
        }
    }
}

struct ObjectCell {
    raw: RawObject,
    listeners: ListenerCell,
    single_level: bool,
    /// Lazy-wrap cache: key -> wrapper handed out for that key.
    wrapped: FxHashMap<String, ReactiveObject>,
}

/// Observable object container. Cloning clones the handle, not the data.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Rc<RefCell<ObjectCell>>,
}

impl ReactiveObject {
    /// Wrap a raw container.
    ///
    /// `listeners` is shared with every nested wrapper this cell creates.
    /// With `single_level` set, nested objects are returned raw instead of
    /// being wrapped.
    pub fn new(raw: RawObject, listeners: ListenerCell, single_level: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectCell {
                raw,
                listeners,
                single_level,
                wrapped: FxHashMap::default(),
            })),
        }
    }

    /// The unwrapped container.
    pub fn raw(&self) -> RawObject {
        self.inner.borrow().raw.clone()
    }

    /// The listener cell mutations are reported to.
    pub fn listeners(&self) -> ListenerCell {
        self.inner.borrow().listeners.clone()
    }

    /// Read a property.
    ///
    /// Object values are wrapped (and the wrapper memoized) unless this cell
    /// is single-level.
    pub fn get(&self, key: &str) -> Option<StoreEntry> {
        let mut cell = self.inner.borrow_mut();
        let value = cell.raw.borrow().get(key).cloned()?;

        let Value::Object(child_raw) = &value else {
            return Some(StoreEntry::Primitive(value));
        };
        if cell.single_level {
            return Some(StoreEntry::Primitive(value));
        }

        // Reuse the cached wrapper while it still wraps the current child.
        if let Some(existing) = cell.wrapped.get(key) {
            if Rc::ptr_eq(&existing.raw(), child_raw) {
                return Some(StoreEntry::Reactive(existing.clone()));
            }
        }

        let wrapper = ReactiveObject::new(child_raw.clone(), cell.listeners.clone(), false);
        cell.wrapped.insert(key.to_string(), wrapper.clone());
        Some(StoreEntry::Reactive(wrapper))
    }

    /// Write a property. The raw target is mutated first, then listeners are
    /// notified - on every call, including value-preserving writes.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let listeners = {
            let mut cell = self.inner.borrow_mut();
            cell.raw.borrow_mut().insert(key.clone(), value.clone());
            // A replaced value invalidates the cached wrapper for this key.
            cell.wrapped.remove(&key);
            cell.listeners.clone()
        };
        listeners.notify(&Change::PropertySet { key, value });
    }

    /// Remove a property. Notifies only when the key existed.
    pub fn delete(&self, key: &str) -> bool {
        let (existed, listeners) = {
            let mut cell = self.inner.borrow_mut();
            let existed = cell.raw.borrow_mut().remove(key).is_some();
            cell.wrapped.remove(key);
            (existed, cell.listeners.clone())
        };
        if existed {
            listeners.notify(&Change::PropertyDelete {
                key: key.to_string(),
            });
        }
        existed
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.borrow().raw.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().raw.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().raw.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    fn counted_cell() -> (ListenerCell, Rc<Cell<usize>>) {
        let listeners = ListenerCell::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        listeners.add(Rc::new(move |_| hits_clone.set(hits_clone.get() + 1)));
        (listeners, hits)
    }

    fn raw_object() -> RawObject {
        Rc::new(RefCell::new(BTreeMap::new()))
    }

    #[test]
    fn test_write_reaches_raw_target() {
        let raw = raw_object();
        let store = ReactiveObject::new(raw.clone(), ListenerCell::new(), false);

        store.set("count", 5i64);
        assert_eq!(raw.borrow().get("count"), Some(&Value::Int(5)));

        store.delete("count");
        assert!(raw.borrow().get("count").is_none());
    }

    #[test]
    fn test_set_always_notifies() {
        let (listeners, hits) = counted_cell();
        let store = ReactiveObject::new(raw_object(), listeners, false);

        store.set("x", 1i64);
        store.set("x", 1i64); // value-preserving write still fires
        store.set("x", 2i64);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn test_delete_notifies_only_when_present() {
        let (listeners, hits) = counted_cell();
        let store = ReactiveObject::new(raw_object(), listeners, false);

        assert!(!store.delete("ghost"));
        assert_eq!(hits.get(), 0);

        store.set("x", 1i64);
        assert!(store.delete("x"));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_nested_wrapper_identity() {
        let raw = raw_object();
        raw.borrow_mut()
            .insert("child".into(), Value::object_from([("n", 1i64)]));
        let store = ReactiveObject::new(raw, ListenerCell::new(), false);

        let first = store.get("child").unwrap();
        let second = store.get("child").unwrap();
        let (a, b) = (first.as_reactive().unwrap(), second.as_reactive().unwrap());
        assert!(Rc::ptr_eq(&a.inner, &b.inner));

        // Replacing the child invalidates the wrapper.
        store.set("child", Value::object());
        let third = store.get("child").unwrap();
        assert!(!Rc::ptr_eq(&a.inner, &third.as_reactive().unwrap().inner));
    }

    #[test]
    fn test_nested_write_notifies_shared_listeners() {
        let (listeners, hits) = counted_cell();
        let raw = raw_object();
        raw.borrow_mut().insert("child".into(), Value::object());
        let store = ReactiveObject::new(raw, listeners, false);

        let child = store.get("child").unwrap();
        child.as_reactive().unwrap().set("deep", 1i64);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_single_level_returns_raw() {
        let raw = raw_object();
        raw.borrow_mut().insert("child".into(), Value::object());
        let store = ReactiveObject::new(raw, ListenerCell::new(), true);

        match store.get("child").unwrap() {
            StoreEntry::Primitive(Value::Object(_)) => {}
            _ => panic!("single-level cell must not wrap nested objects"),
        }
    }

    #[test]
    fn test_primitive_reads() {
        let store = ReactiveObject::new(raw_object(), ListenerCell::new(), false);
        store.set("name", "ada");

        assert!(store.has("name"));
        assert_eq!(store.len(), 1);
        match store.get("name").unwrap() {
            StoreEntry::Primitive(v) => assert_eq!(v.as_str(), Some("ada")),
            _ => panic!("primitives are never wrapped"),
        }
        assert!(store.get("missing").is_none());
    }
}
