//! Core value model for glint.
//!
//! `Value` is the dynamic currency of the runtime: component props,
//! expression-node content, memo/effect dependency lists, and the contents
//! of reactive stores are all `Value`s. It is deliberately small - the
//! runtime never interprets values beyond equality and display.
//!
//! Equality follows reference semantics for containers: two `Object` values
//! are equal only when they share the same underlying allocation. The diff
//! and the memo-dependency comparison both rely on this.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// The raw container behind an object value (and behind object proxies).
pub type RawObject = Rc<RefCell<BTreeMap<String, Value>>>;

// =============================================================================
// Value
// =============================================================================

/// A dynamic runtime value.
///
/// `Object` is the only container variant. Cloning is cheap: strings and
/// objects are reference-counted.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(RawObject),
}

impl Value {
    /// Create an empty object value.
    pub fn object() -> Self {
        Value::Object(Rc::new(RefCell::new(BTreeMap::new())))
    }

    /// Create an object value from key/value pairs.
    pub fn object_from<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    /// True for the container variant.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The shared raw container, if this is an object value.
    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Value::Object(raw) => Some(raw),
            _ => None,
        }
    }

    /// Read one property of an object value. `None` for non-objects and
    /// missing keys.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(raw) => raw.borrow().get(key).cloned(),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Reference identity: a mutated object is still "the same" value.
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Object(raw) => write!(f, "[object; {} keys]", raw.borrow().len()),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Value::Object(raw)
    }
}

// =============================================================================
// Tests
// =============================================================================
