//! Dynamic values crossing the component option surface.
//!
//! Component descriptions are string-keyed and dynamically typed (props,
//! data, attrs, emitted event payloads), so the runtime moves them around as
//! a closed `Value` enum rather than `Box<dyn Any>`. Maps are shared reactive
//! maps; cloning a `Value` is always cheap.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::reactive::state::ReactiveMap;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<ReactiveMap>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: impl IntoIterator<Item = (Rc<str>, Value)>) -> Self {
        let map = ReactiveMap::new();
        for (key, value) in entries {
            map.define(key, value, None, false);
        }
        Value::Map(Rc::new(map))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Rc<ReactiveMap>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the carried type, used in validation diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Num(_) => "Number",
            Value::Str(_) => "String",
            Value::List(_) => "Array",
            Value::Map(_) => "Object",
        }
    }
}

/// Scalars compare structurally; lists and maps compare by identity, which is
/// what change detection wants (a freshly built map is a new value even when
/// its contents match).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // Both-NaN counts as unchanged, so a rewritten NaN never
            // re-notifies its dep.
            (Value::Num(a), Value::Num(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Map(_) => write!(f, "{{..}}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Num(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}
