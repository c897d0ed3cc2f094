//! Reactive storage: string-keyed maps with per-key deps, and single-slot
//! reactive cells for surfaces like `$attrs`/`$listeners`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::reactive::dep::Dep;
use crate::value::Value;

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Globally enables or disables wrapping of newly assigned values. Returns
/// the previous setting so call sites can restore it.
pub fn toggle_observing(value: bool) -> bool {
    SHOULD_OBSERVE.with(|flag| flag.replace(value))
}

pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(|flag| flag.get())
}

/// Marks a value (and, for maps, its nested values) as observed. A no-op
/// while observation is toggled off, so already-wrapped values are never
/// wrapped twice.
pub fn observe(value: &Value) {
    if !should_observe() {
        return;
    }
    if let Value::Map(map) = value {
        map.mark_observed();
    }
}

struct MapEntry {
    value: RefCell<Value>,
    dep: Rc<Dep>,
    custom_setter: Option<Rc<dyn Fn()>>,
    shallow: bool,
}

/// A shallow reactive string→value map. Each key owns a dep; reads record
/// it, writes notify it. Adding a key through [`ReactiveMap::set`] notifies
/// the map-level dep.
pub struct ReactiveMap {
    entries: RefCell<HashMap<Rc<str>, MapEntry>>,
    self_dep: Rc<Dep>,
    observed: Cell<bool>,
    vm_count: Cell<usize>,
}

impl ReactiveMap {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::default()),
            self_dep: Dep::new(),
            observed: Cell::new(false),
            vm_count: Cell::new(0),
        }
    }

    /// Installs a key without notifying anyone. The initial value is
    /// observed unless the key is shallow or observation is toggled off.
    pub fn define(
        &self,
        key: Rc<str>,
        value: Value,
        custom_setter: Option<Rc<dyn Fn()>>,
        shallow: bool,
    ) {
        if !shallow {
            observe(&value);
        }
        self.entries.borrow_mut().insert(
            key,
            MapEntry {
                value: RefCell::new(value),
                dep: Dep::new(),
                custom_setter,
                shallow,
            },
        );
    }

    /// Reads a key, recording a dependency on it. Reads of missing keys are
    /// not tracked; use [`ReactiveMap::set`] to add keys reactively.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.borrow();
        let entry = entries.get(key)?;
        entry.dep.depend();
        let value = entry.value.borrow().clone();
        Some(value)
    }

    /// Reads a key without recording a dependency.
    pub fn peek(&self, key: &str) -> Option<Value> {
        let entries = self.entries.borrow();
        entries.get(key).map(|entry| entry.value.borrow().clone())
    }

    /// Writes a key. An unchanged value is a no-op; a new key is defined and
    /// announced through the map-level dep.
    pub fn set(&self, key: &str, value: Value) {
        if self.entries.borrow().contains_key(key) {
            let dep = {
                let entries = self.entries.borrow();
                let entry = entries.get(key).expect("key checked above");
                if *entry.value.borrow() == value {
                    return;
                }
                if let Some(custom_setter) = &entry.custom_setter {
                    custom_setter();
                }
                if !entry.shallow {
                    observe(&value);
                }
                entry.value.replace(value);
                entry.dep.clone()
            };
            dep.notify();
        } else {
            self.define(Rc::from(key), value, None, false);
            self.self_dep.notify();
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Current key set. Enumeration records the map-level dep, so adding a
    /// key through [`ReactiveMap::set`] re-runs enumerating watchers.
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.self_dep.depend();
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.self_dep.depend();
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untracked copy of the current contents.
    pub fn snapshot(&self) -> Vec<(Rc<str>, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.borrow().clone()))
            .collect()
    }

    pub(crate) fn mark_observed(&self) {
        if self.observed.replace(true) {
            return;
        }
        for (_, value) in self.snapshot() {
            observe(&value);
        }
    }

    pub fn is_observed(&self) -> bool {
        self.observed.get()
    }

    /// Number of instances using this map as their root data; shared state
    /// outlives any single owner.
    pub fn vm_count(&self) -> usize {
        self.vm_count.get()
    }

    pub(crate) fn inc_vm_count(&self) {
        self.vm_count.set(self.vm_count.get() + 1);
    }

    pub(crate) fn dec_vm_count(&self) {
        let count = self.vm_count.get();
        if count > 0 {
            self.vm_count.set(count - 1);
        }
    }
}

impl Default for ReactiveMap {
    fn default() -> Self {
        Self::new()
    }
}

/// A single reactive slot holding a whole value, with an optional setter
/// guard (used to warn on writes to readonly surfaces).
pub struct ReactiveCell<T> {
    value: RefCell<T>,
    dep: Rc<Dep>,
    setter_guard: RefCell<Option<Rc<dyn Fn()>>>,
}

impl<T: Clone + PartialEq> ReactiveCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            dep: Dep::new(),
            setter_guard: RefCell::new(None),
        }
    }

    pub fn set_setter_guard(&self, guard: Option<Rc<dyn Fn()>>) {
        self.setter_guard.replace(guard);
    }

    pub fn get(&self) -> T {
        self.dep.depend();
        self.value.borrow().clone()
    }

    pub fn peek(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        if *self.value.borrow() == value {
            return;
        }
        if let Some(guard) = self.setter_guard.borrow().clone() {
            guard();
        }
        self.value.replace(value);
        self.dep.notify();
    }
}
