//! Watchers bind an evaluation function to automatic dependency tracking.
//!
//! One watcher type serves three roles: the per-instance render watcher
//! (eager, queued through the shared scheduler), lazy computed-property
//! watchers, and user `watch` entries. Evaluation pushes the watcher onto
//! the tracking stack so nested evaluation (a computed getter read during a
//! render) nests cleanly instead of clobbering the outer frame.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collections::map::HashSet;
use crate::error::{handle_error, InstanceError};
use crate::instance::{Instance, InstanceInner};
use crate::reactive::dep::{pop_target, push_target, Dep};
use crate::reactive::scheduler;
use crate::reactive::scope;
use crate::value::Value;

static NEXT_WATCHER_ID: AtomicU64 = AtomicU64::new(1);

pub type WatcherGetter = Box<dyn FnMut() -> Result<Value, InstanceError>>;
pub type WatcherCallback = Box<dyn Fn(&Value, &Value)>;

#[derive(Default)]
pub struct WatcherOptions {
    /// Do not evaluate until first read; re-evaluation only marks dirty.
    pub lazy: bool,
    /// Re-run synchronously on update instead of queueing.
    pub sync: bool,
    /// Invoked by the scheduler right before a queued re-run.
    pub before: Option<Box<dyn Fn()>>,
    /// Invoked by the scheduler after the batch that re-ran this watcher.
    pub after: Option<Box<dyn Fn()>>,
}

pub(crate) struct WatcherInner {
    id: u64,
    owner: Weak<InstanceInner>,
    active: Cell<bool>,
    dirty: Cell<bool>,
    lazy: bool,
    sync: bool,
    is_render: bool,
    before: RefCell<Option<Box<dyn Fn()>>>,
    after: RefCell<Option<Box<dyn Fn()>>>,
    getter: RefCell<Option<WatcherGetter>>,
    callback: RefCell<Option<WatcherCallback>>,
    value: RefCell<Value>,
    deps: RefCell<Vec<Rc<Dep>>>,
    dep_ids: RefCell<HashSet<u64>>,
    new_deps: RefCell<Vec<Rc<Dep>>>,
    new_dep_ids: RefCell<HashSet<u64>>,
}

impl WatcherInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_render(&self) -> bool {
        self.is_render
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn add_dep(this: &Rc<Self>, dep: &Rc<Dep>) {
        let id = dep.id();
        if this.new_dep_ids.borrow_mut().insert(id) {
            this.new_deps.borrow_mut().push(dep.clone());
            if !this.dep_ids.borrow().contains(&id) {
                dep.add_sub(this.id, Rc::downgrade(this));
            }
        }
    }

    fn cleanup_deps(&self) {
        let new_ids = self.new_dep_ids.borrow();
        for dep in self.deps.borrow().iter() {
            if !new_ids.contains(&dep.id()) {
                dep.remove_sub(self.id);
            }
        }
        drop(new_ids);
        self.deps.replace(self.new_deps.take());
        self.dep_ids.replace(self.new_dep_ids.take());
    }

    /// Evaluates the getter with this watcher as the tracking target.
    pub(crate) fn get(this: &Rc<Self>) -> Value {
        push_target(Some(this.clone()));
        // Taken out of the cell for the call so user code may tear this
        // watcher down re-entrantly without tripping a borrow.
        let getter = this.getter.borrow_mut().take();
        let result = match getter {
            Some(mut getter) => {
                let result = getter();
                if this.active.get() && this.getter.borrow().is_none() {
                    this.getter.replace(Some(getter));
                }
                result
            }
            None => Ok(Value::Null),
        };
        pop_target();
        this.cleanup_deps();
        match result {
            Ok(value) => value,
            Err(err) => {
                let owner = this.owner.upgrade().map(Instance::from_rc);
                handle_error(&err, owner.as_ref(), "getter for watcher");
                Value::Null
            }
        }
    }

    /// Marks dirty and schedules a re-run (or runs synchronously).
    pub(crate) fn update(self: &Rc<Self>) {
        if self.lazy {
            self.dirty.set(true);
        } else if self.sync {
            self.run();
        } else {
            scheduler::queue_watcher(self);
        }
    }

    /// Forces a synchronous re-evaluation, invoking the callback when the
    /// value changed (container values always count as changed: identity is
    /// all we can compare).
    pub(crate) fn run(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }
        // A destroy that raced with an in-flight flush leaves the queued
        // entry behind; the flag check makes it a no-op.
        if let Some(owner) = self.owner.upgrade() {
            if owner.is_being_destroyed() {
                return;
            }
        }
        let value = Self::get(self);
        let old = self.value.replace(value.clone());
        let container = matches!(value, Value::Map(_) | Value::List(_));
        if value != old || container {
            let callback = self.callback.borrow_mut().take();
            if let Some(callback) = callback {
                callback(&old, &value);
                if self.active.get() && self.callback.borrow().is_none() {
                    self.callback.replace(Some(callback));
                }
            }
        }
    }

    /// Lazy evaluation for computed watchers.
    pub(crate) fn evaluate(self: &Rc<Self>) {
        let value = Self::get(self);
        self.value.replace(value);
        self.dirty.set(false);
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Re-registers every dep of this watcher on the enclosing target, so an
    /// outer watcher reading a computed value depends on its sources.
    pub(crate) fn depend(&self) {
        for dep in self.deps.borrow().iter() {
            dep.depend();
        }
    }

    pub(crate) fn run_before(&self) {
        if let Some(before) = self.before.borrow().as_ref() {
            before();
        }
    }

    pub(crate) fn run_after(&self) {
        if let Some(after) = self.after.borrow().as_ref() {
            after();
        }
    }

    pub(crate) fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    pub(crate) fn teardown(&self) {
        if !self.active.replace(false) {
            return;
        }
        for dep in self.deps.borrow().iter() {
            dep.remove_sub(self.id);
        }
        self.deps.borrow_mut().clear();
        self.dep_ids.borrow_mut().clear();
        // Watcher closures may close over their owning instance; dropping
        // them here is what breaks the ownership cycle at destroy.
        self.getter.replace(None);
        self.callback.replace(None);
        self.before.replace(None);
        self.after.replace(None);
    }
}

#[derive(Clone)]
pub struct Watcher {
    pub(crate) inner: Rc<WatcherInner>,
}

impl Watcher {
    pub fn new(
        owner: Option<&Instance>,
        getter: WatcherGetter,
        callback: Option<WatcherCallback>,
        options: WatcherOptions,
        is_render_watcher: bool,
    ) -> Self {
        let inner = Rc::new(WatcherInner {
            id: NEXT_WATCHER_ID.fetch_add(1, Ordering::Relaxed),
            owner: owner.map(Instance::downgrade).unwrap_or_default(),
            active: Cell::new(true),
            dirty: Cell::new(options.lazy),
            lazy: options.lazy,
            sync: options.sync,
            is_render: is_render_watcher,
            before: RefCell::new(options.before),
            after: RefCell::new(options.after),
            getter: RefCell::new(Some(getter)),
            callback: RefCell::new(callback),
            value: RefCell::new(Value::Null),
            deps: RefCell::new(Vec::new()),
            dep_ids: RefCell::new(HashSet::default()),
            new_deps: RefCell::new(Vec::new()),
            new_dep_ids: RefCell::new(HashSet::default()),
        });
        scope::record_watcher(&inner);
        let watcher = Self { inner };
        // The initial evaluation may re-enter through $force_update (a child
        // mounted hook can trigger it), which reads the stored watcher, so
        // render watchers are published before the first run.
        if is_render_watcher {
            if let Some(owner) = owner {
                owner.set_render_watcher(watcher.clone());
            }
        }
        if !watcher.inner.lazy {
            let value = WatcherInner::get(&watcher.inner);
            watcher.inner.value.replace(value);
        }
        watcher
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Marks the watcher dirty and schedules the batched flush.
    pub fn update(&self) {
        self.inner.update();
    }

    /// Forces a synchronous re-evaluation.
    pub fn run(&self) {
        self.inner.run();
    }

    pub fn value(&self) -> Value {
        self.inner.value()
    }

    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub(crate) fn evaluate_if_dirty(&self) {
        if self.inner.is_dirty() {
            self.inner.evaluate();
        }
    }

    pub(crate) fn depend(&self) {
        self.inner.depend();
    }
}
