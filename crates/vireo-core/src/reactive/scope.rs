//! Per-instance watcher ownership.
//!
//! Every instance owns one detached [`EffectScope`]. Watchers created while
//! the scope is entered register themselves into it, so destroying the
//! instance stops the render watcher, computed watchers and user watchers in
//! one pass without walking the dependency graph.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::reactive::watcher::WatcherInner;

struct ScopeInner {
    active: Cell<bool>,
    watchers: RefCell<Vec<Weak<WatcherInner>>>,
}

pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

impl EffectScope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                active: Cell::new(true),
                watchers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Makes this the recording scope until the guard drops.
    pub fn enter(&self) -> ScopeGuard {
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.inner.clone()));
        ScopeGuard
    }

    /// Tears down every watcher created under this scope. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        let watchers = self.inner.watchers.take();
        for watcher in watchers {
            if let Some(watcher) = watcher.upgrade() {
                watcher.teardown();
            }
        }
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Rc<ScopeInner>>> = const { RefCell::new(Vec::new()) };
}

#[must_use = "ScopeGuard pops the recording scope on drop"]
pub struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Registers a freshly constructed watcher into the recording scope, if one
/// is entered.
pub(crate) fn record_watcher(watcher: &Rc<WatcherInner>) {
    SCOPE_STACK.with(|stack| {
        if let Some(scope) = stack.borrow().last() {
            if scope.active.get() {
                scope.watchers.borrow_mut().push(Rc::downgrade(watcher));
            }
        }
    });
}
