//! Dependency registration between reactive slots and watchers.
//!
//! Every reactive slot owns a [`Dep`]. Reads record the dep on the watcher
//! currently at the top of the tracking stack; writes notify every
//! subscribed watcher in registration-id order. The stack (rather than a
//! single mutable slot) lets hook dispatch and error routing suspend
//! tracking re-entrantly: pushing `None` masks the active watcher until the
//! matching pop.

use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::reactive::watcher::WatcherInner;

static NEXT_DEP_ID: AtomicU64 = AtomicU64::new(1);

pub struct Dep {
    id: u64,
    subs: RefCell<SmallVec<[(u64, Weak<WatcherInner>); 2]>>,
}

impl Dep {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_DEP_ID.fetch_add(1, Ordering::Relaxed),
            subs: RefCell::new(SmallVec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Records this dep on the currently tracking watcher, if any.
    pub fn depend(self: &Rc<Self>) {
        if let Some(watcher) = tracking_target() {
            WatcherInner::add_dep(&watcher, self);
        }
    }

    pub(crate) fn add_sub(&self, id: u64, watcher: Weak<WatcherInner>) {
        let mut subs = self.subs.borrow_mut();
        if !subs.iter().any(|(sub_id, _)| *sub_id == id) {
            subs.push((id, watcher));
        }
    }

    pub(crate) fn remove_sub(&self, id: u64) {
        self.subs.borrow_mut().retain(|(sub_id, _)| *sub_id != id);
    }

    /// Marks every subscriber dirty, in watcher-id order so parents flush
    /// before their children when both land in the same batch.
    pub fn notify(&self) {
        let mut alive: SmallVec<[Rc<WatcherInner>; 4]> = self
            .subs
            .borrow()
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect();
        alive.sort_by_key(|watcher| watcher.id());
        for watcher in alive {
            watcher.update();
        }
    }
}

thread_local! {
    static TARGET_STACK: RefCell<Vec<Option<Rc<WatcherInner>>>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn push_target(target: Option<Rc<WatcherInner>>) {
    TARGET_STACK.with(|stack| stack.borrow_mut().push(target));
}

pub(crate) fn pop_target() {
    TARGET_STACK.with(|stack| {
        stack.borrow_mut().pop();
    });
}

/// The watcher whose evaluation is currently being tracked, if tracking is
/// not suspended.
pub(crate) fn tracking_target() -> Option<Rc<WatcherInner>> {
    TARGET_STACK.with(|stack| stack.borrow().last().cloned().flatten())
}

/// True while any watcher is actively tracking.
pub fn is_tracking() -> bool {
    tracking_target().is_some()
}

/// Guard that suspends dependency tracking until dropped.
#[must_use = "TargetGuard resumes dependency tracking on drop"]
pub struct TargetGuard;

impl TargetGuard {
    pub fn suspend() -> Self {
        push_target(None);
        TargetGuard
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        pop_target();
    }
}
