//! Batched watcher flushing.
//!
//! Reactive mutations mark watchers dirty synchronously; the re-render for
//! every dirty watcher across the tree is coalesced into one batch executed
//! by [`flush_now`], ordered by watcher id ascending so parents flush before
//! their children. The host decides *when* the batch runs: this module only
//! asks it to schedule one through the [`TickScheduler`] seam and exposes
//! the flush entry point.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::collections::map::{HashMap, HashSet};
use crate::reactive::watcher::WatcherInner;

/// Host-provided "defer to next tick" primitive. Queue policy belongs to the
/// implementation; the runtime only ever asks for one flush.
pub trait TickScheduler: Send + Sync {
    fn schedule_flush(&self);
}

/// Scheduler that never wakes anything; tests and embedders drive
/// [`flush_now`] by hand.
#[derive(Default)]
pub struct DefaultScheduler;

impl TickScheduler for DefaultScheduler {
    fn schedule_flush(&self) {}
}

const MAX_CIRCULAR_UPDATES: u32 = 100;

type HookTask = Pin<Box<dyn Future<Output = ()> + 'static>>;

struct SchedulerState {
    queue: RefCell<Vec<(u64, Weak<WatcherInner>)>>,
    has: RefCell<HashSet<u64>>,
    circular: RefCell<HashMap<u64, u32>>,
    flushing: Cell<bool>,
    waiting: Cell<bool>,
    tick: RefCell<Arc<dyn TickScheduler>>,
    waker: RefCell<Waker>,
    tasks: RefCell<Vec<HookTask>>,
    post_patch: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    post_flush: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    next_tick: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    pending_ticks: Cell<bool>,
}

struct TickWaker {
    tick: Arc<dyn TickScheduler>,
}

impl futures_task::ArcWake for TickWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.tick.schedule_flush();
    }
}

fn make_waker(tick: Arc<dyn TickScheduler>) -> Waker {
    futures_task::waker(Arc::new(TickWaker { tick }))
}

impl SchedulerState {
    fn new() -> Self {
        let tick: Arc<dyn TickScheduler> = Arc::new(DefaultScheduler);
        Self {
            queue: RefCell::new(Vec::new()),
            has: RefCell::new(HashSet::default()),
            circular: RefCell::new(HashMap::default()),
            flushing: Cell::new(false),
            waiting: Cell::new(false),
            waker: RefCell::new(make_waker(tick.clone())),
            tick: RefCell::new(tick),
            tasks: RefCell::new(Vec::new()),
            post_patch: RefCell::new(VecDeque::new()),
            post_flush: RefCell::new(VecDeque::new()),
            next_tick: RefCell::new(VecDeque::new()),
            pending_ticks: Cell::new(false),
        }
    }

    fn request_flush(&self) {
        if !self.waiting.replace(true) {
            self.tick.borrow().schedule_flush();
        }
    }

    fn drain_watchers(&self) {
        loop {
            let mut batch = self.queue.take();
            if batch.is_empty() {
                return;
            }
            batch.sort_by_key(|(id, _)| *id);
            for (id, weak) in batch {
                self.has.borrow_mut().remove(&id);
                let runs = {
                    let mut circular = self.circular.borrow_mut();
                    let count = circular.entry(id).or_insert(0);
                    *count += 1;
                    *count
                };
                if runs > MAX_CIRCULAR_UPDATES {
                    log::error!(
                        "infinite update loop detected for watcher {id}; further runs skipped this flush"
                    );
                    continue;
                }
                if let Some(watcher) = weak.upgrade() {
                    watcher.run_before();
                    watcher.run();
                    if watcher.is_render() {
                        self.post_flush
                            .borrow_mut()
                            .push_front(Box::new(move || watcher.run_after()));
                    }
                }
            }
        }
    }

    fn poll_tasks(&self) -> bool {
        let waker = self.waker.borrow().clone();
        let mut cx = Context::from_waker(&waker);
        let tasks = self.tasks.take();
        if tasks.is_empty() {
            return false;
        }
        let mut made_progress = false;
        let mut pending = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            match task.as_mut().poll(&mut cx) {
                Poll::Ready(()) => made_progress = true,
                Poll::Pending => pending.push(task),
            }
        }
        if !pending.is_empty() {
            self.tasks.borrow_mut().extend(pending);
        }
        made_progress
    }

    fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        loop {
            self.drain_watchers();
            self.poll_tasks();
            // Post-flush work may dirty more watchers; keep going until
            // everything settles. Activation hooks queued mid-patch run
            // before the updated hooks (which fire children-first).
            let job = {
                let mut post_patch = self.post_patch.borrow_mut();
                match post_patch.pop_front() {
                    Some(job) => Some(job),
                    None => self.post_flush.borrow_mut().pop_front(),
                }
            };
            match job {
                Some(job) => job(),
                None => break,
            }
        }
        self.circular.borrow_mut().clear();
        self.flushing.set(false);
        self.waiting.set(false);
        self.pending_ticks.set(false);
        loop {
            let callback = self.next_tick.borrow_mut().pop_front();
            match callback {
                Some(callback) => callback(),
                None => break,
            }
        }
    }
}

thread_local! {
    static SCHEDULER: SchedulerState = SchedulerState::new();
}

/// Installs the host's flush scheduler for the current thread.
pub fn set_tick_scheduler(tick: Arc<dyn TickScheduler>) {
    SCHEDULER.with(|state| {
        state.waker.replace(make_waker(tick.clone()));
        state.tick.replace(tick);
    });
}

pub(crate) fn queue_watcher(watcher: &Rc<WatcherInner>) {
    SCHEDULER.with(|state| {
        if state.has.borrow_mut().insert(watcher.id()) {
            state
                .queue
                .borrow_mut()
                .push((watcher.id(), Rc::downgrade(watcher)));
            state.request_flush();
        }
    });
}

/// Runs the whole pending batch now: dirty watchers (id order), async hook
/// continuations, post-flush jobs, then `next_tick` callbacks. Re-entrant
/// calls are no-ops.
pub fn flush_now() {
    SCHEDULER.with(|state| state.flush());
}

/// Defers `callback` until after the current (or next) batch flush.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    SCHEDULER.with(|state| {
        state.next_tick.borrow_mut().push_back(Box::new(callback));
        if !state.pending_ticks.replace(true) && !state.flushing.get() {
            state.request_flush();
        }
    });
}

/// Queues work to run inside the current flush, after the watcher batch but
/// before the updated hooks.
pub(crate) fn queue_post_patch(job: impl FnOnce() + 'static) {
    SCHEDULER.with(|state| {
        state.post_patch.borrow_mut().push_back(Box::new(job));
        if !state.flushing.get() {
            state.request_flush();
        }
    });
}

/// Adopts an asynchronous hook continuation; polled during flushes.
pub(crate) fn spawn_hook_task(task: HookTask) {
    SCHEDULER.with(|state| {
        state.tasks.borrow_mut().push(task);
        state.request_flush();
    });
}

/// True when a flush has been requested but not executed yet.
pub fn has_pending_flush() -> bool {
    SCHEDULER.with(|state| state.waiting.get())
}
