//! Standard flush scheduling backed by Rust's `std` library.
//!
//! `vireo-core` batches watcher re-runs and only asks its [`TickScheduler`]
//! to arrange a flush on the owning thread. [`StdTickScheduler`] records
//! that request in an atomic flag and pokes an optional waker; a host event
//! loop polls [`StdTickScheduler::take_flush_request`] (or installs a waker)
//! and calls [`vireo_core::flush_now`] when it fires.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use vireo_core::TickScheduler;

type FlushWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that hands flush requests to the host event loop.
pub struct StdTickScheduler {
    flush_requested: AtomicBool,
    flush_waker: RwLock<Option<FlushWaker>>,
}

impl StdTickScheduler {
    pub fn new() -> Self {
        Self {
            flush_requested: AtomicBool::new(false),
            flush_waker: RwLock::new(None),
        }
    }

    /// Returns whether a flush has been requested since the last call.
    pub fn take_flush_request(&self) -> bool {
        self.flush_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a new flush is scheduled.
    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        match self.flush_waker.write() {
            Ok(mut slot) => *slot = Some(Arc::new(waker)),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::new(waker)),
        }
    }

    /// Clears any registered flush waker.
    pub fn clear_flush_waker(&self) {
        match self.flush_waker.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn wake(&self) {
        let waker = match self.flush_waker.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdTickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdTickScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdTickScheduler")
            .field(
                "flush_requested",
                &self.flush_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl TickScheduler for StdTickScheduler {
    fn schedule_flush(&self) {
        self.flush_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Bundles the scheduler with installation on the current thread's runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdTickScheduler>,
}

impl StdRuntime {
    /// Creates the runtime and installs its scheduler for this thread.
    pub fn install() -> Self {
        let scheduler = Arc::new(StdTickScheduler::new());
        vireo_core::set_tick_scheduler(scheduler.clone());
        Self { scheduler }
    }

    pub fn scheduler(&self) -> Arc<StdTickScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns whether a flush was requested since the last poll.
    pub fn take_flush_request(&self) -> bool {
        self.scheduler.take_flush_request()
    }

    /// Runs the pending batch when one was requested. Returns whether a
    /// flush actually ran.
    pub fn flush_if_requested(&self) -> bool {
        if self.scheduler.take_flush_request() {
            vireo_core::flush_now();
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/std_runtime_tests.rs"]
mod tests;
