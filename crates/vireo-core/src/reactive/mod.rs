//! The dependency-tracking engine consumed by the instance runtime.

pub mod dep;
pub mod scheduler;
pub mod scope;
pub mod state;
pub mod watcher;

pub use dep::{Dep, TargetGuard};
pub use scheduler::{flush_now, next_tick, set_tick_scheduler, DefaultScheduler, TickScheduler};
pub use scope::EffectScope;
pub use state::{observe, toggle_observing, ReactiveCell, ReactiveMap};
pub use watcher::{Watcher, WatcherOptions};
