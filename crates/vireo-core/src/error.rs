//! Error containment for user-supplied callbacks.
//!
//! Anything a component author writes (hooks, event handlers, render
//! functions, watch callbacks) runs through [`invoke_with_handling`]. A
//! failure never unwinds past the invocation site: it is routed up the
//! instance's parent chain through `error_captured` hooks and falls back to
//! the global handler, then to the log sink. Dependency tracking is
//! suspended for the whole routing so error hooks are never recorded as
//! dependencies of the computation that failed.

use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::instance::Instance;
use crate::reactive::dep::TargetGuard;
use crate::reactive::scheduler;
use crate::value::Value;

struct ErrorRepr {
    message: String,
}

/// Error raised by (or on behalf of) user component code.
///
/// Cheap to clone; identity is preserved across clones so containment can
/// tell "the global handler re-threw the error it was given" apart from "the
/// global handler itself failed".
#[derive(Clone)]
pub struct InstanceError {
    repr: Rc<ErrorRepr>,
}

impl InstanceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            repr: Rc::new(ErrorRepr {
                message: message.into(),
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.repr.message
    }

    /// True when both handles refer to the same originally raised error.
    pub fn same_error(&self, other: &InstanceError) -> bool {
        Rc::ptr_eq(&self.repr, &other.repr)
    }
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr.message)
    }
}

impl fmt::Debug for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceError({:?})", self.repr.message)
    }
}

impl Error for InstanceError {}

/// Deferred continuation of a hook that finishes asynchronously.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), InstanceError>> + 'static>>;

/// What a user callback produced when it did not fail synchronously.
pub enum HookValue {
    Sync(Value),
    /// The callback handed back an awaitable continuation. Containment is
    /// attached exactly once, at the invocation site that first sees it.
    Async(HookFuture),
}

pub type HookResult = Result<HookValue, InstanceError>;

/// Handler invoked when an error escapes every `error_captured` hook.
pub type GlobalErrorHandler =
    Rc<dyn Fn(&InstanceError, Option<&Instance>, &str) -> Result<(), InstanceError>>;

thread_local! {
    static GLOBAL_ERROR_HANDLER: RefCell<Option<GlobalErrorHandler>> = const { RefCell::new(None) };
}

/// Installs (or clears) the process-wide fallback error handler.
pub fn set_global_error_handler(handler: Option<GlobalErrorHandler>) {
    GLOBAL_ERROR_HANDLER.with(|slot| *slot.borrow_mut() = handler);
}

/// Calls `f`, containing a synchronous failure and attaching containment to
/// an asynchronous one. Returns the produced value when the call succeeded
/// synchronously.
pub fn invoke_with_handling(
    f: impl FnOnce() -> HookResult,
    vm: Option<&Instance>,
    label: &str,
) -> Option<Value> {
    match f() {
        Ok(HookValue::Sync(value)) => Some(value),
        Ok(HookValue::Async(future)) => {
            let vm = vm.cloned();
            let label = format!("{label} (async)");
            scheduler::spawn_hook_task(Box::pin(async move {
                if let Err(err) = future.await {
                    handle_error(&err, vm.as_ref(), &label);
                }
            }));
            None
        }
        Err(err) => {
            handle_error(&err, vm, label);
            None
        }
    }
}

/// Routes `err` up the parent chain, then to the global handler, then to the
/// log sink. A capture hook returning `Ok(false)` stops the walk.
pub fn handle_error(err: &InstanceError, vm: Option<&Instance>, label: &str) {
    // Tracking stays suspended for the whole routing; see module docs.
    let _guard = TargetGuard::suspend();
    if let Some(vm) = vm {
        let mut cur = vm.parent();
        while let Some(ancestor) = cur {
            let hooks = ancestor.options().error_captured.clone();
            for hook in &hooks {
                match hook(err, vm, label) {
                    Ok(false) => return,
                    Ok(true) => {}
                    Err(inner) => {
                        global_handle_error(&inner, Some(&ancestor), "error_captured hook");
                    }
                }
            }
            cur = ancestor.parent();
        }
    }
    global_handle_error(err, vm, label);
}

fn global_handle_error(err: &InstanceError, vm: Option<&Instance>, label: &str) {
    let handler = GLOBAL_ERROR_HANDLER.with(|slot| slot.borrow().clone());
    if let Some(handler) = handler {
        match handler(err, vm, label) {
            Ok(()) => return,
            Err(inner) => {
                // A handler re-throwing the error it was given is not a
                // second failure; log it once below.
                if !inner.same_error(err) {
                    log_error(&inner, "global error handler");
                }
            }
        }
    }
    log_error(err, label);
}

fn log_error(err: &InstanceError, label: &str) {
    log::error!("Error in {label}: \"{err}\"");
}
