//! Parent-listener normalization and the swappable invoker.
//!
//! When a parent re-renders and passes a fresh closure for an event the
//! child already subscribes to, the live registration is kept and only the
//! invoker's target list is swapped. Removing and re-adding would be
//! observably equivalent; swapping keeps the host listener layer stable.

use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

use crate::collections::map::{HashMap, HashSet};
use crate::error::{invoke_with_handling, HookResult, HookValue};
use crate::instance::Instance;
use crate::value::Value;
use crate::vnode::ListenerDecls;

pub type EventHandlerFn = Rc<dyn Fn(&[Value]) -> HookResult>;

/// A declared listener: one handler or an ordered list of them.
#[derive(Clone)]
pub enum ListenerDecl {
    One(EventHandlerFn),
    Many(Rc<Vec<EventHandlerFn>>),
}

/// Identity comparison; a re-created closure counts as a new listener.
impl PartialEq for ListenerDecl {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ListenerDecl::One(a), ListenerDecl::One(b)) => Rc::ptr_eq(a, b),
            (ListenerDecl::Many(a), ListenerDecl::Many(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl ListenerDecl {
    fn fns(&self) -> SmallVec<[EventHandlerFn; 1]> {
        match self {
            ListenerDecl::One(f) => SmallVec::from_elem(f.clone(), 1),
            ListenerDecl::Many(fns) => fns.iter().cloned().collect(),
        }
    }
}

/// Wraps one-or-many handler fns behind a mutable target list, so listener
/// reconciliation can retarget a live registration in place.
pub struct Invoker {
    fns: RefCell<SmallVec<[EventHandlerFn; 1]>>,
}

impl Invoker {
    pub fn new(decl: &ListenerDecl) -> Rc<Self> {
        Rc::new(Self {
            fns: RefCell::new(decl.fns()),
        })
    }

    /// Swaps the target handlers without touching the registration.
    pub fn retarget(&self, decl: &ListenerDecl) {
        self.fns.replace(decl.fns());
    }

    /// Invokes every target through error containment, snapshotting the
    /// list first. Returns the single handler's value when there is exactly
    /// one target.
    pub fn invoke(&self, vm: Option<&Instance>, args: &[Value]) -> Option<Value> {
        let fns = self.fns.borrow().clone();
        if fns.len() == 1 {
            return invoke_with_handling(|| fns[0](args), vm, "v-on handler");
        }
        for f in &fns {
            invoke_with_handling(|| f(args), vm, "v-on handler");
        }
        None
    }
}

/// Splits the once marker (`~` prefix) off an event name.
pub fn normalize_event(name: &str) -> (Rc<str>, bool) {
    match name.strip_prefix('~') {
        Some(rest) => (Rc::from(rest), true),
        None => (Rc::from(name), false),
    }
}

/// A listener registration currently live on the child's event bus.
pub struct BoundListener {
    pub invoker: Rc<Invoker>,
    pub handler: EventHandlerFn,
    pub once: bool,
}

pub type BoundListeners = HashMap<Rc<str>, BoundListener>;

/// Reconciles the live listener table against a new declaration map:
/// retargets entries present in both, adds new ones, removes vanished ones.
pub fn update_listeners(
    on: &ListenerDecls,
    bound: &mut BoundListeners,
    add: &mut dyn FnMut(&Rc<str>, EventHandlerFn, bool),
    remove: &mut dyn FnMut(&Rc<str>, &EventHandlerFn),
    vm: &Instance,
) {
    let mut seen: HashSet<Rc<str>> = HashSet::default();
    for (raw_name, decl) in on {
        let (name, once) = normalize_event(raw_name);
        seen.insert(name.clone());
        match bound.get(&name) {
            Some(existing) => {
                existing.invoker.retarget(decl);
            }
            None => {
                let invoker = Invoker::new(decl);
                let handler = invoker_handler(&invoker, vm);
                add(&name, handler.clone(), once);
                bound.insert(
                    name,
                    BoundListener {
                        invoker,
                        handler,
                        once,
                    },
                );
            }
        }
    }
    let stale: Vec<Rc<str>> = bound
        .keys()
        .filter(|name| !seen.contains(*name))
        .cloned()
        .collect();
    for name in stale {
        if let Some(entry) = bound.remove(&name) {
            remove(&name, &entry.handler);
        }
    }
}

fn invoker_handler(invoker: &Rc<Invoker>, vm: &Instance) -> EventHandlerFn {
    let invoker = invoker.clone();
    let owner = vm.downgrade();
    Rc::new(move |args| {
        let vm = owner.upgrade().map(Instance::from_rc);
        let value = invoker.invoke(vm.as_ref(), args).unwrap_or(Value::Null);
        Ok(HookValue::Sync(value))
    })
}
