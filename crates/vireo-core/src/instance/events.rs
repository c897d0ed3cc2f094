//! The per-instance event bus backing `$emit` and parent `v-on` listeners.

use std::rc::Rc;

use crate::error::invoke_with_handling;
use crate::instance::Instance;
use crate::listeners::{update_listeners, EventHandlerFn};
use crate::value::Value;
use crate::vnode::ListenerDecls;

#[derive(Clone)]
pub(crate) struct EventEntry {
    pub(crate) handler: EventHandlerFn,
    /// For once-shims, the user handler the shim wraps; `off` with the
    /// user handler must find and remove the shim.
    pub(crate) original: Option<EventHandlerFn>,
}

pub(crate) fn init_events(vm: &Instance) {
    vm.inner.has_hook_event.set(false);
    let listeners = vm
        .placeholder_vnode()
        .and_then(|node| node.with_component(|record| record.listeners.clone()));
    if let Some(listeners) = listeners {
        update_component_listeners(vm, &listeners);
    }
}

/// Reconciles the parent's declared listeners onto the bus. Declarations
/// whose handlers merely changed are retargeted in place rather than
/// removed and re-added.
pub(crate) fn update_component_listeners(vm: &Instance, on: &ListenerDecls) {
    let mut bound = vm.inner.bound_listeners.take();
    {
        let target = vm.clone();
        let mut add = |name: &Rc<str>, handler: EventHandlerFn, once: bool| {
            if once {
                target.once(name, handler);
            } else {
                target.on(name, handler);
            }
        };
        let target = vm.clone();
        let mut remove = |name: &Rc<str>, handler: &EventHandlerFn| {
            target.off(Some(name), Some(handler));
        };
        update_listeners(on, &mut bound, &mut add, &mut remove, vm);
    }
    vm.inner.bound_listeners.replace(bound);
}

impl Instance {
    /// Subscribes `handler` to `event`.
    pub fn on(&self, event: &str, handler: EventHandlerFn) {
        self.push_entry(
            event,
            EventEntry {
                handler,
                original: None,
            },
        );
    }

    /// Subscribes `handler` to every event in `events`.
    pub fn on_many(&self, events: &[&str], handler: EventHandlerFn) {
        for event in events {
            self.on(event, handler.clone());
        }
    }

    /// Subscribes `handler` for a single emission. The registration removes
    /// itself before the handler runs, so re-emitting from inside the
    /// handler does not re-enter it.
    pub fn once(&self, event: &str, handler: EventHandlerFn) {
        let weak = self.downgrade();
        let name: Rc<str> = Rc::from(event);
        let original = handler.clone();
        let shim: EventHandlerFn = Rc::new(move |args| {
            if let Some(vm) = weak.upgrade().map(Instance::from_rc) {
                vm.off(Some(&name), Some(&original));
            }
            original(args)
        });
        self.push_entry(
            event,
            EventEntry {
                handler: shim,
                original: Some(handler),
            },
        );
    }

    fn push_entry(&self, event: &str, entry: EventEntry) {
        // A hook event subscription flips a flag checked at every phase
        // dispatch, so instances without one skip the bus entirely.
        if event.starts_with("hook:") {
            self.inner.has_hook_event.set(true);
        }
        let mut events = self.inner.events.borrow_mut();
        events
            .entry(Rc::from(event))
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(entry);
    }

    /// Unsubscribes. With no event name, clears the whole bus; with a name
    /// only, clears that event; with a handler, removes the registrations
    /// whose handler (or wrapped once-handler) is that exact closure.
    pub fn off(&self, event: Option<&str>, handler: Option<&EventHandlerFn>) {
        let Some(event) = event else {
            self.off_all();
            return;
        };
        let mut events = self.inner.events.borrow_mut();
        let Some(slot) = events.get_mut(event) else {
            return;
        };
        match handler {
            None => {
                // Tombstone rather than remove, so an emit snapshot taken
                // before this call still sees a stable table.
                *slot = None;
            }
            Some(handler) => {
                if let Some(entries) = slot {
                    entries.retain(|entry| {
                        !Rc::ptr_eq(&entry.handler, handler)
                            && !entry
                                .original
                                .as_ref()
                                .map_or(false, |orig| Rc::ptr_eq(orig, handler))
                    });
                }
            }
        }
    }

    /// Unsubscribes from every event in `events`; each name follows the
    /// [`Instance::off`] rules.
    pub fn off_many(&self, events: &[&str], handler: Option<&EventHandlerFn>) {
        for event in events {
            self.off(Some(event), handler);
        }
    }

    pub(crate) fn off_all(&self) {
        self.inner.events.borrow_mut().clear();
        self.inner.has_hook_event.set(false);
    }

    /// Emits `event` to every subscribed handler, in subscription order,
    /// each through error containment. Event names are matched exactly;
    /// a near-miss by letter case only gets a diagnostic.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let entries = {
            let events = self.inner.events.borrow();
            events.get(event).cloned().flatten()
        };
        let Some(entries) = entries else {
            let lowercase = event.to_lowercase();
            if lowercase != event {
                let has_lower = self
                    .inner
                    .events
                    .borrow()
                    .get(lowercase.as_str())
                    .map_or(false, Option::is_some);
                if has_lower {
                    log::warn!(
                        "Event \"{event}\" is emitted but its handler is registered for \"{lowercase}\". \
                         Event names are matched exactly."
                    );
                }
            }
            return;
        };
        let label = format!("event handler for \"{event}\"");
        for entry in entries {
            invoke_with_handling(|| (entry.handler)(args), Some(self), &label);
        }
    }
}
