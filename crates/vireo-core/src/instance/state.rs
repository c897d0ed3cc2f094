//! State initialization: props, methods, data, computed properties and
//! declared watchers, in that order, so later sections can read earlier
//! ones during their setup.

use std::rc::Rc;

use crate::error::{handle_error, invoke_with_handling};
use crate::instance::{lifecycle, Instance};
use crate::options::{DataFn, WatchHandlerFn};
use crate::props::validate_prop;
use crate::reactive::dep::{is_tracking, TargetGuard};
use crate::reactive::state::{observe, toggle_observing, ReactiveMap};
use crate::reactive::watcher::{Watcher, WatcherOptions};
use crate::value::Value;

pub(crate) fn init_state(vm: &Instance) {
    let _scope = vm.inner.scope.enter();
    let options = vm.options();

    // Props. Child props skip deep observation of parent-owned values; a
    // root instance owns its prop values and observes them normally.
    let is_root = vm.placeholder_vnode().is_none();
    let props_data = vm
        .placeholder_vnode()
        .and_then(|node| node.with_component(|record| record.props_data.clone()))
        .unwrap_or_default();
    vm.inner.raw_props.replace(props_data.clone());
    let prev = toggle_observing(is_root);
    for (key, prop) in &options.props {
        let value = validate_prop(key, prop, &props_data, Some(vm));
        let name = key.clone();
        let guard: Rc<dyn Fn()> = Rc::new(move || {
            if !lifecycle::is_updating_child() {
                log::warn!(
                    "Avoid mutating a prop directly: the value will be overwritten whenever \
                     the parent component re-renders. Prop being mutated: \"{name}\""
                );
            }
        });
        vm.inner.props.define(key.clone(), value, Some(guard), false);
    }
    toggle_observing(prev);

    for (key, method) in &options.methods {
        if vm.inner.props.contains_key(key) {
            log::warn!("Method \"{key}\" has already been defined as a prop");
        }
        vm.inner
            .methods
            .borrow_mut()
            .insert(key.clone(), method.clone());
    }

    let data = match &options.data {
        Some(data_fn) => eval_data(vm, data_fn),
        None => Rc::new(ReactiveMap::new()),
    };
    for key in data.keys() {
        if vm.inner.methods.borrow().contains_key(&key) {
            log::warn!("Method \"{key}\" has already been defined as a data property");
        }
        if vm.inner.props.contains_key(&key) {
            log::warn!(
                "The data property \"{key}\" is already declared as a prop. \
                 Use prop default value instead."
            );
        }
    }
    observe(&Value::Map(data.clone()));
    data.inc_vm_count();
    vm.inner.data.replace(Some(data));

    for (key, getter) in &options.computed {
        if vm
            .inner
            .data
            .borrow()
            .as_ref()
            .map_or(false, |data| data.contains_key(key))
        {
            log::warn!("The computed property \"{key}\" is already defined in data");
        } else if vm.inner.props.contains_key(key) {
            log::warn!("The computed property \"{key}\" is already defined as a prop");
        }
        let weak = vm.downgrade();
        let getter = getter.clone();
        let watcher = Watcher::new(
            Some(vm),
            Box::new(move || match weak.upgrade().map(Instance::from_rc) {
                Some(vm) => getter(&vm),
                None => Ok(Value::Null),
            }),
            None,
            WatcherOptions {
                lazy: true,
                ..WatcherOptions::default()
            },
            false,
        );
        vm.inner.computed.borrow_mut().insert(key.clone(), watcher);
    }

    for decl in &options.watch {
        let watcher = vm.watch(
            &decl.key,
            decl.handler.clone(),
            WatchOptions {
                immediate: decl.immediate,
                sync: decl.sync,
            },
        );
        vm.inner.user_watchers.borrow_mut().push(watcher);
    }
}

/// Runs the data function with tracking suspended, so props it reads do not
/// become dependencies of whoever happens to be initializing the instance.
fn eval_data(vm: &Instance, data_fn: &DataFn) -> Rc<ReactiveMap> {
    let _guard = TargetGuard::suspend();
    match data_fn(vm) {
        Ok(Value::Map(map)) => map,
        Ok(Value::Null) => Rc::new(ReactiveMap::new()),
        Ok(other) => {
            log::warn!(
                "data functions should return an object, got {}",
                other.type_name()
            );
            Rc::new(ReactiveMap::new())
        }
        Err(err) => {
            handle_error(&err, Some(vm), "data()");
            Rc::new(ReactiveMap::new())
        }
    }
}

/// Reads a computed property: re-evaluates when dirty, re-registers its
/// dependencies on the outer watcher when one is tracking.
pub(crate) fn computed_value(vm: &Instance, key: &str) -> Option<Value> {
    let watcher = vm.inner.computed.borrow().get(key).cloned()?;
    watcher.evaluate_if_dirty();
    if is_tracking() {
        watcher.depend();
    }
    Some(watcher.value())
}

#[derive(Clone, Copy, Default)]
pub struct WatchOptions {
    /// Fire the callback immediately with the current value.
    pub immediate: bool,
    /// Re-run synchronously on change instead of through the batch queue.
    pub sync: bool,
}

impl Instance {
    /// Watches a state key. The returned watcher handle keeps the watch
    /// alive; call [`Watcher::teardown`] to stop it.
    #[must_use = "dropping the handle without teardown leaks the subscription until destroy"]
    pub fn watch(&self, key: &str, handler: WatchHandlerFn, options: WatchOptions) -> Watcher {
        let _scope = self.inner.scope.enter();
        let key: Rc<str> = Rc::from(key);
        let weak = self.downgrade();
        let getter_key = key.clone();
        let getter = Box::new(move || {
            let value = weak
                .upgrade()
                .map(Instance::from_rc)
                .and_then(|vm| vm.get(&getter_key))
                .unwrap_or(Value::Null);
            Ok(value)
        });
        let weak = self.downgrade();
        let cb_handler = handler.clone();
        let label = format!("callback for watcher \"{key}\"");
        let callback = Box::new(move |old: &Value, new: &Value| {
            if let Some(vm) = weak.upgrade().map(Instance::from_rc) {
                invoke_with_handling(|| cb_handler(&vm, old, new), Some(&vm), &label);
            }
        });
        let watcher = Watcher::new(
            Some(self),
            getter,
            Some(callback),
            WatcherOptions {
                sync: options.sync,
                ..WatcherOptions::default()
            },
            false,
        );
        if options.immediate {
            let _guard = TargetGuard::suspend();
            let value = watcher.value();
            invoke_with_handling(
                || handler(self, &Value::Null, &value),
                Some(self),
                &format!("callback for immediate watcher \"{key}\""),
            );
        }
        watcher
    }
}
