//! Dependency provision across the instance tree.
//!
//! Provided tables are cumulative and copy-on-write: an instance that
//! provides nothing shares its parent's table by reference; an instance
//! that does provide clones the inherited entries once and layers its own
//! over them. Injection resolution is therefore a single nearest-table
//! lookup, done once at init.

use std::rc::Rc;

use crate::error::handle_error;
use crate::instance::{Instance, ProvidedTable};
use crate::props::PropDefault;
use crate::value::Value;

pub(crate) fn init_injections(vm: &Instance) {
    let options = vm.options();
    if options.inject.is_empty() {
        return;
    }
    let table = inherited_table(vm);
    let mut injected = vm.inner.injected.borrow_mut();
    for decl in &options.inject {
        let found = table
            .as_ref()
            .and_then(|table| table.get(&decl.from).cloned());
        let value = match found {
            Some(value) => value,
            None => match &decl.default {
                Some(PropDefault::Value(value)) => value.clone(),
                Some(PropDefault::Factory(factory)) => match factory(vm) {
                    Ok(value) => value,
                    Err(err) => {
                        handle_error(
                            &err,
                            Some(vm),
                            &format!("default for injection \"{}\"", decl.from),
                        );
                        Value::Null
                    }
                },
                None => {
                    log::warn!("Injection \"{}\" not found", decl.from);
                    Value::Null
                }
            },
        };
        injected.insert(decl.key.clone(), value);
    }
}

pub(crate) fn init_provide(vm: &Instance) {
    let inherited = inherited_table(vm);
    let Some(provide_fn) = vm.options().provide.clone() else {
        // Nothing provided here; share the ancestor table as-is.
        vm.inner.provided.replace(inherited);
        return;
    };
    let mut table = inherited
        .map(|table| (*table).clone())
        .unwrap_or_default();
    match provide_fn(vm) {
        Ok(entries) => {
            for (key, value) in entries {
                table.insert(key, value);
            }
        }
        Err(err) => handle_error(&err, Some(vm), "provide()"),
    }
    vm.inner.provided.replace(Some(Rc::new(table)));
}

fn inherited_table(vm: &Instance) -> Option<Rc<ProvidedTable>> {
    let mut cur = vm.parent();
    while let Some(ancestor) = cur {
        if let Some(table) = ancestor.inner.provided.borrow().clone() {
            return Some(table);
        }
        cur = ancestor.parent();
    }
    None
}

impl Instance {
    /// The value this instance would see for an injection key.
    pub fn provided_value(&self, key: &str) -> Option<Value> {
        if let Some(table) = self.inner.provided.borrow().as_ref() {
            return table.get(key).cloned();
        }
        inherited_table(self).and_then(|table| table.get(key).cloned())
    }
}
