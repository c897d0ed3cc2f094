//! Render invocation: slot plumbing, the reactive `$attrs`/`$listeners`
//! surfaces, and error fallbacks around the user render function.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::handle_error;
use crate::instance::{lifecycle, Instance, InstanceInner};
use crate::reactive::scheduler;
use crate::slots::{normalize_scoped_slots, resolve_slots};
use crate::vnode::VNode;

thread_local! {
    static RENDER_STACK: RefCell<Vec<Weak<InstanceInner>>> = const { RefCell::new(Vec::new()) };
}

/// The instance whose render function is currently executing, if any.
pub fn current_rendering() -> Option<Instance> {
    RENDER_STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .and_then(Weak::upgrade)
            .map(Instance::from_rc)
    })
}

struct RenderGuard;

impl RenderGuard {
    fn enter(vm: &Instance) -> Self {
        RENDER_STACK.with(|stack| stack.borrow_mut().push(vm.downgrade()));
        RenderGuard
    }
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        RENDER_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub(crate) fn init_render(vm: &Instance) {
    let placeholder = vm.placeholder_vnode();
    if let Some(placeholder) = &placeholder {
        if let Some(children) = placeholder.with_component(|record| record.children.clone()) {
            let parent = vm.parent();
            vm.inner.raw_children.replace(children.clone());
            vm.inner
                .slots
                .replace(resolve_slots(&children, parent.as_ref()));
        }
        vm.inner.attrs.set(placeholder.data().attrs);
        if let Some(listeners) = placeholder.with_component(|record| record.listeners.clone()) {
            vm.inner.listeners.set(listeners);
        }
    }
    // Writes to these surfaces belong to reconciliation alone.
    vm.inner.attrs.set_setter_guard(Some(Rc::new(|| {
        if !lifecycle::is_updating_child() {
            log::warn!("$attrs is readonly");
        }
    })));
    vm.inner.listeners.set_setter_guard(Some(Rc::new(|| {
        if !lifecycle::is_updating_child() {
            log::warn!("$listeners is readonly");
        }
    })));
}

/// Runs the instance's render function and returns the next tree.
///
/// A render failure is contained: the `render_error` option gets a chance
/// to produce a fallback tree, then the previous rendered tree is reused
/// (a patch of a tree against itself must be a no-op in the backend), then
/// an empty placeholder node.
pub(crate) fn render_tree(vm: &Instance) -> VNode {
    let placeholder = vm.placeholder_vnode();
    if let Some(placeholder) = &placeholder {
        let scoped = placeholder.data().scoped_slots;
        let normalized = normalize_scoped_slots(scoped.as_ref(), &vm.inner.slots.borrow());
        vm.inner.scoped_slots.replace(normalized);
    }

    let _guard = RenderGuard::enter(vm);
    let options = vm.options();
    let tree = match &options.render {
        Some(render) => match render(vm) {
            Ok(tree) => Some(tree),
            Err(err) => {
                handle_error(&err, Some(vm), "render");
                match &options.render_error {
                    Some(render_error) => match render_error(vm, &err) {
                        Ok(tree) => Some(tree),
                        Err(inner) => {
                            handle_error(&inner, Some(vm), "render_error");
                            None
                        }
                    },
                    None => None,
                }
            }
        },
        None => None,
    };
    let tree = tree
        .or_else(|| vm.rendered_vnode())
        .unwrap_or_else(VNode::empty);
    tree.set_parent(placeholder);
    tree.set_context(vm.downgrade());
    tree
}

impl Instance {
    /// Defers `callback` until after the batch flush that absorbs the
    /// current round of reactive changes. The callback is skipped when the
    /// instance is gone by then.
    pub fn next_tick(&self, callback: impl FnOnce(&Instance) + 'static) {
        let weak = self.downgrade();
        scheduler::next_tick(move || {
            if let Some(vm) = weak.upgrade().map(Instance::from_rc) {
                callback(&vm);
            }
        });
    }
}
