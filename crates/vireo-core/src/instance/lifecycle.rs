//! Lifecycle driving: mount, update, destroy, reconciliation against a new
//! placeholder, and keep-alive (de)activation walks.

use std::cell::{Cell, RefCell};
use std::rc::Weak;

use crate::error::invoke_with_handling;
use crate::instance::{events, render, Instance, InstanceInner};
use crate::options::LifecyclePhase;
use crate::props::validate_prop;
use crate::reactive::dep::TargetGuard;
use crate::reactive::state::toggle_observing;
use crate::reactive::watcher::{Watcher, WatcherOptions};
use crate::slots::resolve_slots;
use crate::value::Value;
use crate::vnode::{HostHandle, PatchTarget, VNode};

thread_local! {
    /// Instances currently patching, innermost last. A component node
    /// created while an instance patches becomes that instance's child.
    static ACTIVE_STACK: RefCell<Vec<Weak<InstanceInner>>> = const { RefCell::new(Vec::new()) };
    /// Depth of reconciliation writes in progress; readonly-surface guards
    /// stay quiet while it is nonzero.
    static UPDATING_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// The instance whose patch is currently executing, if any.
pub fn active_instance() -> Option<Instance> {
    ACTIVE_STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .and_then(Weak::upgrade)
            .map(Instance::from_rc)
    })
}

#[must_use = "ActiveGuard pops the active instance on drop"]
pub(crate) struct ActiveGuard;

pub(crate) fn push_active(vm: &Instance) -> ActiveGuard {
    ACTIVE_STACK.with(|stack| stack.borrow_mut().push(vm.downgrade()));
    ActiveGuard
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub(crate) fn is_updating_child() -> bool {
    UPDATING_DEPTH.with(|depth| depth.get() > 0)
}

struct UpdatingGuard;

impl UpdatingGuard {
    fn enter() -> Self {
        UPDATING_DEPTH.with(|depth| depth.set(depth.get() + 1));
        UpdatingGuard
    }
}

impl Drop for UpdatingGuard {
    fn drop(&mut self) {
        UPDATING_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Links the instance into the tree. An abstract instance keeps its parent
/// pointer but never appears in anyone's `children`; children of an
/// abstract instance attach to the nearest concrete ancestor.
pub(crate) fn init_lifecycle(vm: &Instance, parent: Option<&Instance>) {
    if let Some(parent) = parent {
        let mut concrete = parent.clone();
        if !vm.options().abstract_component {
            while concrete.options().abstract_component {
                match concrete.parent() {
                    Some(next) => concrete = next,
                    None => break,
                }
            }
            concrete.inner.children.borrow_mut().push(vm.clone());
        }
        vm.inner.parent.replace(parent.downgrade());
        let root = parent.root().unwrap_or_else(|| parent.clone());
        vm.inner.root.replace(root.downgrade());
    } else {
        vm.inner.root.replace(vm.downgrade());
    }
}

/// Dispatches one lifecycle phase: every registered hook in order, each
/// through error containment, with dependency tracking suspended so a hook
/// reading reactive state never subscribes the enclosing watcher. Fires the
/// matching `hook:` bus event afterwards when anyone subscribed.
pub fn call_hook(vm: &Instance, phase: LifecyclePhase) {
    let _guard = TargetGuard::suspend();
    let hooks = vm.options().hooks.get(phase).to_vec();
    let label = format!("{} hook", phase.name());
    for hook in &hooks {
        invoke_with_handling(|| hook(vm), Some(vm), &label);
    }
    if vm.inner.has_hook_event.get() {
        vm.emit(&format!("hook:{}", phase.name()), &[]);
    }
}

impl Instance {
    /// Mounts the instance: renders once under the render watcher and
    /// patches the result into `el` (or nowhere, for detached mounts).
    ///
    /// Subsequent reactive changes re-render through the shared scheduler.
    pub fn mount(&self, el: Option<HostHandle>, hydrating: bool) -> Option<HostHandle> {
        self.inner.host.replace(el);
        if self.options().render.is_none() {
            log::warn!("Failed to mount component: render function not defined");
        }
        call_hook(self, LifecyclePhase::BeforeMount);

        let hydrate_first = Cell::new(hydrating);
        let weak = self.downgrade();
        let getter = Box::new(move || {
            if let Some(vm) = weak.upgrade().map(Instance::from_rc) {
                let tree = render::render_tree(&vm);
                update_tree(&vm, tree, hydrate_first.replace(false));
            }
            Ok(Value::Null)
        });
        let weak = self.downgrade();
        let before: Box<dyn Fn()> = Box::new(move || {
            if let Some(vm) = weak.upgrade().map(Instance::from_rc) {
                if vm.is_mounted() && !vm.is_destroyed() {
                    call_hook(&vm, LifecyclePhase::BeforeUpdate);
                }
            }
        });
        let weak = self.downgrade();
        let after: Box<dyn Fn()> = Box::new(move || {
            if let Some(vm) = weak.upgrade().map(Instance::from_rc) {
                if vm.is_mounted() && !vm.is_destroyed() {
                    call_hook(&vm, LifecyclePhase::Updated);
                }
            }
        });
        // The watcher constructor runs the first render; `mounted` for
        // component instances fires from the patch's insert hook instead.
        let _scope = self.inner.scope.enter();
        Watcher::new(
            Some(self),
            getter,
            None,
            WatcherOptions {
                before: Some(before),
                after: Some(after),
                ..WatcherOptions::default()
            },
            true,
        );

        if self.placeholder_vnode().is_none() {
            self.inner.mounted.set(true);
            call_hook(self, LifecyclePhase::Mounted);
        }
        self.host_handle()
    }

    /// Forces a re-render through the normal batched path, as if a
    /// dependency of the render had changed.
    pub fn force_update(&self) {
        let watcher = self.inner.render_watcher.borrow().clone();
        if let Some(watcher) = watcher {
            watcher.update();
        }
    }

    /// Tears the instance down. Idempotent; a second call during or after
    /// teardown is a no-op.
    pub fn destroy(&self) {
        if self.inner.being_destroyed.replace(true) {
            return;
        }
        call_hook(self, LifecyclePhase::BeforeDestroy);

        if let Some(parent) = self.parent() {
            if !parent.inner.being_destroyed.get() && !self.options().abstract_component {
                parent
                    .inner
                    .children
                    .borrow_mut()
                    .retain(|child| !child.ptr_eq(self));
            }
        }

        // Tears down the render watcher, computed watchers and user
        // watchers in one sweep, dropping their closures.
        self.inner.scope.stop();
        self.inner.render_watcher.replace(None);
        if let Some(data) = self.inner.data.borrow().as_ref() {
            data.dec_vm_count();
        }
        self.inner.destroyed.set(true);

        let rendered = self.inner.rendered.take();
        if let Some(rendered) = rendered {
            rendered.set_parent(None);
            let patcher = self.inner.patcher.borrow().clone();
            if let Some(patcher) = patcher {
                patcher.patch(PatchTarget::Tree(&rendered), None, false, false);
            }
        }
        call_hook(self, LifecyclePhase::Destroyed);
        self.off_all();

        // Null every back-link so nothing strong survives past this point.
        self.inner.placeholder.replace(None);
        self.inner.parent.replace(Weak::new());
        self.inner.root.replace(Weak::new());
        self.inner.children.borrow_mut().clear();
        self.inner.computed.borrow_mut().clear();
        self.inner.user_watchers.borrow_mut().clear();
        self.inner.methods.borrow_mut().clear();
        self.inner.provided.replace(None);
        self.inner.injected.borrow_mut().clear();
        self.inner.bound_listeners.borrow_mut().clear();
        self.inner.patcher.replace(None);
    }
}

/// Swaps the instance's rendered tree for `vnode` and patches the host.
/// Propagates the new host handle up through placeholder chains, so a
/// component whose whole render is another component keeps its handle in
/// sync with the inner instance.
pub(crate) fn update_tree(vm: &Instance, vnode: VNode, hydrating: bool) {
    let prev = vm.inner.rendered.replace(Some(vnode.clone()));
    let patcher = vm.inner.patcher.borrow().clone();
    let Some(patcher) = patcher else {
        return;
    };
    let result = {
        let _active = push_active(vm);
        match prev {
            Some(prev) => patcher.patch(PatchTarget::Tree(&prev), Some(&vnode), false, false),
            None => {
                let host = vm.inner.host.borrow().clone();
                match &host {
                    Some(handle) => {
                        patcher.patch(PatchTarget::Handle(handle), Some(&vnode), hydrating, false)
                    }
                    None => patcher.patch(PatchTarget::Empty, Some(&vnode), hydrating, false),
                }
            }
        }
    };
    vm.inner.host.replace(result);

    let mut wrapper = vm.clone();
    loop {
        let placeholder = wrapper.placeholder_vnode();
        let parent = wrapper.parent();
        match (placeholder, parent) {
            (Some(placeholder), Some(parent)) => {
                let parent_rendered = parent.rendered_vnode();
                if parent_rendered.map_or(false, |tree| tree.ptr_eq(&placeholder)) {
                    parent.inner.host.replace(wrapper.host_handle());
                    wrapper = parent;
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
}

/// Reconciles a kept instance against the fresh placeholder the parent's
/// re-render produced: new attrs, listeners, props and slot children flow
/// in; the instance re-renders itself only when its slot content could
/// have changed.
pub(crate) fn update_child_instance(vm: &Instance, placeholder: &VNode) {
    let Some((props_data, listeners, children)) = placeholder.with_component(|record| {
        (
            record.props_data.clone(),
            record.listeners.clone(),
            record.children.clone(),
        )
    }) else {
        return;
    };
    let data = placeholder.data();

    // Slot-content change detection works on the raw children and the
    // scoped-slot markers, never the resolved slot map: a slot going empty
    // is itself a change the resolved map would hide.
    let old_scoped = vm.scoped_slots();
    let new_scoped = data.scoped_slots.clone();
    let has_dynamic_scoped = match &new_scoped {
        Some(scoped) => !scoped.stable || scoped.key != old_scoped.key,
        None => old_scoped.key.is_some(),
    } || (!old_scoped.is_empty() && !old_scoped.stable);
    let needs_force_update = !children.is_empty()
        || !vm.inner.raw_children.borrow().is_empty()
        || has_dynamic_scoped;

    let updating = UpdatingGuard::enter();
    vm.inner.placeholder.replace(Some(placeholder.clone()));
    if let Some(rendered) = vm.rendered_vnode() {
        rendered.set_parent(Some(placeholder.clone()));
    }
    vm.inner.raw_children.replace(children.clone());

    vm.inner.attrs.set(data.attrs.clone());
    vm.inner.listeners.set(listeners.clone());

    // Props re-validate through the same path as initial mount. The raw
    // bag is swapped in first so default-value reuse can consult it.
    vm.inner.raw_props.replace(props_data.clone());
    let prev = toggle_observing(false);
    let declared = vm.options().props.clone();
    for (key, prop) in &declared {
        let value = validate_prop(key, prop, &props_data, Some(vm));
        vm.inner.props.set(key, value);
    }
    toggle_observing(prev);

    events::update_component_listeners(vm, &listeners);

    if needs_force_update {
        let parent = vm.parent();
        vm.inner
            .slots
            .replace(resolve_slots(&children, parent.as_ref()));
        vm.force_update();
    }
    drop(updating);
}

fn in_inactive_tree(vm: &Instance) -> bool {
    let mut cur = vm.parent();
    while let Some(ancestor) = cur {
        if ancestor.inner.inactive.get() == Some(true) {
            return true;
        }
        cur = ancestor.parent();
    }
    false
}

/// Reactivates a kept-alive subtree. `direct` marks the root of the
/// activation; an instance directly deactivated earlier stays inactive
/// when an ancestor's activation sweeps over it.
pub fn activate_child_instance(vm: &Instance, direct: bool) {
    if direct {
        vm.inner.direct_inactive.set(false);
        if in_inactive_tree(vm) {
            return;
        }
    } else if vm.inner.direct_inactive.get() {
        return;
    }
    if vm.inner.inactive.get() != Some(false) {
        vm.inner.inactive.set(Some(false));
        for child in vm.children() {
            activate_child_instance(&child, false);
        }
        call_hook(vm, LifecyclePhase::Activated);
    }
}

/// Deactivates a kept-alive subtree, children first in the walk order of
/// the tree (each node's hook fires after its flag flips, before its
/// children's hooks).
pub fn deactivate_child_instance(vm: &Instance, direct: bool) {
    if direct {
        vm.inner.direct_inactive.set(true);
        if in_inactive_tree(vm) {
            return;
        }
    }
    if vm.inner.inactive.get() != Some(true) {
        vm.inner.inactive.set(Some(true));
        for child in vm.children() {
            deactivate_child_instance(&child, false);
        }
        call_hook(vm, LifecyclePhase::Deactivated);
    }
}
