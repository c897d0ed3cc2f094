//! Component placeholder nodes and the hooks a patch backend drives on
//! them: init, prepatch, insert, destroy.

use std::rc::Rc;

use crate::instance::lifecycle;
use crate::instance::Instance;
use crate::options::{ComponentType, LifecyclePhase};
use crate::props::hyphenate;
use crate::reactive::scheduler;
use crate::vnode::{AttrMap, ComponentRecord, VNode, VNodeData};

/// Builds the placeholder node for a child component inside `context`'s
/// render output. Declared props are pulled out of the attrs (by name or
/// its kebab-case form); whatever remains becomes the child's `$attrs`.
/// The `on` declarations become child bus listeners, not host listeners.
pub fn create_component_vnode(
    ctor: &Rc<ComponentType>,
    mut data: VNodeData,
    children: Vec<VNode>,
    context: &Instance,
) -> VNode {
    let resolved = ctor.resolved_options();
    let mut props_data = AttrMap::default();
    for (key, _) in &resolved.props {
        if let Some(value) = data.attrs.remove(key) {
            props_data.insert(key.clone(), value);
        } else if let Some(value) = data.attrs.remove(hyphenate(key).as_str()) {
            props_data.insert(key.clone(), value);
        }
    }
    let listeners = std::mem::take(&mut data.on);

    let tag = match &resolved.name {
        Some(name) => Rc::from(format!("vireo-component-{name}").as_str()),
        None => Rc::from("vireo-component"),
    };
    let node = VNode::component(
        Some(tag),
        data,
        ComponentRecord {
            ctor: ctor.clone(),
            props_data,
            listeners,
            children,
            instance: std::cell::RefCell::new(None),
        },
    );
    node.set_context(context.downgrade());
    node
}

/// Creates and mounts the instance behind a freshly patched-in component
/// node. A kept-alive node that still has a live instance is reconciled in
/// place instead.
pub fn init_component(vnode: &VNode, hydrating: bool) {
    let existing = vnode.component_instance();
    if let Some(existing) = existing {
        if !existing.is_destroyed() && vnode.data().keep_alive {
            prepatch_component(vnode, vnode);
            return;
        }
    }
    let parent = lifecycle::active_instance();
    if let Some(vm) = Instance::new_component(vnode, parent) {
        vnode.set_component_instance(Some(vm.clone()));
        vm.mount(None, hydrating);
    }
}

/// Carries the live instance from the old placeholder to the new one and
/// reconciles it against the new props, listeners and slot children.
pub fn prepatch_component(old: &VNode, new: &VNode) {
    let Some(vm) = old.component_instance() else {
        return;
    };
    new.set_component_instance(Some(vm.clone()));
    lifecycle::update_child_instance(&vm, new);
}

/// Fired once the node's subtree is in the host tree. First insertion
/// fires `mounted`; kept-alive re-insertions activate the subtree, after
/// the whole patch when one is in flight.
pub fn insert_component(vnode: &VNode) {
    let Some(vm) = vnode.component_instance() else {
        return;
    };
    if !vm.is_mounted() {
        vm.inner.mounted.set(true);
        lifecycle::call_hook(&vm, LifecyclePhase::Mounted);
    }
    if vnode.data().keep_alive {
        match vnode.context() {
            Some(context) if context.is_mounted() => {
                let vm = vm.clone();
                scheduler::queue_post_patch(move || {
                    lifecycle::activate_child_instance(&vm, true);
                });
            }
            _ => lifecycle::activate_child_instance(&vm, true),
        }
    }
}

/// Fired when the patch removes the node. Kept-alive nodes deactivate
/// instead of destroying; everything else tears down and the node drops
/// its instance reference.
pub fn destroy_component(vnode: &VNode) {
    let Some(vm) = vnode.component_instance() else {
        return;
    };
    if vm.is_destroyed() {
        return;
    }
    if vnode.data().keep_alive {
        lifecycle::deactivate_child_instance(&vm, true);
    } else {
        vm.destroy();
        vnode.set_component_instance(None);
    }
}
