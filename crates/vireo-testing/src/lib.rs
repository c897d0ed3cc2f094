//! Headless patch backend and mount harness for exercising component
//! instances in tests.
//!
//! [`TestPatcher`] implements the runtime's patch seam with a naive
//! index-based diff: it never reorders keyed lists cleverly, but it drives
//! the component vnode hooks (init, prepatch, insert, destroy) with the
//! same ordering guarantees a production backend would, which is what
//! instance-runtime tests care about. [`TestHarness`] bundles a root mount
//! with string rendering for assertions.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vireo_core::{
    destroy_component, flush_now, init_component, insert_component, prepatch_component,
    ComponentType, HostHandle, Instance, PatchBackend, PatchTarget, VNode,
};

/// In-memory patch backend. The host handle it returns is the accepted
/// vnode itself; [`render_text`] resolves component placeholders through
/// their instances when serializing.
pub struct TestPatcher {
    depth: Cell<u32>,
    /// Component nodes whose insert hook is due once the outermost patch
    /// finishes. Children land here before their ancestors.
    pending_inserts: RefCell<Vec<VNode>>,
    patches: Cell<u32>,
}

impl TestPatcher {
    pub fn new() -> Self {
        Self {
            depth: Cell::new(0),
            pending_inserts: RefCell::new(Vec::new()),
            patches: Cell::new(0),
        }
    }

    /// Number of patch calls served so far, nested ones included.
    pub fn patch_count(&self) -> u32 {
        self.patches.get()
    }

    fn create(&self, vnode: &VNode, hydrating: bool) {
        if vnode.is_component() {
            init_component(vnode, hydrating);
            self.pending_inserts.borrow_mut().push(vnode.clone());
        } else {
            for child in vnode.children() {
                self.create(&child, hydrating);
            }
        }
    }

    fn destroy(&self, vnode: &VNode) {
        if vnode.is_component() {
            destroy_component(vnode);
        } else {
            for child in vnode.children() {
                self.destroy(&child);
            }
        }
    }

    fn same_node(old: &VNode, new: &VNode) -> bool {
        if old.key() != new.key() || old.tag() != new.tag() {
            return false;
        }
        if old.is_component() != new.is_component() {
            return false;
        }
        if old.is_component() {
            let old_ctor = old.with_component(|record| record.ctor.clone());
            let new_ctor = new.with_component(|record| record.ctor.clone());
            return matches!((old_ctor, new_ctor), (Some(a), Some(b)) if Rc::ptr_eq(&a, &b));
        }
        old.is_comment() == new.is_comment()
            && old.text_content().is_some() == new.text_content().is_some()
    }

    fn patch_node(&self, old: &VNode, new: &VNode) {
        if old.ptr_eq(new) {
            return;
        }
        if new.is_component() {
            prepatch_component(old, new);
            return;
        }
        let old_children = old.children();
        let new_children = new.children();
        let common = old_children.len().min(new_children.len());
        for i in 0..common {
            if Self::same_node(&old_children[i], &new_children[i]) {
                self.patch_node(&old_children[i], &new_children[i]);
            } else {
                self.destroy(&old_children[i]);
                self.create(&new_children[i], false);
            }
        }
        for stale in &old_children[common..] {
            self.destroy(stale);
        }
        for fresh in &new_children[common..] {
            self.create(fresh, false);
        }
    }

    fn drain_inserts(&self) {
        loop {
            let next = {
                let mut pending = self.pending_inserts.borrow_mut();
                if pending.is_empty() {
                    return;
                }
                pending.remove(0)
            };
            insert_component(&next);
        }
    }
}

impl Default for TestPatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchBackend for TestPatcher {
    fn patch(
        &self,
        old: PatchTarget<'_>,
        new: Option<&VNode>,
        hydrating: bool,
        _remove_only: bool,
    ) -> Option<HostHandle> {
        self.patches.set(self.patches.get() + 1);
        self.depth.set(self.depth.get() + 1);
        let result = match new {
            Some(new_node) => {
                match old {
                    PatchTarget::Tree(old_node) if !old_node.ptr_eq(new_node) => {
                        if Self::same_node(old_node, new_node) {
                            self.patch_node(old_node, new_node);
                        } else {
                            self.create(new_node, false);
                            self.destroy(old_node);
                        }
                    }
                    // Patching a tree against itself happens when a render
                    // fell back to the previous tree; nothing to do.
                    PatchTarget::Tree(_) => {}
                    PatchTarget::Empty | PatchTarget::Handle(_) => {
                        self.create(new_node, hydrating);
                    }
                }
                Some(Rc::new(new_node.clone()) as HostHandle)
            }
            None => {
                if let PatchTarget::Tree(old_node) = old {
                    self.destroy(old_node);
                }
                None
            }
        };
        self.depth.set(self.depth.get() - 1);
        if self.depth.get() == 0 {
            self.drain_inserts();
        }
        result
    }
}

/// Serializes a rendered tree, resolving component placeholders through
/// their live instances.
pub fn render_text(vnode: &VNode) -> String {
    if vnode.is_component() {
        return match vnode.component_instance().and_then(|vm| vm.rendered_vnode()) {
            Some(tree) => render_text(&tree),
            None => String::new(),
        };
    }
    if let Some(text) = vnode.text_content() {
        return text.to_string();
    }
    if vnode.is_comment() {
        return "<!---->".to_string();
    }
    let tag = vnode.tag().unwrap_or_else(|| Rc::from("div"));
    let children: String = vnode.children().iter().map(render_text).collect();
    format!("<{tag}>{children}</{tag}>")
}

/// A mounted root instance plus the backend that drives it.
pub struct TestHarness {
    patcher: Rc<TestPatcher>,
    root: Instance,
}

/// Mounts a fresh root of `ctor` behind a [`TestPatcher`], detached from
/// any host location.
pub fn mount(ctor: &Rc<ComponentType>) -> TestHarness {
    let patcher = Rc::new(TestPatcher::new());
    let root = Instance::new_root(ctor.clone(), patcher.clone());
    root.mount(None, false);
    TestHarness { patcher, root }
}

impl TestHarness {
    pub fn root(&self) -> &Instance {
        &self.root
    }

    pub fn patcher(&self) -> &TestPatcher {
        &self.patcher
    }

    /// Current output serialized through the instance tree.
    pub fn html(&self) -> String {
        match self.root.rendered_vnode() {
            Some(tree) => render_text(&tree),
            None => String::new(),
        }
    }

    /// Runs the pending batch: queued watcher re-runs, post-patch jobs and
    /// `next_tick` callbacks.
    pub fn flush(&self) {
        flush_now();
    }

    pub fn destroy(&self) {
        self.root.destroy();
    }
}

#[cfg(test)]
#[path = "tests/harness_tests.rs"]
mod tests;
