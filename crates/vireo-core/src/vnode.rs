//! Render-tree snapshots and the opaque patch seam.
//!
//! A [`VNode`] is one node of the snapshot a render function produces. The
//! runtime never interprets a tree itself; it hands the previous and next
//! snapshots to a [`PatchBackend`], which owns diffing and host mutations
//! and calls back into the component vnode hooks (`component` module) when
//! it creates, reuses, inserts or removes component nodes.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::collections::map::HashMap;
use crate::instance::{Instance, InstanceInner};
use crate::listeners::ListenerDecl;
use crate::options::ComponentType;
use crate::slots::ScopedSlots;
use crate::value::Value;

/// Whatever the patch backend uses to address the mounted output.
pub type HostHandle = Rc<dyn Any>;

/// The previous render output handed to a patch call.
pub enum PatchTarget<'a> {
    /// Nothing rendered yet and no host mount point claimed.
    Empty,
    /// First render into an existing host location.
    Handle(&'a HostHandle),
    /// A previously rendered snapshot to diff against.
    Tree(&'a VNode),
}

/// Tree-diff engine seam. `patch(old, None)` tears the old tree down,
/// invoking component destroy hooks recursively.
pub trait PatchBackend {
    fn patch(
        &self,
        old: PatchTarget<'_>,
        new: Option<&VNode>,
        hydrating: bool,
        remove_only: bool,
    ) -> Option<HostHandle>;
}

pub type AttrMap = HashMap<Rc<str>, Value>;
pub type ListenerDecls = HashMap<Rc<str>, ListenerDecl>;

#[derive(Clone, Default)]
pub struct VNodeData {
    pub attrs: AttrMap,
    pub on: ListenerDecls,
    /// Named-slot assignment of this node inside its parent's children.
    pub slot: Option<Rc<str>>,
    pub scoped_slots: Option<ScopedSlots>,
    pub keep_alive: bool,
}

/// State carried by a component placeholder node.
pub struct ComponentRecord {
    pub ctor: Rc<ComponentType>,
    pub props_data: AttrMap,
    pub listeners: ListenerDecls,
    /// Raw slot children passed by the parent.
    pub children: Vec<VNode>,
    pub instance: RefCell<Option<Instance>>,
}

pub struct VNodeInner {
    tag: Option<Rc<str>>,
    data: RefCell<VNodeData>,
    children: RefCell<Vec<VNode>>,
    text: RefCell<Option<Rc<str>>>,
    comment: Cell<bool>,
    key: RefCell<Option<Rc<str>>>,
    /// Placeholder back-link: set on a rendered subtree root to the node
    /// that represents its instance in the parent's tree.
    parent: RefCell<Option<VNode>>,
    /// Instance whose render produced this node; slot resolution needs it.
    context: RefCell<Option<Weak<InstanceInner>>>,
    component: RefCell<Option<ComponentRecord>>,
}

#[derive(Clone)]
pub struct VNode {
    inner: Rc<VNodeInner>,
}

impl VNode {
    fn from_parts(
        tag: Option<Rc<str>>,
        data: VNodeData,
        children: Vec<VNode>,
        text: Option<Rc<str>>,
        comment: bool,
    ) -> Self {
        Self {
            inner: Rc::new(VNodeInner {
                tag,
                data: RefCell::new(data),
                children: RefCell::new(children),
                text: RefCell::new(text),
                comment: Cell::new(comment),
                key: RefCell::new(None),
                parent: RefCell::new(None),
                context: RefCell::new(None),
                component: RefCell::new(None),
            }),
        }
    }

    pub fn element(tag: impl AsRef<str>, data: VNodeData, children: Vec<VNode>) -> Self {
        Self::from_parts(Some(Rc::from(tag.as_ref())), data, children, None, false)
    }

    pub fn text(text: impl AsRef<str>) -> Self {
        Self::from_parts(None, VNodeData::default(), Vec::new(), Some(Rc::from(text.as_ref())), false)
    }

    /// The placeholder produced when a render yields nothing usable.
    pub fn empty() -> Self {
        Self::from_parts(None, VNodeData::default(), Vec::new(), None, true)
    }

    pub(crate) fn component(tag: Option<Rc<str>>, data: VNodeData, record: ComponentRecord) -> Self {
        let node = Self::from_parts(tag, data, Vec::new(), None, false);
        node.inner.component.replace(Some(record));
        node
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn tag(&self) -> Option<Rc<str>> {
        self.inner.tag.clone()
    }

    pub fn data(&self) -> VNodeData {
        self.inner.data.borrow().clone()
    }

    pub fn set_data(&self, data: VNodeData) {
        self.inner.data.replace(data);
    }

    pub fn children(&self) -> Vec<VNode> {
        self.inner.children.borrow().clone()
    }

    pub fn text_content(&self) -> Option<Rc<str>> {
        self.inner.text.borrow().clone()
    }

    pub fn is_comment(&self) -> bool {
        self.inner.comment.get()
    }

    pub fn key(&self) -> Option<Rc<str>> {
        self.inner.key.borrow().clone()
    }

    pub fn set_key(&self, key: Option<Rc<str>>) {
        self.inner.key.replace(key);
    }

    pub fn parent(&self) -> Option<VNode> {
        self.inner.parent.borrow().clone()
    }

    pub fn set_parent(&self, parent: Option<VNode>) {
        self.inner.parent.replace(parent);
    }

    pub fn context(&self) -> Option<Instance> {
        self.inner
            .context
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Instance::from_rc)
    }

    pub(crate) fn set_context(&self, context: Weak<InstanceInner>) {
        self.inner.context.replace(Some(context));
    }

    pub fn is_component(&self) -> bool {
        self.inner.component.borrow().is_some()
    }

    /// Runs `f` with the component record, if this is a component node.
    pub fn with_component<R>(&self, f: impl FnOnce(&ComponentRecord) -> R) -> Option<R> {
        self.inner.component.borrow().as_ref().map(f)
    }

    pub fn component_instance(&self) -> Option<Instance> {
        self.inner
            .component
            .borrow()
            .as_ref()
            .and_then(|record| record.instance.borrow().clone())
    }

    pub(crate) fn set_component_instance(&self, instance: Option<Instance>) {
        if let Some(record) = self.inner.component.borrow().as_ref() {
            record.instance.replace(instance);
        }
    }

    /// Whitespace nodes are dropped during slot resolution.
    pub fn is_whitespace(&self) -> bool {
        self.is_comment() || self.text_content().as_deref() == Some(" ")
    }
}
