//! The component instance: one live component with its state, links into
//! the instance tree, and lifecycle flags.
//!
//! An [`Instance`] is a cheap handle over shared interior state. Parent and
//! root links are weak; the strong direction of ownership runs parent →
//! `children`, and a destroyed instance nulls its own back-links so no
//! stale strong reference can resurrect a torn-down subtree.

pub mod events;
pub mod inject;
pub mod lifecycle;
pub mod render;
pub mod state;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collections::map::HashMap;
use crate::error::invoke_with_handling;
use crate::listeners::BoundListeners;
use crate::options::{ComponentOptions, ComponentType, LifecyclePhase, MethodFn};
use crate::reactive::scope::EffectScope;
use crate::reactive::state::{ReactiveCell, ReactiveMap};
use crate::reactive::watcher::Watcher;
use crate::slots::{ScopedSlots, SlotMap};
use crate::value::Value;
use crate::vnode::{AttrMap, HostHandle, ListenerDecls, PatchBackend, VNode};

use events::EventEntry;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

pub type ProvidedTable = HashMap<Rc<str>, Value>;

pub struct InstanceInner {
    pub(crate) id: u64,
    pub(crate) ctor: Rc<ComponentType>,
    /// Options resolved over the constructor chain at init time.
    pub(crate) options: RefCell<Rc<ComponentOptions>>,
    pub(crate) parent: RefCell<Weak<InstanceInner>>,
    pub(crate) children: RefCell<Vec<Instance>>,
    pub(crate) root: RefCell<Weak<InstanceInner>>,
    pub(crate) patcher: RefCell<Option<Rc<dyn PatchBackend>>>,

    /// The component node representing this instance in its parent's tree.
    pub(crate) placeholder: RefCell<Option<VNode>>,
    /// Root of the tree this instance's own render produced.
    pub(crate) rendered: RefCell<Option<VNode>>,
    pub(crate) host: RefCell<Option<HostHandle>>,

    /// Owns every watcher created for this instance.
    pub(crate) scope: EffectScope,
    pub(crate) render_watcher: RefCell<Option<Watcher>>,
    pub(crate) data: RefCell<Option<Rc<ReactiveMap>>>,
    pub(crate) props: Rc<ReactiveMap>,
    /// Raw prop bag last passed by the parent, before validation.
    pub(crate) raw_props: RefCell<AttrMap>,
    pub(crate) computed: RefCell<HashMap<Rc<str>, Watcher>>,
    /// Strong holders for watchers declared in `watch` options; `$watch`
    /// callers hold their own handle instead.
    pub(crate) user_watchers: RefCell<Vec<Watcher>>,
    pub(crate) methods: RefCell<HashMap<Rc<str>, MethodFn>>,
    pub provided: RefCell<Option<Rc<ProvidedTable>>>,
    pub(crate) injected: RefCell<HashMap<Rc<str>, Value>>,

    /// Event bus. `None` is a tombstone left by a name-only `off`.
    pub(crate) events: RefCell<HashMap<Rc<str>, Option<Vec<EventEntry>>>>,
    pub(crate) has_hook_event: Cell<bool>,
    /// Parent-declared listeners currently registered on the bus.
    pub(crate) bound_listeners: RefCell<BoundListeners>,

    /// Raw slot children as passed by the parent; reconciliation compares
    /// these, not the resolved slot map.
    pub(crate) raw_children: RefCell<Vec<VNode>>,
    pub(crate) slots: RefCell<SlotMap>,
    pub(crate) scoped_slots: RefCell<ScopedSlots>,
    pub(crate) attrs: ReactiveCell<AttrMap>,
    pub(crate) listeners: ReactiveCell<ListenerDecls>,

    pub(crate) mounted: Cell<bool>,
    pub(crate) being_destroyed: Cell<bool>,
    pub(crate) destroyed: Cell<bool>,
    /// Keep-alive activity. `None` means the instance was never part of a
    /// deactivated subtree; `Some(true)` means currently deactivated.
    pub(crate) inactive: Cell<Option<bool>>,
    /// True when this instance is the direct target of a deactivation, as
    /// opposed to being swept along inside a deactivated ancestor.
    pub(crate) direct_inactive: Cell<bool>,
}

impl InstanceInner {
    pub(crate) fn is_being_destroyed(&self) -> bool {
        self.being_destroyed.get()
    }
}

/// Handle to a component instance. Clone freely; all clones share state.
#[derive(Clone)]
pub struct Instance {
    pub inner: Rc<InstanceInner>,
}

impl Instance {
    /// Creates and initializes a root instance. Mount it with
    /// [`Instance::mount`].
    pub fn new_root(ctor: Rc<ComponentType>, patcher: Rc<dyn PatchBackend>) -> Self {
        Self::init(ctor, Some(patcher), None, None)
    }

    /// Creates a child instance for a component placeholder node. The
    /// patcher is inherited from the parent.
    pub(crate) fn new_component(placeholder: &VNode, parent: Option<Instance>) -> Option<Self> {
        let ctor = placeholder.with_component(|record| record.ctor.clone())?;
        let patcher = parent
            .as_ref()
            .and_then(|p| p.inner.patcher.borrow().clone());
        Some(Self::init(ctor, patcher, Some(placeholder.clone()), parent))
    }

    fn init(
        ctor: Rc<ComponentType>,
        patcher: Option<Rc<dyn PatchBackend>>,
        placeholder: Option<VNode>,
        parent: Option<Instance>,
    ) -> Self {
        let options = ctor.resolved_options();
        let vm = Instance {
            inner: Rc::new(InstanceInner {
                id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
                ctor,
                options: RefCell::new(options),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                root: RefCell::new(Weak::new()),
                patcher: RefCell::new(patcher),
                placeholder: RefCell::new(placeholder),
                rendered: RefCell::new(None),
                host: RefCell::new(None),
                scope: EffectScope::new(),
                render_watcher: RefCell::new(None),
                data: RefCell::new(None),
                props: Rc::new(ReactiveMap::new()),
                raw_props: RefCell::new(AttrMap::default()),
                computed: RefCell::new(HashMap::default()),
                user_watchers: RefCell::new(Vec::new()),
                methods: RefCell::new(HashMap::default()),
                provided: RefCell::new(None),
                injected: RefCell::new(HashMap::default()),
                events: RefCell::new(HashMap::default()),
                has_hook_event: Cell::new(false),
                bound_listeners: RefCell::new(BoundListeners::default()),
                raw_children: RefCell::new(Vec::new()),
                slots: RefCell::new(SlotMap::default()),
                scoped_slots: RefCell::new(ScopedSlots::default()),
                attrs: ReactiveCell::new(AttrMap::default()),
                listeners: ReactiveCell::new(ListenerDecls::default()),
                mounted: Cell::new(false),
                being_destroyed: Cell::new(false),
                destroyed: Cell::new(false),
                inactive: Cell::new(None),
                direct_inactive: Cell::new(false),
            }),
        };
        lifecycle::init_lifecycle(&vm, parent.as_ref());
        events::init_events(&vm);
        render::init_render(&vm);
        lifecycle::call_hook(&vm, LifecyclePhase::BeforeCreate);
        inject::init_injections(&vm);
        state::init_state(&vm);
        inject::init_provide(&vm);
        lifecycle::call_hook(&vm, LifecyclePhase::Created);
        vm
    }

    pub(crate) fn from_rc(inner: Rc<InstanceInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<InstanceInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn constructor(&self) -> Rc<ComponentType> {
        self.inner.ctor.clone()
    }

    pub fn options(&self) -> Rc<ComponentOptions> {
        self.inner.options.borrow().clone()
    }

    pub fn parent(&self) -> Option<Instance> {
        self.inner.parent.borrow().upgrade().map(Instance::from_rc)
    }

    pub fn root(&self) -> Option<Instance> {
        self.inner.root.borrow().upgrade().map(Instance::from_rc)
    }

    pub fn children(&self) -> Vec<Instance> {
        self.inner.children.borrow().clone()
    }

    /// The component node representing this instance in its parent's tree;
    /// `None` for a root instance.
    pub fn placeholder_vnode(&self) -> Option<VNode> {
        self.inner.placeholder.borrow().clone()
    }

    /// Root of the instance's own last rendered tree.
    pub fn rendered_vnode(&self) -> Option<VNode> {
        self.inner.rendered.borrow().clone()
    }

    pub fn host_handle(&self) -> Option<HostHandle> {
        self.inner.host.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub fn slots(&self) -> SlotMap {
        self.inner.slots.borrow().clone()
    }

    pub fn scoped_slots(&self) -> ScopedSlots {
        self.inner.scoped_slots.borrow().clone()
    }

    /// Parent-passed attributes that did not match a declared prop.
    /// Reactive; reading inside a render records a dependency.
    pub fn attrs(&self) -> AttrMap {
        self.inner.attrs.get()
    }

    /// Parent-declared listeners. Reactive, like [`Instance::attrs`].
    pub fn listeners(&self) -> ListenerDecls {
        self.inner.listeners.get()
    }

    pub(crate) fn set_render_watcher(&self, watcher: Watcher) {
        self.inner.render_watcher.replace(Some(watcher));
    }

    pub(crate) fn raw_prop_present(&self, key: &str) -> bool {
        self.inner.raw_props.borrow().contains_key(key)
    }

    pub(crate) fn peek_prop(&self, key: &str) -> Option<Value> {
        self.inner.props.peek(key)
    }

    /// Unified state lookup: props, then data, then computed, then
    /// injections. Reads record dependencies when a watcher is tracking.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.inner.props.get(key) {
            return Some(value);
        }
        if let Some(data) = self.inner.data.borrow().as_ref() {
            if let Some(value) = data.get(key) {
                return Some(value);
            }
        }
        if let Some(value) = state::computed_value(self, key) {
            return Some(value);
        }
        self.inner.injected.borrow().get(key).cloned()
    }

    /// Writes a state key. Data keys win over props; writing a prop goes
    /// through its readonly guard and warns.
    pub fn set(&self, key: &str, value: Value) {
        let in_data = self
            .inner
            .data
            .borrow()
            .as_ref()
            .map(|data| data.contains_key(key))
            .unwrap_or(false);
        if in_data {
            if let Some(data) = self.inner.data.borrow().as_ref() {
                data.set(key, value);
            }
            return;
        }
        if self.inner.props.contains_key(key) {
            self.inner.props.set(key, value);
            return;
        }
        match self.inner.data.borrow().as_ref() {
            Some(data) => data.set(key, value),
            None => log::warn!("Cannot set \"{key}\": instance has no data"),
        }
    }

    /// Calls a declared method through error containment. Returns its value
    /// unless the method failed or finished asynchronously.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Option<Value> {
        let method = self.inner.methods.borrow().get(name).cloned();
        match method {
            Some(method) => {
                invoke_with_handling(|| method(self, args), Some(self), &format!("method \"{name}\""))
            }
            None => {
                log::warn!("Method \"{name}\" is not defined");
                None
            }
        }
    }
}
