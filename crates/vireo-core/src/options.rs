//! Component descriptions: options, lifecycle phases, and constructor
//! chains with explicitly invalidated resolved-option caches.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{HookResult, HookValue, InstanceError};
use crate::instance::Instance;
use crate::listeners::EventHandlerFn;
use crate::props::{PropDefault, PropOptions};
use crate::value::Value;
use crate::vnode::VNode;

/// The fixed set of lifecycle phases. Hook registration and dispatch index
/// this enum; there is no dynamic hook-name lookup anywhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LifecyclePhase {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeDestroy,
    Destroyed,
    Activated,
    Deactivated,
}

impl LifecyclePhase {
    pub const COUNT: usize = 10;

    pub const ALL: [LifecyclePhase; Self::COUNT] = [
        LifecyclePhase::BeforeCreate,
        LifecyclePhase::Created,
        LifecyclePhase::BeforeMount,
        LifecyclePhase::Mounted,
        LifecyclePhase::BeforeUpdate,
        LifecyclePhase::Updated,
        LifecyclePhase::BeforeDestroy,
        LifecyclePhase::Destroyed,
        LifecyclePhase::Activated,
        LifecyclePhase::Deactivated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LifecyclePhase::BeforeCreate => "before_create",
            LifecyclePhase::Created => "created",
            LifecyclePhase::BeforeMount => "before_mount",
            LifecyclePhase::Mounted => "mounted",
            LifecyclePhase::BeforeUpdate => "before_update",
            LifecyclePhase::Updated => "updated",
            LifecyclePhase::BeforeDestroy => "before_destroy",
            LifecyclePhase::Destroyed => "destroyed",
            LifecyclePhase::Activated => "activated",
            LifecyclePhase::Deactivated => "deactivated",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

pub type LifecycleHookFn = Rc<dyn Fn(&Instance) -> HookResult>;

/// Capture hook: `Ok(false)` stops the error from propagating further.
pub type ErrorCapturedFn = Rc<dyn Fn(&InstanceError, &Instance, &str) -> Result<bool, InstanceError>>;

pub type RenderFn = Rc<dyn Fn(&Instance) -> Result<VNode, InstanceError>>;
pub type RenderErrorFn = Rc<dyn Fn(&Instance, &InstanceError) -> Result<VNode, InstanceError>>;
pub type DataFn = Rc<dyn Fn(&Instance) -> Result<Value, InstanceError>>;
pub type ComputedFn = Rc<dyn Fn(&Instance) -> Result<Value, InstanceError>>;
pub type MethodFn = Rc<dyn Fn(&Instance, &[Value]) -> HookResult>;
pub type WatchHandlerFn = Rc<dyn Fn(&Instance, &Value, &Value) -> HookResult>;
pub type ProvideFn = Rc<dyn Fn(&Instance) -> Result<Vec<(Rc<str>, Value)>, InstanceError>>;

/// Ordered hook lists, one per phase.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    slots: [Vec<LifecycleHookFn>; LifecyclePhase::COUNT],
}

impl LifecycleHooks {
    pub fn push(&mut self, phase: LifecyclePhase, hook: LifecycleHookFn) {
        self.slots[phase.index()].push(hook);
    }

    pub fn get(&self, phase: LifecyclePhase) -> &[LifecycleHookFn] {
        &self.slots[phase.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Vec::is_empty)
    }

    /// Parent hooks run before child hooks for the same phase.
    fn merged(parent: &Self, child: &Self) -> Self {
        let mut merged = Self::default();
        for phase in LifecyclePhase::ALL {
            let slot = &mut merged.slots[phase.index()];
            slot.extend(parent.get(phase).iter().cloned());
            slot.extend(child.get(phase).iter().cloned());
        }
        merged
    }
}

#[derive(Clone)]
pub struct WatchDecl {
    pub key: Rc<str>,
    pub handler: WatchHandlerFn,
    pub immediate: bool,
    pub sync: bool,
}

#[derive(Clone)]
pub struct InjectDecl {
    /// Name the value is exposed under on the instance.
    pub key: Rc<str>,
    /// Name looked up in the ancestor provided table.
    pub from: Rc<str>,
    pub default: Option<PropDefault>,
}

#[derive(Clone, Default)]
pub struct ComponentOptions {
    pub name: Option<Rc<str>>,
    /// Abstract instances (cache boundaries and the like) are skipped when
    /// children link to their nearest concrete parent.
    pub abstract_component: bool,
    pub data: Option<DataFn>,
    pub props: Vec<(Rc<str>, PropOptions)>,
    pub computed: Vec<(Rc<str>, ComputedFn)>,
    pub methods: Vec<(Rc<str>, MethodFn)>,
    pub watch: Vec<WatchDecl>,
    pub hooks: LifecycleHooks,
    pub error_captured: Vec<ErrorCapturedFn>,
    pub render: Option<RenderFn>,
    pub render_error: Option<RenderErrorFn>,
    pub inject: Vec<InjectDecl>,
    pub provide: Option<ProvideFn>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop_decl(&self, key: &str) -> Option<&PropOptions> {
        self.props
            .iter()
            .find(|(name, _)| &**name == key)
            .map(|(_, prop)| prop)
    }
}

fn merge_keyed<T: Clone>(parent: &[(Rc<str>, T)], child: &[(Rc<str>, T)]) -> Vec<(Rc<str>, T)> {
    let mut merged: Vec<(Rc<str>, T)> = parent.to_vec();
    for (key, value) in child {
        match merged.iter_mut().find(|(name, _)| name == key) {
            Some(slot) => slot.1 = value.clone(),
            None => merged.push((key.clone(), value.clone())),
        }
    }
    merged
}

/// Pure merge of a child option record over a parent one. Hooks
/// concatenate (parent first), keyed tables override per key, scalar
/// options are child-wins.
pub fn merge_options(parent: &ComponentOptions, child: &ComponentOptions) -> ComponentOptions {
    let mut inject = parent.inject.clone();
    for decl in &child.inject {
        match inject.iter_mut().find(|d| d.key == decl.key) {
            Some(slot) => *slot = decl.clone(),
            None => inject.push(decl.clone()),
        }
    }
    let mut watch = parent.watch.clone();
    watch.extend(child.watch.iter().cloned());
    let mut error_captured = parent.error_captured.clone();
    error_captured.extend(child.error_captured.iter().cloned());
    ComponentOptions {
        name: child.name.clone().or_else(|| parent.name.clone()),
        abstract_component: child.abstract_component,
        data: child.data.clone().or_else(|| parent.data.clone()),
        props: merge_keyed(&parent.props, &child.props),
        computed: merge_keyed(&parent.computed, &child.computed),
        methods: merge_keyed(&parent.methods, &child.methods),
        watch,
        hooks: LifecycleHooks::merged(&parent.hooks, &child.hooks),
        error_captured,
        render: child.render.clone().or_else(|| parent.render.clone()),
        render_error: child
            .render_error
            .clone()
            .or_else(|| parent.render_error.clone()),
        inject,
        provide: child.provide.clone().or_else(|| parent.provide.clone()),
    }
}

/// A component constructor: an option record plus an optional super chain.
///
/// Resolved options are merged top-down over the chain and cached; the
/// cache key is an explicit version stamp bumped by [`ComponentType::
/// update_options`], never a reference-inequality poll.
pub struct ComponentType {
    options: RefCell<Rc<ComponentOptions>>,
    super_type: Option<Rc<ComponentType>>,
    version: Cell<u64>,
    cache: RefCell<Option<(u64, Rc<ComponentOptions>)>>,
}

impl ComponentType {
    pub fn new(options: ComponentOptions) -> Rc<Self> {
        Rc::new(Self {
            options: RefCell::new(Rc::new(options)),
            super_type: None,
            version: Cell::new(0),
            cache: RefCell::new(None),
        })
    }

    /// Derives a subtype whose options merge over this chain's.
    pub fn extend(self: &Rc<Self>, options: ComponentOptions) -> Rc<Self> {
        Rc::new(Self {
            options: RefCell::new(Rc::new(options)),
            super_type: Some(self.clone()),
            version: Cell::new(0),
            cache: RefCell::new(None),
        })
    }

    pub fn own_options(&self) -> Rc<ComponentOptions> {
        self.options.borrow().clone()
    }

    /// Mutates this link's options and invalidates every cached resolution
    /// downstream of it (their stamps stop matching).
    pub fn update_options(&self, f: impl FnOnce(&mut ComponentOptions)) {
        let mut options = (**self.options.borrow()).clone();
        f(&mut options);
        self.options.replace(Rc::new(options));
        self.version.set(self.version.get() + 1);
    }

    fn chain_stamp(&self) -> u64 {
        let base = self
            .super_type
            .as_ref()
            .map(|s| s.chain_stamp())
            .unwrap_or(0);
        base.wrapping_mul(1_000_003) ^ self.version.get()
    }

    /// The immutable merged view over the whole chain.
    pub fn resolved_options(&self) -> Rc<ComponentOptions> {
        let stamp = self.chain_stamp();
        if let Some((cached_stamp, cached)) = self.cache.borrow().as_ref() {
            if *cached_stamp == stamp {
                return cached.clone();
            }
        }
        let resolved = match &self.super_type {
            Some(super_type) => Rc::new(merge_options(
                &super_type.resolved_options(),
                &self.options.borrow(),
            )),
            None => self.options.borrow().clone(),
        };
        self.cache.replace(Some((stamp, resolved.clone())));
        resolved
    }
}

/// Wraps an infallible closure as a lifecycle hook.
pub fn lifecycle_hook(f: impl Fn(&Instance) + 'static) -> LifecycleHookFn {
    Rc::new(move |vm| {
        f(vm);
        Ok(HookValue::Sync(Value::Null))
    })
}

/// Wraps an infallible closure as an event handler.
pub fn event_handler(f: impl Fn(&[Value]) + 'static) -> EventHandlerFn {
    Rc::new(move |args| {
        f(args);
        Ok(HookValue::Sync(Value::Null))
    })
}
