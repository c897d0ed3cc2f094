//! Component instance runtime: lifecycle, reactivity and events.
//!
//! A component is described once as a [`ComponentType`] and instantiated as
//! [`Instance`]s forming a tree. Each instance renders a [`VNode`] snapshot
//! under a render watcher; reactive state changes re-render through a
//! batched scheduler, and an opaque [`PatchBackend`] folds snapshots into
//! the host.

#![allow(clippy::missing_const_for_thread_local)]

pub mod component;
pub mod error;
pub mod instance;
pub mod listeners;
pub mod options;
pub mod props;
pub mod reactive;
pub mod slots;
mod value;
pub mod vnode;

pub use component::{
    create_component_vnode, destroy_component, init_component, insert_component,
    prepatch_component,
};
pub use error::{
    handle_error, invoke_with_handling, set_global_error_handler, GlobalErrorHandler, HookResult,
    HookValue, InstanceError,
};
pub use instance::lifecycle::{
    activate_child_instance, active_instance, call_hook, deactivate_child_instance,
};
pub use instance::render::current_rendering;
pub use instance::state::WatchOptions;
pub use instance::Instance;
pub use listeners::{EventHandlerFn, ListenerDecl};
pub use options::{
    event_handler, lifecycle_hook, merge_options, ComponentOptions, ComponentType, InjectDecl,
    LifecyclePhase, WatchDecl,
};
pub use props::{PropDefault, PropOptions, PropType};
pub use reactive::{
    flush_now, next_tick, set_tick_scheduler, DefaultScheduler, TickScheduler, Watcher,
};
pub use slots::{ScopedSlotFn, ScopedSlots, SlotMap};
pub use value::Value;
pub use vnode::{AttrMap, HostHandle, PatchBackend, PatchTarget, VNode, VNodeData};

pub mod collections;
