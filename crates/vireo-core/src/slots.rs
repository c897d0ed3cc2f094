//! Slot resolution: raw slot children from the parent become the child's
//! named slot map.

use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::instance::Instance;
use crate::value::Value;
use crate::vnode::VNode;

pub type SlotMap = HashMap<Rc<str>, Vec<VNode>>;

pub type ScopedSlotFn = Rc<dyn Fn(&Value) -> Vec<VNode>>;

/// Scoped-slot content handed down by the parent. `stable` marks content
/// whose shape cannot change between parent renders; reconciliation uses it
/// (together with `key`) to decide whether a child must force-re-render.
#[derive(Clone)]
pub struct ScopedSlots {
    pub stable: bool,
    pub key: Option<Rc<str>>,
    pub entries: HashMap<Rc<str>, ScopedSlotFn>,
}

impl ScopedSlots {
    pub fn get(&self, name: &str) -> Option<ScopedSlotFn> {
        self.entries.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ScopedSlots {
    fn default() -> Self {
        // Absent scoped content counts as stable; only declared-dynamic
        // content forces child re-renders.
        Self {
            stable: true,
            key: None,
            entries: HashMap::default(),
        }
    }
}

/// Resolves raw children into a named slot map.
///
/// A node carrying a slot name lands in that slot when it was rendered in
/// the parent's own context ("template" nodes splice their children);
/// everything else goes to `default`. Slots containing only whitespace are
/// dropped — but note that *presence* checks during reconciliation look at
/// the raw children, not this map, precisely because a slot going empty is
/// itself a change.
pub fn resolve_slots(children: &[VNode], context: Option<&Instance>) -> SlotMap {
    let mut slots: SlotMap = HashMap::default();
    if children.is_empty() {
        return slots;
    }
    for child in children {
        let data = child.data();
        let same_context = match (child.context(), context) {
            (Some(child_ctx), Some(ctx)) => child_ctx.ptr_eq(ctx),
            (None, _) => true,
            _ => false,
        };
        match data.slot {
            Some(name) if same_context => {
                let slot = slots.entry(name).or_default();
                if child.tag().as_deref() == Some("template") {
                    slot.extend(child.children());
                } else {
                    slot.push(child.clone());
                }
            }
            _ => {
                slots
                    .entry(Rc::from("default"))
                    .or_default()
                    .push(child.clone());
            }
        }
    }
    slots.retain(|_, nodes| !nodes.iter().all(VNode::is_whitespace));
    slots
}

/// Folds resolved plain slots into the scoped-slot surface, so consumers
/// can reach both through one lookup. Markers come from the parent-supplied
/// scoped content.
pub fn normalize_scoped_slots(scoped: Option<&ScopedSlots>, slots: &SlotMap) -> ScopedSlots {
    let mut normalized = scoped.cloned().unwrap_or_default();
    for (name, nodes) in slots {
        if !normalized.entries.contains_key(name) {
            let nodes = nodes.clone();
            normalized
                .entries
                .insert(name.clone(), Rc::new(move |_| nodes.clone()));
        }
    }
    normalized
}
