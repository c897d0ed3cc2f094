use vireo_core::*;
use vireo_core::props::validate_prop;
use vireo_core::vnode::AttrMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use vireo_testing::mount;

thread_local! {
    static RECONCILE_LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

fn log_entry(entry: impl Into<String>) {
    RECONCILE_LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn taken_log() -> Vec<String> {
    RECONCILE_LOG.with(|log| log.borrow_mut().drain(..).collect())
}

fn labeled_child() -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    options.props = vec![(Rc::from("label"), PropOptions::of_type(PropType::Str))];
    options.render = Some(Rc::new(|vm| {
        let label = vm.get("label").unwrap_or(Value::Null);
        Ok(VNode::element(
            "span",
            VNodeData::default(),
            vec![VNode::text(format!("{label:?}"))],
        ))
    }));
    ComponentType::new(options)
}

fn parent_passing_label(child_type: &Rc<ComponentType>) -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([
            (Rc::from("label"), Value::str("one")),
            (Rc::from("extra"), Value::from(1)),
        ]))
    }));
    let child_type = child_type.clone();
    options.render = Some(Rc::new(move |vm| {
        let mut data = VNodeData::default();
        data.attrs
            .insert(Rc::from("label"), vm.get("label").unwrap_or(Value::Null));
        data.attrs
            .insert(Rc::from("extra"), vm.get("extra").unwrap_or(Value::Null));
        Ok(create_component_vnode(&child_type, data, Vec::new(), vm))
    }));
    ComponentType::new(options)
}

#[test]
fn prop_changes_flow_through_reconciliation() {
    let child_type = labeled_child();
    let harness = mount(&parent_passing_label(&child_type));
    assert_eq!(harness.html(), "<span>\"one\"</span>");
    let child = harness.root().children().pop().expect("child instance");

    harness.root().set("label", Value::str("two"));
    harness.flush();
    assert_eq!(harness.html(), "<span>\"two\"</span>");
    assert_eq!(child.get("label"), Some(Value::str("two")));
    assert!(
        !child.is_destroyed(),
        "the instance is reconciled, not replaced"
    );
}

#[test]
fn unchanged_props_do_not_re_render_the_child() {
    let child_renders = Rc::new(Cell::new(0u32));
    let mut child_options = ComponentOptions::new();
    child_options.props = vec![(Rc::from("label"), PropOptions::default())];
    let counter = child_renders.clone();
    child_options.render = Some(Rc::new(move |vm| {
        counter.set(counter.get() + 1);
        let label = vm.get("label").unwrap_or(Value::Null);
        Ok(VNode::text(format!("{label:?}")))
    }));
    let child_type = ComponentType::new(child_options);
    let harness = mount(&parent_passing_label(&child_type));
    assert_eq!(child_renders.get(), 1);

    // Only the undeclared attr changes; the child's prop is untouched.
    harness.root().set("extra", Value::from(2));
    harness.flush();
    assert_eq!(child_renders.get(), 1);
}

#[test]
fn repeated_identical_reconciliation_is_idempotent() {
    let child_renders = Rc::new(Cell::new(0u32));
    let mut child_options = ComponentOptions::new();
    child_options.props = vec![(Rc::from("label"), PropOptions::default())];
    let counter = child_renders.clone();
    child_options.render = Some(Rc::new(move |vm| {
        counter.set(counter.get() + 1);
        let label = vm.get("label").unwrap_or(Value::Null);
        Ok(VNode::text(format!("{label:?}")))
    }));
    let child_type = ComponentType::new(child_options);
    let harness = mount(&parent_passing_label(&child_type));
    assert_eq!(child_renders.get(), 1);
    let child = harness.root().children().pop().expect("child instance");

    // Two parent re-renders with unchanged output reconcile the child twice
    // with identical props, listeners and (absent) slot children.
    harness.root().force_update();
    harness.flush();
    harness.root().force_update();
    harness.flush();
    assert_eq!(
        child_renders.get(),
        1,
        "an identical reconciliation triggers no child re-render"
    );
    assert!(harness
        .root()
        .children()
        .pop()
        .expect("child instance")
        .ptr_eq(&child));
}

#[test]
fn undeclared_attrs_surface_reactively() {
    let mut child_options = ComponentOptions::new();
    child_options.props = vec![(Rc::from("label"), PropOptions::default())];
    child_options.render = Some(Rc::new(|vm| {
        let extra = vm
            .attrs()
            .get("extra")
            .cloned()
            .unwrap_or(Value::Null);
        Ok(VNode::text(format!("extra={extra:?}")))
    }));
    let child_type = ComponentType::new(child_options);
    let harness = mount(&parent_passing_label(&child_type));
    assert_eq!(harness.html(), "extra=1");

    harness.root().set("extra", Value::from(2));
    harness.flush();
    assert_eq!(harness.html(), "extra=2");
}

#[test]
fn slot_children_force_the_child_to_re_render() {
    let mut child_options = ComponentOptions::new();
    child_options.render = Some(Rc::new(|vm| {
        let default_slot = vm.slots().get("default").cloned().unwrap_or_default();
        Ok(VNode::element("div", VNodeData::default(), default_slot))
    }));
    let child_type = ComponentType::new(child_options);

    let mut parent_options = ComponentOptions::new();
    parent_options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("msg"), Value::str("hello"))]))
    }));
    let render_child = child_type.clone();
    parent_options.render = Some(Rc::new(move |vm| {
        let msg = vm.get("msg").and_then(|v| v.as_str().map(str::to_owned));
        Ok(create_component_vnode(
            &render_child,
            VNodeData::default(),
            vec![VNode::text(msg.unwrap_or_default())],
            vm,
        ))
    }));
    let harness = mount(&ComponentType::new(parent_options));
    assert_eq!(harness.html(), "<div>hello</div>");

    harness.root().set("msg", Value::str("goodbye"));
    harness.flush();
    assert_eq!(harness.html(), "<div>goodbye</div>");
}

#[test]
fn named_slots_resolve_and_whitespace_is_dropped() {
    let mut child_options = ComponentOptions::new();
    child_options.render = Some(Rc::new(|vm| {
        let slots = vm.slots();
        let header = slots.get("header").cloned().unwrap_or_default();
        let body = slots.get("default").cloned().unwrap_or_default();
        let mut children = header;
        children.extend(body);
        Ok(VNode::element("div", VNodeData::default(), children))
    }));
    let child_type = ComponentType::new(child_options);

    let mut parent_options = ComponentOptions::new();
    let render_child = child_type.clone();
    parent_options.render = Some(Rc::new(move |vm| {
        let mut header = VNodeData::default();
        header.slot = Some(Rc::from("header"));
        let mut empty_footer = VNodeData::default();
        empty_footer.slot = Some(Rc::from("footer"));
        Ok(create_component_vnode(
            &render_child,
            VNodeData::default(),
            vec![
                VNode::element("h1", header, vec![VNode::text("title")]),
                VNode::text(" "),
                VNode::element("template", empty_footer, vec![VNode::text(" ")]),
                VNode::text("body"),
            ],
            vm,
        ))
    }));
    let harness = mount(&ComponentType::new(parent_options));
    let child = harness.root().children().pop().expect("child instance");
    let slots = child.slots();
    assert!(slots.contains_key("header"));
    assert!(
        !slots.contains_key("footer"),
        "whitespace-only slots are dropped"
    );
    // The default slot keeps its interior whitespace; only slots that are
    // nothing but whitespace are dropped.
    assert_eq!(harness.html(), "<div><h1>title</h1> body</div>");
}

#[test]
fn boolean_props_cast_bare_and_hyphenated_attributes() {
    let prop = PropOptions::of_type(PropType::Bool);

    let mut absent = AttrMap::default();
    absent.insert(Rc::from("other"), Value::from(1));
    assert_eq!(
        validate_prop("hasBorder", &prop, &absent, None),
        Value::Bool(false),
        "absent boolean with no default casts to false"
    );

    let mut empty = AttrMap::default();
    empty.insert(Rc::from("hasBorder"), Value::str(""));
    assert_eq!(
        validate_prop("hasBorder", &prop, &empty, None),
        Value::Bool(true),
        "empty string casts to true"
    );

    let mut named = AttrMap::default();
    named.insert(Rc::from("hasBorder"), Value::str("has-border"));
    assert_eq!(
        validate_prop("hasBorder", &prop, &named, None),
        Value::Bool(true),
        "kebab-case own name casts to true"
    );

    // String declared with higher priority wins over the cast.
    let string_first = PropOptions {
        types: vec![PropType::Str, PropType::Bool],
        ..PropOptions::default()
    };
    assert_eq!(
        validate_prop("hasBorder", &string_first, &empty, None),
        Value::str("")
    );
}

#[test]
fn prop_defaults_apply_when_absent() {
    let prop = PropOptions {
        types: vec![PropType::Num],
        default: Some(PropDefault::Value(Value::from(42))),
        ..PropOptions::default()
    };
    let empty = AttrMap::default();
    assert_eq!(validate_prop("size", &prop, &empty, None), Value::from(42));

    let mut present = AttrMap::default();
    present.insert(Rc::from("size"), Value::from(7));
    assert_eq!(validate_prop("size", &prop, &present, None), Value::from(7));
}

#[test]
fn kept_alive_nodes_deactivate_and_reactivate() {
    let mut child_options = ComponentOptions::new();
    child_options.render = Some(Rc::new(|_vm| Ok(VNode::text("kept"))));
    child_options.hooks.push(
        LifecyclePhase::Activated,
        lifecycle_hook(|_vm| log_entry("activated")),
    );
    child_options.hooks.push(
        LifecyclePhase::Deactivated,
        lifecycle_hook(|_vm| log_entry("deactivated")),
    );
    child_options.hooks.push(
        LifecyclePhase::Destroyed,
        lifecycle_hook(|_vm| log_entry("destroyed")),
    );
    let child_type = ComponentType::new(child_options);

    let mut parent_options = ComponentOptions::new();
    parent_options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("show"), Value::from(true))]))
    }));
    let cache: Rc<RefCell<Option<VNode>>> = Rc::new(RefCell::new(None));
    let render_child = child_type.clone();
    let render_cache = cache.clone();
    parent_options.render = Some(Rc::new(move |vm| {
        if vm.get("show").and_then(|v| v.as_bool()) == Some(true) {
            // A cache boundary reuses the same placeholder node, which is
            // what keeps the instance alive across removals.
            let mut cached = render_cache.borrow_mut();
            let node = cached.get_or_insert_with(|| {
                let mut data = VNodeData::default();
                data.keep_alive = true;
                create_component_vnode(&render_child, data, Vec::new(), vm)
            });
            Ok(VNode::element(
                "div",
                VNodeData::default(),
                vec![node.clone()],
            ))
        } else {
            Ok(VNode::element(
                "div",
                VNodeData::default(),
                vec![VNode::empty()],
            ))
        }
    }));
    let harness = mount(&ComponentType::new(parent_options));
    assert_eq!(taken_log(), vec!["activated"]);
    let child = harness.root().children().pop().expect("child instance");

    harness.root().set("show", Value::from(false));
    harness.flush();
    assert_eq!(taken_log(), vec!["deactivated"]);
    assert!(!child.is_destroyed(), "kept-alive removal only deactivates");

    harness.root().set("show", Value::from(true));
    harness.flush();
    assert_eq!(taken_log(), vec!["activated"]);
    assert!(harness
        .root()
        .children()
        .pop()
        .expect("child instance")
        .ptr_eq(&child));
}
