use vireo_core::*;
use std::rc::Rc;
use vireo_testing::mount;

fn leaf_injecting_theme() -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    options.inject = vec![InjectDecl {
        key: Rc::from("theme"),
        from: Rc::from("theme"),
        default: None,
    }];
    // Injections resolve before state, so the data function can read them.
    options.data = Some(Rc::new(|vm| {
        let theme = vm
            .get("theme")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        Ok(Value::map([(
            Rc::from("label"),
            Value::str(format!("theme={theme}")),
        )]))
    }));
    options.render = Some(Rc::new(|vm| {
        let label = vm
            .get("label")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        Ok(VNode::text(label))
    }));
    ComponentType::new(options)
}

fn pass_through(child_type: &Rc<ComponentType>) -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    let child_type = child_type.clone();
    options.render = Some(Rc::new(move |vm| {
        Ok(create_component_vnode(
            &child_type,
            VNodeData::default(),
            Vec::new(),
            vm,
        ))
    }));
    ComponentType::new(options)
}

fn theme_provider(child_type: &Rc<ComponentType>) -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("theme"), Value::str("dark"))]))
    }));
    // Provisions publish after state; the provided value comes from data.
    options.provide = Some(Rc::new(|vm| {
        Ok(vec![(
            Rc::from("theme"),
            vm.get("theme").unwrap_or(Value::Null),
        )])
    }));
    let child_type = child_type.clone();
    options.render = Some(Rc::new(move |vm| {
        Ok(create_component_vnode(
            &child_type,
            VNodeData::default(),
            Vec::new(),
            vm,
        ))
    }));
    ComponentType::new(options)
}

#[test]
fn descendants_inject_values_provided_from_ancestor_state() {
    let leaf_type = leaf_injecting_theme();
    let middle_type = pass_through(&leaf_type);
    let harness = mount(&theme_provider(&middle_type));
    assert_eq!(harness.html(), "theme=dark");

    // A non-providing instance shares its ancestor's table by reference.
    let middle = harness.root().children().pop().expect("middle instance");
    let root_table = harness
        .root()
        .inner
        .provided
        .borrow()
        .clone()
        .expect("provider table");
    let middle_table = middle
        .inner
        .provided
        .borrow()
        .clone()
        .expect("inherited table");
    assert!(Rc::ptr_eq(&root_table, &middle_table));
}

#[test]
fn providing_layers_over_the_inherited_table() {
    let mut leaf_options = ComponentOptions::new();
    leaf_options.inject = vec![
        InjectDecl {
            key: Rc::from("theme"),
            from: Rc::from("theme"),
            default: None,
        },
        InjectDecl {
            key: Rc::from("density"),
            from: Rc::from("density"),
            default: None,
        },
    ];
    leaf_options.render = Some(Rc::new(|vm| {
        let theme = vm.get("theme").unwrap_or(Value::Null);
        let density = vm.get("density").unwrap_or(Value::Null);
        Ok(VNode::text(format!("{theme:?}/{density:?}")))
    }));
    let leaf_type = ComponentType::new(leaf_options);

    let mut middle_options = ComponentOptions::new();
    middle_options.provide = Some(Rc::new(|_vm| {
        Ok(vec![(Rc::from("density"), Value::str("compact"))])
    }));
    let render_leaf = leaf_type.clone();
    middle_options.render = Some(Rc::new(move |vm| {
        Ok(create_component_vnode(
            &render_leaf,
            VNodeData::default(),
            Vec::new(),
            vm,
        ))
    }));
    let middle_type = ComponentType::new(middle_options);

    let harness = mount(&theme_provider(&middle_type));
    assert_eq!(harness.html(), "\"dark\"/\"compact\"");

    // Copy-on-write: the overlay never leaks into the ancestor's table.
    assert_eq!(harness.root().provided_value("density"), None);
    let middle = harness.root().children().pop().expect("middle instance");
    let root_table = harness
        .root()
        .inner
        .provided
        .borrow()
        .clone()
        .expect("provider table");
    let middle_table = middle
        .inner
        .provided
        .borrow()
        .clone()
        .expect("overlay table");
    assert!(!Rc::ptr_eq(&root_table, &middle_table));
}

#[test]
fn missing_injections_fall_back_to_defaults() {
    let mut options = ComponentOptions::new();
    options.inject = vec![
        InjectDecl {
            key: Rc::from("size"),
            from: Rc::from("size"),
            default: Some(PropDefault::Value(Value::from(12))),
        },
        InjectDecl {
            key: Rc::from("mode"),
            from: Rc::from("mode"),
            default: Some(PropDefault::Factory(Rc::new(|_vm| Ok(Value::str("auto"))))),
        },
        InjectDecl {
            key: Rc::from("ghost"),
            from: Rc::from("ghost"),
            default: None,
        },
    ];
    options.render = Some(Rc::new(|_vm| Ok(VNode::text("x"))));
    let harness = mount(&ComponentType::new(options));
    let vm = harness.root();
    assert_eq!(vm.get("size"), Some(Value::from(12)));
    assert_eq!(vm.get("mode"), Some(Value::str("auto")));
    assert_eq!(
        vm.get("ghost"),
        Some(Value::Null),
        "an unresolvable injection warns and yields null"
    );
}
