use vireo_core::*;
use std::cell::RefCell;
use std::rc::Rc;
use vireo_testing::mount;

thread_local! {
    static ERROR_LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

fn log_error_event(entry: impl Into<String>) {
    ERROR_LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn taken_log() -> Vec<String> {
    ERROR_LOG.with(|log| log.borrow_mut().drain(..).collect())
}

fn install_global_logger() {
    set_global_error_handler(Some(Rc::new(|err, _vm, label| {
        log_error_event(format!("global: {err} in {label}"));
        Ok(())
    })));
}

fn failing_child(message: &'static str) -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    options.hooks.push(
        LifecyclePhase::Created,
        Rc::new(move |_vm: &Instance| Err(InstanceError::new(message))),
    );
    options.render = Some(Rc::new(|_vm| Ok(VNode::text("child"))));
    ComponentType::new(options)
}

fn parent_of(
    child_type: &Rc<ComponentType>,
    captured: Option<Rc<dyn Fn(&InstanceError, &Instance, &str) -> Result<bool, InstanceError>>>,
) -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    if let Some(hook) = captured {
        options.error_captured.push(hook);
    }
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
fn hook_errors_never_unwind_and_reach_the_global_handler() {
    install_global_logger();
    let harness = mount(&parent_of(&failing_child("boom"), None));
    assert_eq!(taken_log(), vec!["global: boom in created hook"]);
    // Containment kept the rest of initialization going.
    assert_eq!(harness.html(), "child");
    set_global_error_handler(None);
}

#[test]
fn error_captured_false_stops_propagation() {
    install_global_logger();
    let capture = Rc::new(|err: &InstanceError, _vm: &Instance, label: &str| {
        log_error_event(format!("captured: {err} in {label}"));
        Ok(false)
    });
    let _harness = mount(&parent_of(&failing_child("boom"), Some(capture as _)));
    assert_eq!(
        taken_log(),
        vec!["captured: boom in created hook"],
        "a capturing ancestor keeps the error away from the global handler"
    );
    set_global_error_handler(None);
}

#[test]
fn error_captured_true_keeps_the_chain_going() {
    install_global_logger();
    let capture = Rc::new(|err: &InstanceError, _vm: &Instance, _label: &str| {
        log_error_event(format!("captured: {err}"));
        Ok(true)
    });
    let mid_type = parent_of(&failing_child("boom"), Some(capture as _));

    let outer_capture = Rc::new(|err: &InstanceError, _vm: &Instance, _label: &str| {
        log_error_event(format!("outer: {err}"));
        Ok(true)
    });
    let mut outer_options = ComponentOptions::new();
    outer_options.error_captured.push(outer_capture as _);
    let render_mid = mid_type.clone();
    outer_options.render = Some(Rc::new(move |vm| {
        Ok(create_component_vnode(
            &render_mid,
            VNodeData::default(),
            Vec::new(),
            vm,
        ))
    }));
    let _harness = mount(&ComponentType::new(outer_options));
    assert_eq!(
        taken_log(),
        vec!["captured: boom", "outer: boom", "global: boom in created hook"]
    );
    set_global_error_handler(None);
}

#[test]
fn failing_capture_hook_reports_to_the_global_handler() {
    install_global_logger();
    let capture = Rc::new(|_err: &InstanceError, _vm: &Instance, _label: &str| {
        Err(InstanceError::new("capture exploded"))
    });
    let _harness = mount(&parent_of(&failing_child("boom"), Some(capture as _)));
    assert_eq!(
        taken_log(),
        vec![
            "global: capture exploded in error_captured hook",
            "global: boom in created hook",
        ]
    );
    set_global_error_handler(None);
}

#[test]
fn render_error_option_produces_a_fallback_tree() {
    install_global_logger();
    let mut options = ComponentOptions::new();
    options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("fail"), Value::from(false))]))
    }));
    options.render = Some(Rc::new(|vm| {
        if vm.get("fail").and_then(|v| v.as_bool()) == Some(true) {
            Err(InstanceError::new("render broke"))
        } else {
            Ok(VNode::text("fine"))
        }
    }));
    options.render_error = Some(Rc::new(|_vm, err| {
        Ok(VNode::text(format!("fallback: {err}")))
    }));
    let harness = mount(&ComponentType::new(options));
    assert_eq!(harness.html(), "fine");

    harness.root().set("fail", Value::from(true));
    harness.flush();
    assert_eq!(harness.html(), "fallback: render broke");
    assert_eq!(taken_log(), vec!["global: render broke in render"]);
    set_global_error_handler(None);
}

#[test]
fn without_render_error_the_previous_tree_is_kept() {
    install_global_logger();
    let mut options = ComponentOptions::new();
    options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("fail"), Value::from(false))]))
    }));
    options.render = Some(Rc::new(|vm| {
        if vm.get("fail").and_then(|v| v.as_bool()) == Some(true) {
            Err(InstanceError::new("render broke"))
        } else {
            Ok(VNode::text("fine"))
        }
    }));
    let harness = mount(&ComponentType::new(options));

    harness.root().set("fail", Value::from(true));
    harness.flush();
    assert_eq!(harness.html(), "fine", "previous tree survives the failure");
    assert_eq!(taken_log(), vec!["global: render broke in render"]);
    set_global_error_handler(None);
}

#[test]
fn event_handler_errors_are_contained() {
    install_global_logger();
    let mut options = ComponentOptions::new();
    options.render = Some(Rc::new(|_vm| Ok(VNode::text("x"))));
    let harness = mount(&ComponentType::new(options));
    harness.root().on(
        "ping",
        Rc::new(|_args: &[Value]| Err(InstanceError::new("handler broke"))),
    );
    harness.root().on("ping", event_handler(|_args| log_error_event("second ran")));
    harness.root().emit("ping", &[]);
    assert_eq!(
        taken_log(),
        vec![
            "global: handler broke in event handler for \"ping\"",
            "second ran",
        ]
    );
    set_global_error_handler(None);
}

#[test]
fn async_hook_failures_surface_at_the_flush() {
    install_global_logger();
    let mut options = ComponentOptions::new();
    options.hooks.push(
        LifecyclePhase::Created,
        Rc::new(|_vm: &Instance| {
            Ok(HookValue::Async(Box::pin(async {
                Err(InstanceError::new("late boom"))
            })))
        }),
    );
    options.render = Some(Rc::new(|_vm| Ok(VNode::text("x"))));
    let harness = mount(&ComponentType::new(options));
    assert!(
        taken_log().is_empty(),
        "the continuation is adopted, not run inline"
    );

    harness.flush();
    assert_eq!(
        taken_log(),
        vec!["global: late boom in created hook (async)"]
    );
    set_global_error_handler(None);
}

#[test]
fn same_error_identity_survives_cloning() {
    let err = InstanceError::new("original");
    let clone = err.clone();
    assert!(err.same_error(&clone));
    assert!(!err.same_error(&InstanceError::new("original")));
}

#[test]
fn watcher_getter_errors_fall_back_to_null() {
    install_global_logger();
    let mut options = ComponentOptions::new();
    options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("count"), Value::from(1))]))
    }));
    options.computed = vec![(
        Rc::from("broken"),
        Rc::new(|_vm: &Instance| Err(InstanceError::new("getter broke"))) as _,
    )];
    options.render = Some(Rc::new(|_vm| Ok(VNode::text("x"))));
    let harness = mount(&ComponentType::new(options));
    assert_eq!(harness.root().get("broken"), Some(Value::Null));
    assert_eq!(taken_log(), vec!["global: getter broke in getter for watcher"]);
    set_global_error_handler(None);
}
