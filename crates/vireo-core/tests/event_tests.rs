use vireo_core::*;
use std::cell::RefCell;
use std::rc::Rc;
use vireo_testing::mount;

thread_local! {
    static EVENT_LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

fn log_event(entry: impl Into<String>) {
    EVENT_LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn taken_log() -> Vec<String> {
    EVENT_LOG.with(|log| log.borrow_mut().drain(..).collect())
}

fn plain_type() -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    options.render = Some(Rc::new(|_vm| Ok(VNode::text("x"))));
    ComponentType::new(options)
}

#[test]
fn emit_calls_handlers_in_subscription_order_with_args() {
    let harness = mount(&plain_type());
    let vm = harness.root();
    vm.on(
        "ping",
        event_handler(|args| log_event(format!("first {:?}", args[0]))),
    );
    vm.on("ping", event_handler(|_args| log_event("second")));
    vm.emit("ping", &[Value::from(7)]);
    assert_eq!(taken_log(), vec!["first 7", "second"]);
}

#[test]
fn event_names_match_exactly() {
    let harness = mount(&plain_type());
    let vm = harness.root();
    vm.on("myevent", event_handler(|_args| log_event("lower")));
    vm.emit("myEvent", &[]);
    assert!(taken_log().is_empty());
    vm.emit("myevent", &[]);
    assert_eq!(taken_log(), vec!["lower"]);
}

#[test]
fn name_sequences_register_and_unregister_every_event() {
    let harness = mount(&plain_type());
    let vm = harness.root();
    let handler = event_handler(|args| log_event(format!("heard {:?}", args[0])));
    vm.on_many(&["start", "stop"], handler.clone());
    vm.emit("start", &[Value::from(1)]);
    vm.emit("stop", &[Value::from(2)]);
    assert_eq!(taken_log(), vec!["heard 1", "heard 2"]);

    vm.off_many(&["start", "stop"], Some(&handler));
    vm.emit("start", &[Value::from(3)]);
    vm.emit("stop", &[Value::from(4)]);
    assert!(taken_log().is_empty());
}

#[test]
fn once_unsubscribes_before_the_handler_runs() {
    let harness = mount(&plain_type());
    let vm = harness.root();
    let inner = vm.clone();
    vm.once(
        "ping",
        event_handler(move |_args| {
            log_event("once");
            // Re-emitting from inside must not re-enter.
            inner.emit("ping", &[]);
        }),
    );
    vm.emit("ping", &[]);
    vm.emit("ping", &[]);
    assert_eq!(taken_log(), vec!["once"]);
}

#[test]
fn off_with_the_original_handler_removes_a_once_registration() {
    let harness = mount(&plain_type());
    let vm = harness.root();
    let handler = event_handler(|_args| log_event("never"));
    vm.once("ping", handler.clone());
    vm.off(Some("ping"), Some(&handler));
    vm.emit("ping", &[]);
    assert!(taken_log().is_empty());
}

#[test]
fn off_variants_clear_selectively() {
    let harness = mount(&plain_type());
    let vm = harness.root();
    let keep = event_handler(|_args| log_event("keep"));
    let drop_me = event_handler(|_args| log_event("drop"));
    vm.on("ping", keep.clone());
    vm.on("ping", drop_me.clone());
    vm.on("pong", event_handler(|_args| log_event("pong")));

    vm.off(Some("ping"), Some(&drop_me));
    vm.emit("ping", &[]);
    assert_eq!(taken_log(), vec!["keep"]);

    vm.off(Some("ping"), None);
    vm.emit("ping", &[]);
    assert!(taken_log().is_empty());

    vm.off(None, None);
    vm.emit("pong", &[]);
    assert!(taken_log().is_empty());
}

fn parent_with_listener(
    child_type: &Rc<ComponentType>,
    listener_for: impl Fn(&Instance) -> ListenerDecl + 'static,
    event_name: &'static str,
) -> Rc<ComponentType> {
    let mut options = ComponentOptions::new();
    options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("generation"), Value::from(0))]))
    }));
    let child_type = child_type.clone();
    options.render = Some(Rc::new(move |vm| {
        // Read so re-renders re-create the listener declaration.
        let _ = vm.get("generation");
        let mut data = VNodeData::default();
        data.on.insert(Rc::from(event_name), listener_for(vm));
        Ok(create_component_vnode(&child_type, data, Vec::new(), vm))
    }));
    ComponentType::new(options)
}

#[test]
fn declared_listeners_receive_child_emissions() {
    let child_type = plain_type();
    let parent_type = parent_with_listener(
        &child_type,
        |_vm| ListenerDecl::One(event_handler(|args| log_event(format!("got {:?}", args[0])))),
        "notify",
    );
    let harness = mount(&parent_type);
    let child = harness.root().children().pop().expect("child instance");
    child.emit("notify", &[Value::str("hi")]);
    assert_eq!(taken_log(), vec!["got \"hi\""]);
}

#[test]
fn listener_reconciliation_retargets_in_place() {
    let child_type = plain_type();
    let parent_type = parent_with_listener(
        &child_type,
        |vm| {
            let generation = vm.get("generation").unwrap_or(Value::Null);
            ListenerDecl::One(event_handler(move |_args| {
                log_event(format!("gen {generation:?}"))
            }))
        },
        "notify",
    );
    let harness = mount(&parent_type);
    let child = harness.root().children().pop().expect("child instance");

    child.emit("notify", &[]);
    assert_eq!(taken_log(), vec!["gen 0"]);

    harness.root().set("generation", Value::from(1));
    harness.flush();
    child.emit("notify", &[]);
    assert_eq!(
        taken_log(),
        vec!["gen 1"],
        "fresh closure reached through the retargeted invoker"
    );
}

#[test]
fn once_prefixed_declarations_fire_a_single_time() {
    let child_type = plain_type();
    let parent_type = parent_with_listener(
        &child_type,
        |_vm| ListenerDecl::One(event_handler(|_args| log_event("once"))),
        "~notify",
    );
    let harness = mount(&parent_type);
    let child = harness.root().children().pop().expect("child instance");
    child.emit("notify", &[]);
    child.emit("notify", &[]);
    assert_eq!(taken_log(), vec!["once"]);
}

#[test]
fn vanished_declarations_unsubscribe() {
    let child_type = plain_type();
    let mut options = ComponentOptions::new();
    options.data = Some(Rc::new(|_vm| {
        Ok(Value::map([(Rc::from("listen"), Value::from(true))]))
    }));
    let render_child = child_type.clone();
    options.render = Some(Rc::new(move |vm| {
        let mut data = VNodeData::default();
        if vm.get("listen").and_then(|v| v.as_bool()) == Some(true) {
            data.on.insert(
                Rc::from("notify"),
                ListenerDecl::One(event_handler(|_args| log_event("heard"))),
            );
        }
        Ok(create_component_vnode(&render_child, data, Vec::new(), vm))
    }));
    let harness = mount(&ComponentType::new(options));
    let child = harness.root().children().pop().expect("child instance");

    child.emit("notify", &[]);
    assert_eq!(taken_log(), vec!["heard"]);

    harness.root().set("listen", Value::from(false));
    harness.flush();
    child.emit("notify", &[]);
    assert!(taken_log().is_empty());
}
