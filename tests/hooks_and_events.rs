//! Component state, host events and the scheduling boundary.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_reconciler::{
    component, host, Component, Dispatch, HostHandle, MemoryHost, Node, Props, ReconcileError,
    Reconciler, ReconcilerConfig, RootId,
};

fn setup(config: ReconcilerConfig) -> (Reconciler<MemoryHost>, RootId, HostHandle) {
    let mut memory = MemoryHost::new();
    let container = memory.create_container();
    let mut reconciler = Reconciler::with_config(memory, config);
    let root = reconciler.create_container(container);
    (reconciler, root, container)
}

fn render(reconciler: &mut Reconciler<MemoryHost>, root: RootId, node: impl Into<Node>) {
    reconciler.update_container(node, root).expect("known root");
    reconciler.perform_scheduled_work().expect("pass");
}

type Slot = Rc<RefCell<Option<Dispatch<i64>>>>;

/// A counter that leaks its dispatcher into `slot`.
fn counter(slot: Slot) -> Component {
    Component::new("Counter", move |hooks, _props| {
        let (count, dispatch) = hooks.use_reducer(|count: &i64, delta: i64| count + delta, 0);
        *slot.borrow_mut() = Some(dispatch);
        host("span").child(count.to_string()).into()
    })
}

fn dispatch(slot: &Slot, delta: i64) {
    slot.borrow().as_ref().expect("rendered").dispatch(delta);
}

#[test]
fn test_two_dispatches_apply_in_order() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    let slot = Slot::default();
    let counter = counter(slot.clone());
    render(&mut reconciler, root, component(&counter));
    let span = reconciler.host().children(container)[0];
    assert_eq!(reconciler.host().text_content(span), "0");

    dispatch(&slot, 1);
    dispatch(&slot, 1);
    assert!(reconciler.is_scheduled());
    assert_eq!(reconciler.perform_scheduled_work(), Ok(1));

    assert_eq!(reconciler.host().text_content(span), "2");
    assert_eq!(reconciler.host().children(container), &[span]);
    assert!(!reconciler.is_scheduled());
}

#[test]
fn test_state_survives_parent_rerender() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    let slot = Slot::default();
    let counter = counter(slot.clone());
    let tree = |title: &str| {
        host("section")
            .child(host("h1").child(title))
            .child(component(&counter).key("c"))
    };

    render(&mut reconciler, root, tree("one"));
    dispatch(&slot, 5);
    reconciler.perform_scheduled_work().expect("pass");
    render(&mut reconciler, root, tree("two"));

    let markup = reconciler.host().to_markup(container);
    assert_eq!(markup, "<section><h1>two</h1><span>5</span></section>");
}

#[test]
fn test_dispatch_after_unmount() {
    let slot = Slot::default();
    let counter = counter(slot.clone());

    let (mut strict, root, _) = setup(ReconcilerConfig::default());
    render(&mut strict, root, component(&counter));
    render(&mut strict, root, Node::Empty);
    dispatch(&slot, 1);
    assert_eq!(
        strict.perform_scheduled_work(),
        Err(ReconcileError::DetachedUpdateTarget)
    );
    assert_eq!(strict.queue_count(), 1, "only the root queue is left");

    let (mut relaxed, root, _) = setup(ReconcilerConfig::relaxed());
    render(&mut relaxed, root, component(&counter));
    render(&mut relaxed, root, Node::Empty);
    dispatch(&slot, 1);
    assert_eq!(relaxed.perform_scheduled_work(), Ok(0));
}

#[test]
fn test_hook_count_change_is_reported() {
    let flaky = Component::new("Flaky", |hooks, props: &Props| {
        let (a, _) = hooks.use_state(1i64);
        let extra = props.get("extra").is_some();
        let b = if extra { hooks.use_state(2i64).0 } else { 0 };
        Node::text((a + b).to_string())
    });

    let (mut strict, root, _) = setup(ReconcilerConfig::default());
    render(&mut strict, root, component(&flaky));
    strict
        .update_container(component(&flaky).prop("extra", true), root)
        .expect("known root");
    let err = strict.perform_scheduled_work().expect_err("more hooks than before");
    assert!(matches!(err, ReconcileError::HookCountMismatch { .. }), "{err}");

    let (mut relaxed, root, container) = setup(ReconcilerConfig::relaxed());
    render(&mut relaxed, root, component(&flaky));
    render(&mut relaxed, root, component(&flaky).prop("extra", true));
    assert_eq!(relaxed.host().text_content(container), "3");
}

#[test]
fn test_capture_then_bubble() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let listener = |name: &'static str| {
        let log = Rc::clone(&log);
        move |_: &spark_reconciler::HostEvent| log.borrow_mut().push(name)
    };

    render(
        &mut reconciler,
        root,
        host("div")
            .on_capture("ping", listener("outer capture"))
            .on("ping", listener("outer bubble"))
            .child(
                host("button")
                    .on_capture("ping", listener("inner capture"))
                    .on("ping", listener("inner bubble")),
            ),
    );

    let div = reconciler.host().children(container)[0];
    let button = reconciler.host().children(div)[0];
    assert_eq!(reconciler.host().dispatch(button, "ping", None), 4);
    assert_eq!(
        *log.borrow(),
        ["outer capture", "inner capture", "inner bubble", "outer bubble"]
    );
}

#[test]
fn test_click_schedules_rerender() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    let wakeups = Rc::new(Cell::new(0));
    let seen = Rc::clone(&wakeups);
    reconciler.set_schedule_callback(move || seen.set(seen.get() + 1));

    let clicker = Component::new("Clicker", |hooks, _props| {
        let (clicks, dispatch) = hooks.use_reducer(|n: &u32, (): ()| n + 1, 0);
        host("button")
            .on("click", move |_| dispatch.dispatch(()))
            .child(format!("clicked {clicks}"))
            .into()
    });
    render(&mut reconciler, root, component(&clicker));
    let button = reconciler.host().children(container)[0];
    let before = wakeups.get();

    reconciler.host().dispatch(button, "click", None);
    reconciler.host().dispatch(button, "click", None);
    assert_eq!(wakeups.get(), before + 2);
    assert_eq!(reconciler.host().text_content(button), "clicked 0", "listeners never run a pass");

    reconciler.perform_scheduled_work().expect("pass");
    assert_eq!(reconciler.host().text_content(button), "clicked 2");
    assert_eq!(reconciler.host().children(container), &[button]);
}

fn labelled(label: &'static str) -> Component {
    Component::new("Label", move |hooks, _props| {
        let (renders, _) = hooks.use_state(label.len());
        host("span").child(format!("{label}:{renders}")).into()
    })
}

#[test]
fn test_rebuilt_component_runs_latest_render() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, component(&labelled("first")));
    let span = reconciler.host().children(container)[0];
    assert_eq!(reconciler.host().to_markup(container), "<span>first:5</span>");

    render(&mut reconciler, root, component(&labelled("second")));
    assert_eq!(
        reconciler.host().to_markup(container),
        "<span>second:5</span>",
        "state is kept, the new render function runs"
    );
    assert_eq!(reconciler.host().children(container), &[span]);

    let list = |labels: [&'static str; 2]| {
        host("div").children(labels.map(|label| Node::from(component(&labelled(label)).key(label.len()))))
    };
    render(&mut reconciler, root, list(["ab", "abc"]));
    render(&mut reconciler, root, list(["xy", "xyz"]));
    assert_eq!(
        reconciler.host().to_markup(container),
        "<div><span>xy:2</span><span>xyz:3</span></div>"
    );
}
