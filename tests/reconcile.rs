//! Structural reconciliation through the in-memory host.

use spark_reconciler::{
    host, HostHandle, HostOp, MemoryHost, Node, ReconcileError, Reconciler, ReconcilerConfig,
    RootId,
};

fn setup(config: ReconcilerConfig) -> (Reconciler<MemoryHost>, RootId, HostHandle) {
    let mut memory = MemoryHost::new();
    let container = memory.create_container();
    let mut reconciler = Reconciler::with_config(memory, config);
    let root = reconciler.create_container(container);
    (reconciler, root, container)
}

fn render(
    reconciler: &mut Reconciler<MemoryHost>,
    root: RootId,
    node: impl Into<Node>,
) -> Result<usize, ReconcileError> {
    reconciler.update_container(node, root)?;
    reconciler.perform_scheduled_work()
}

fn list(keys: &[&str]) -> Node {
    host("ul")
        .children(keys.iter().map(|k| Node::from(host("li").key(*k).child(*k))))
        .into()
}

/// Handles of the `<li>`s under the single `<ul>` in `container`.
fn items(reconciler: &Reconciler<MemoryHost>, container: HostHandle) -> Vec<HostHandle> {
    let ul = reconciler.host().children(container)[0];
    reconciler.host().children(ul).to_vec()
}

fn texts(reconciler: &Reconciler<MemoryHost>, container: HostHandle) -> Vec<String> {
    items(reconciler, container)
        .into_iter()
        .map(|li| reconciler.host().text_content(li))
        .collect()
}

#[test]
fn test_identical_rerender_touches_nothing() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    let tree = || {
        host("div")
            .prop("id", "app")
            .style("color", "red")
            .child(list(&["a", "b"]))
    };

    render(&mut reconciler, root, tree()).expect("first pass");
    reconciler.host_mut().clear_ops();

    render(&mut reconciler, root, tree()).expect("second pass");
    assert!(reconciler.host().ops().is_empty(), "ops: {:?}", reconciler.host().ops());
    assert!(reconciler.last_commit().is_empty());
    let nodes = reconciler.node_count();

    render(&mut reconciler, root, tree()).expect("third pass");
    assert_eq!(reconciler.node_count(), nodes, "both buffers are reused after the second pass");
    assert_eq!(
        reconciler.host().to_markup(container),
        r#"<div id="app" style="color:red"><ul><li>a</li><li>b</li></ul></div>"#
    );
}

#[test]
fn test_keyed_rotation_moves_two_and_reuses_all() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, list(&["a", "b", "c"])).expect("mount");
    let before = items(&reconciler, container);
    let ul = reconciler.host().children(container)[0];
    reconciler.host_mut().clear_ops();

    render(&mut reconciler, root, list(&["c", "a", "b"])).expect("rotate");

    assert_eq!(texts(&reconciler, container), ["c", "a", "b"]);
    assert_eq!(items(&reconciler, container), vec![before[2], before[0], before[1]]);
    assert_eq!(
        reconciler.host().ops(),
        &[
            HostOp::AppendChild { parent: ul, child: before[0] },
            HostOp::AppendChild { parent: ul, child: before[1] },
        ]
    );
    let stats = reconciler.last_commit();
    assert_eq!((stats.placements, stats.updates, stats.deletions), (2, 0, 0));
}

#[test]
fn test_keyed_insert_in_middle_inserts_before_stable_sibling() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, list(&["a", "c"])).expect("mount");
    let before = items(&reconciler, container);
    reconciler.host_mut().clear_ops();

    render(&mut reconciler, root, list(&["a", "b", "c"])).expect("insert");

    let after = items(&reconciler, container);
    assert_eq!(texts(&reconciler, container), ["a", "b", "c"]);
    assert_eq!((after[0], after[2]), (before[0], before[1]));
    assert!(reconciler.host().ops().iter().any(|op| matches!(
        op,
        HostOp::InsertBefore { child, before: anchor, .. } if *child == after[1] && *anchor == before[1]
    )));
}

#[test]
fn test_type_change_replaces_host_node() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, host("div").key("x").child("same")).expect("mount");
    let old = reconciler.host().children(container)[0];

    render(&mut reconciler, root, host("span").key("x").child("same")).expect("swap");

    let new = reconciler.host().children(container)[0];
    assert_ne!(old, new);
    assert_eq!(reconciler.host().tag(new), Some("span"));
    assert_eq!(reconciler.host().children(container).len(), 1);
    assert_eq!(reconciler.last_commit().deletions, 1);
    assert_eq!(reconciler.last_commit().placements, 1);
}

#[test]
fn test_prop_diff_reaches_host() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, host("div").prop("a", 1).prop("b", 2)).expect("mount");
    let div = reconciler.host().children(container)[0];
    reconciler.host_mut().clear_ops();

    render(&mut reconciler, root, host("div").prop("a", 1).prop("c", 3)).expect("update");

    assert_eq!(
        reconciler.host().ops(),
        &[HostOp::CommitUpdate { handle: div, entries: 2 }]
    );
    let memory = reconciler.host();
    assert_eq!(memory.attribute(div, "a"), Some(&1.into()));
    assert_eq!(memory.attribute(div, "b"), None);
    assert_eq!(memory.attribute(div, "c"), Some(&3.into()));
}

#[test]
fn test_shrink_then_grow() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, list(&["0", "1", "2"])).expect("three");
    render(&mut reconciler, root, list(&["0"])).expect("one");
    assert_eq!(texts(&reconciler, container), ["0"]);
    assert_eq!(reconciler.host().live_count(), 3);

    let keys = ["0", "1", "2", "3", "4"];
    render(&mut reconciler, root, list(&keys)).expect("five");
    assert_eq!(texts(&reconciler, container), keys);
    // container + ul + five items
    assert_eq!(reconciler.host().live_count(), 7);
}

#[test]
fn test_unkeyed_text_children_update_in_place() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    let row = |a: &str, b: &str| host("p").children([Node::text(a), Node::Empty, Node::text(b)]);
    render(&mut reconciler, root, row("x", "y")).expect("mount");
    let p = reconciler.host().children(container)[0];
    let before = reconciler.host().children(p).to_vec();

    render(&mut reconciler, root, row("x", "z")).expect("update");

    assert_eq!(reconciler.host().children(p), before.as_slice());
    assert_eq!(reconciler.host().text_content(p), "xz");
    assert_eq!(reconciler.last_commit().updates, 1);
}

#[test]
fn test_clearing_children_removes_host_subtree() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, list(&["a", "b", "c"])).expect("mount");
    render(&mut reconciler, root, host("ul")).expect("clear");

    let ul = reconciler.host().children(container)[0];
    assert!(reconciler.host().children(ul).is_empty());
    assert_eq!(reconciler.host().live_count(), 2);
    assert_eq!(reconciler.last_commit().deletions, 3);
}

#[test]
fn test_duplicate_keys() {
    let (mut strict, root, _) = setup(ReconcilerConfig::default());
    let err = render(&mut strict, root, list(&["a", "a"])).expect_err("duplicate");
    assert!(matches!(err, ReconcileError::DuplicateKey { .. }), "{err}");

    let (mut relaxed, root, container) = setup(ReconcilerConfig::relaxed());
    render(&mut relaxed, root, list(&["a", "b"])).expect("mount");
    render(&mut relaxed, root, list(&["b", "a", "a"])).expect("tolerated");
    assert_eq!(items(&relaxed, container).len(), 3);
}

#[test]
fn test_numeric_children_patched_in_place() {
    let (mut reconciler, root, container) = setup(ReconcilerConfig::default());
    render(&mut reconciler, root, host("span").prop("children", 5)).expect("mount");
    let span = reconciler.host().children(container)[0];
    assert_eq!(reconciler.host().to_markup(container), "<span>5</span>");

    render(&mut reconciler, root, host("span").prop("children", 6)).expect("update");
    assert_eq!(reconciler.host().to_markup(container), "<span>6</span>");
    assert!(reconciler.host().children(span).is_empty());

    render(&mut reconciler, root, host("span").prop("children", "six")).expect("update");
    assert_eq!(reconciler.host().to_markup(container), "<span>six</span>");
}
