//! Work loop - drives one render pass end to end.
//!
//! A pass is synchronous and runs to completion:
//!
//! ```text
//! snapshot work-in-progress root -> drain update buffer
//!   -> loop { begin(unit) ; descend | complete + climb via parent links }
//!   -> commit -> flip current
//! ```
//!
//! There is no call stack for the tree walk: every node carries its parent
//! link, so ascent walks links instead of returning.
//!
//! [`Reconciler`] owns everything a pass touches (arena, queues, roots, the
//! shared update buffer and the host), so independent reconcilers never share
//! state.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;

use super::commit_work::CommitStats;
use super::config::ReconcilerConfig;
use super::update_queue::{enqueue_update, BufferedUpdate, SharedBuffer, Update, UpdateQueue};
use super::work_node::{create_work_in_progress, NodeProps, NodeType, PendingWork, WorkNode};
use crate::element::Node;
use crate::error::ReconcileError;
use crate::host::HostConfig;
use crate::types::{HostHandle, NodeId, QueueId, RootId};

// =============================================================================
// Roots
// =============================================================================

/// One mounted container.
#[derive(Debug, Clone)]
pub(super) struct FiberRoot {
    pub container: HostHandle,
    pub current: NodeId,
    pub finished_work: Option<NodeId>,
}

// =============================================================================
// Reconciler
// =============================================================================

/// The reconciliation engine for one host.
pub struct Reconciler<H: HostConfig> {
    pub(super) host: H,
    pub(super) nodes: SlotMap<NodeId, WorkNode>,
    pub(super) queues: SlotMap<QueueId, UpdateQueue>,
    pub(super) roots: SlotMap<RootId, FiberRoot>,
    pub(super) buffer: SharedBuffer,
    pub(super) scheduled: Vec<RootId>,
    pub(super) config: ReconcilerConfig,
    pub(super) last_commit: CommitStats,
}

impl<H: HostConfig> Reconciler<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, ReconcilerConfig::default())
    }

    pub fn with_config(host: H, config: ReconcilerConfig) -> Self {
        Self {
            host,
            nodes: SlotMap::with_key(),
            queues: SlotMap::with_key(),
            roots: SlotMap::with_key(),
            buffer: Rc::new(RefCell::new(Default::default())),
            scheduled: Vec::new(),
            config,
            last_commit: CommitStats::default(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Effect counts of the most recent commit.
    pub fn last_commit(&self) -> CommitStats {
        self.last_commit
    }

    /// Work nodes currently allocated (both buffers of every pair).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Hook and root update queues currently allocated.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    // -------------------------------------------------------------------------
    // Root API
    // -------------------------------------------------------------------------

    /// Create a root rendering into `container`.
    pub fn create_container(&mut self, container: HostHandle) -> RootId {
        let queue = self.queues.insert(UpdateQueue::default());
        let nodes = &mut self.nodes;
        self.roots.insert_with_key(|root| {
            let current = nodes.insert(WorkNode::new_root(root, container, queue));
            FiberRoot {
                container,
                current,
                finished_work: None,
            }
        })
    }

    /// Host container of a root.
    pub fn container(&self, root: RootId) -> Option<HostHandle> {
        self.roots.get(root).map(|root| root.container)
    }

    /// Replace the whole tree of `root` with `node` on the next pass.
    pub fn update_container(&mut self, node: impl Into<Node>, root: RootId) -> Result<(), ReconcileError> {
        let current = self.roots.get(root).ok_or(ReconcileError::UnknownRoot)?.current;
        let PendingWork::Queue(queue) = self.nodes[current].pending_work else {
            return Err(ReconcileError::UnknownRoot);
        };
        enqueue_update(&self.buffer, current, queue, Update::new(node.into()));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scheduling boundary
    // -------------------------------------------------------------------------

    /// True when updates are waiting for a pass.
    pub fn is_scheduled(&self) -> bool {
        !self.scheduled.is_empty() || !self.buffer.borrow().is_empty()
    }

    /// Called after every buffered update. Use it to wake an event loop; it
    /// must not run a pass itself.
    pub fn set_schedule_callback(&mut self, callback: impl Fn() + 'static) {
        self.buffer
            .borrow_mut()
            .set_schedule_callback(Some(Rc::new(callback)));
    }

    pub fn clear_schedule_callback(&mut self) {
        self.buffer.borrow_mut().set_schedule_callback(None);
    }

    /// Run one pass for every root with pending updates.
    ///
    /// Updates dispatched while these passes run are left for the next call.
    /// Returns the number of passes run.
    pub fn perform_scheduled_work(&mut self) -> Result<usize, ReconcileError> {
        self.drain_update_buffer()?;
        let roots = std::mem::take(&mut self.scheduled);
        let mut passes = 0;
        for root in roots {
            self.render_root(root)?;
            passes += 1;
        }
        Ok(passes)
    }

    // -------------------------------------------------------------------------
    // Update buffer
    // -------------------------------------------------------------------------

    /// Splice every buffered update into its queue and mark the owning roots.
    ///
    /// Valid updates are kept even when another entry fails.
    fn drain_update_buffer(&mut self) -> Result<(), ReconcileError> {
        let entries = self.buffer.borrow_mut().take();
        let mut first_error = None;

        for BufferedUpdate { target, queue, update } in entries {
            let root = self.find_root(target).filter(|root| self.roots.contains_key(*root));
            match (root, self.queues.get_mut(queue)) {
                (Some(root), Some(queue)) => {
                    queue.enqueue(update);
                    if !self.scheduled.contains(&root) {
                        self.scheduled.push(root);
                    }
                }
                _ => {
                    if self.config.reject_detached_updates {
                        first_error.get_or_insert(ReconcileError::DetachedUpdateTarget);
                    } else {
                        log::warn!("[work-loop] dropped update for detached {target:?}");
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Walk parent links up to the root node.
    fn find_root(&self, node: NodeId) -> Option<RootId> {
        let mut current = node;
        loop {
            let node = self.nodes.get(current)?;
            if let NodeType::Root(root) = node.node_type {
                return Some(root);
            }
            current = node.parent?;
        }
    }

    // -------------------------------------------------------------------------
    // Pass
    // -------------------------------------------------------------------------

    fn render_root(&mut self, root: RootId) -> Result<(), ReconcileError> {
        let current = self.roots.get(root).ok_or(ReconcileError::UnknownRoot)?.current;
        let wip_root = create_work_in_progress(&mut self.nodes, current, NodeProps::Empty);
        self.nodes[wip_root].parent = None;

        self.drain_update_buffer()?;
        self.scheduled.retain(|scheduled| *scheduled != root);

        log::debug!("[work-loop] render {root:?} ({} nodes)", self.nodes.len());
        let mut next = Some(wip_root);
        while let Some(unit) = next {
            next = self.perform_unit_of_work(unit)?;
        }

        self.roots[root].finished_work = Some(wip_root);
        self.commit_root(root);
        Ok(())
    }

    fn perform_unit_of_work(&mut self, unit: NodeId) -> Result<Option<NodeId>, ReconcileError> {
        let child = self.begin_work(unit)?;
        let node = &mut self.nodes[unit];
        node.memoized_props = node.pending_props.clone();

        match child {
            Some(child) => Ok(Some(child)),
            None => Ok(self.complete_unit_of_work(unit)),
        }
    }

    /// Complete `unit` and its ancestors until one has a sibling left to begin.
    fn complete_unit_of_work(&mut self, unit: NodeId) -> Option<NodeId> {
        let mut completed = unit;
        loop {
            self.complete_work(completed);
            let node = &self.nodes[completed];
            if let Some(sibling) = node.sibling {
                return Some(sibling);
            }
            completed = node.parent?;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{component, host, Component, Props};
    use crate::engine::flags::WorkFlags;
    use crate::engine::hooks::{Dispatch, HookContext};
    use crate::host::{HostOp, MemoryHost};
    use crate::types::{Key, WorkKind};
    use std::cell::RefCell;

    fn setup() -> (Reconciler<MemoryHost>, RootId, HostHandle) {
        let mut host = MemoryHost::new();
        let container = host.create_container();
        let mut reconciler = Reconciler::new(host);
        let root = reconciler.create_container(container);
        (reconciler, root, container)
    }

    fn render(reconciler: &mut Reconciler<MemoryHost>, root: RootId, node: impl Into<Node>) {
        reconciler.update_container(node, root).expect("known root");
        reconciler.perform_scheduled_work().expect("pass");
    }

    /// Every flag in the committed tree of `root`.
    fn committed_flags(reconciler: &Reconciler<MemoryHost>, root: RootId) -> Vec<WorkFlags> {
        let mut out = Vec::new();
        let mut stack = vec![reconciler.roots[root].current];
        while let Some(id) = stack.pop() {
            let node = &reconciler.nodes[id];
            out.push(node.flags);
            stack.extend(node.child);
            stack.extend(node.sibling);
        }
        out
    }

    fn list(keys: &[&str]) -> Node {
        host("ul")
            .children(keys.iter().map(|k| Node::from(host("li").key(*k).child(*k))))
            .into()
    }

    #[test]
    fn test_first_render_builds_host_tree() {
        let (mut reconciler, root, container) = setup();
        render(&mut reconciler, root, host("div").prop("id", "a").child("hello"));

        assert_eq!(
            reconciler.host().to_markup(container),
            "<div id=\"a\">hello</div>"
        );
        let stats = reconciler.last_commit();
        assert_eq!(stats.placements, 1, "only the top host node is placed");
        assert!(!reconciler.is_scheduled());
    }

    #[test]
    fn test_same_description_twice_is_idle() {
        let (mut reconciler, root, _) = setup();
        render(&mut reconciler, root, list(&["a", "b"]));
        reconciler.host_mut().clear_ops();

        render(&mut reconciler, root, list(&["a", "b"]));

        assert!(reconciler.host().ops().is_empty(), "{:?}", reconciler.host().ops());
        assert!(reconciler.last_commit().is_empty());
        assert!(
            committed_flags(&reconciler, root)
                .iter()
                .all(|flags| flags.is_empty()),
            "no node may carry a flag"
        );
    }

    #[test]
    fn test_node_count_is_stable_across_passes() {
        let (mut reconciler, root, _) = setup();
        render(&mut reconciler, root, list(&["a", "b", "c"]));
        render(&mut reconciler, root, list(&["a", "b", "c"]));
        let settled = reconciler.node_count();

        render(&mut reconciler, root, list(&["a", "b", "c"]));
        assert_eq!(reconciler.node_count(), settled, "pairs are reused, not reallocated");
    }

    #[test]
    fn test_deletion_releases_pairs_and_host_nodes() {
        let (mut reconciler, root, container) = setup();
        render(&mut reconciler, root, list(&["a", "b", "c"]));
        render(&mut reconciler, root, list(&["a", "b", "c"]));
        let before = reconciler.node_count();

        render(&mut reconciler, root, list(&["b"]));

        assert_eq!(reconciler.host().text_content(container), "b");
        assert_eq!(reconciler.last_commit().deletions, 2);
        assert_eq!(reconciler.node_count(), before - 4, "both buffers of a and c are gone");
        // container + ul + li
        assert_eq!(reconciler.host().live_count(), 3);
    }

    #[test]
    fn test_text_update_reuses_handle() {
        let (mut reconciler, root, container) = setup();
        render(&mut reconciler, root, Node::list(vec!["a".into(), "b".into()]));
        let handles = reconciler.host().children(container).to_vec();
        reconciler.host_mut().clear_ops();

        render(&mut reconciler, root, Node::list(vec!["a".into(), "c".into()]));

        assert_eq!(reconciler.host().children(container), handles.as_slice());
        assert_eq!(
            reconciler.host().ops(),
            &[HostOp::CommitTextUpdate {
                handle: handles[1],
                text: "c".into()
            }]
        );
    }

    #[test]
    fn test_component_state_survives_rerender() {
        let (mut reconciler, root, container) = setup();
        let slot: Rc<RefCell<Option<Dispatch<i32>>>> = Rc::default();
        let slot_clone = slot.clone();
        let counter = Component::new("Counter", move |hooks: &mut HookContext<'_>, _: &Props| {
            let (count, dispatch) = hooks.use_reducer(|n: &i32, d: i32| n + d, 0);
            *slot_clone.borrow_mut() = Some(dispatch);
            host("span").child(count.to_string()).into()
        });

        render(&mut reconciler, root, component(&counter));
        let dispatch = slot.borrow().clone().expect("rendered");
        dispatch.dispatch(5);
        assert!(reconciler.is_scheduled());
        reconciler.perform_scheduled_work().expect("pass");

        assert_eq!(reconciler.host().text_content(container), "5");

        // A parent re-render with a fresh element keeps the state.
        render(&mut reconciler, root, component(&counter));
        assert_eq!(reconciler.host().text_content(container), "5");
    }

    #[test]
    fn test_indeterminate_is_reclassified() {
        let (mut reconciler, root, _) = setup();
        let leaf = Component::new("Leaf", |_: &mut HookContext<'_>, _: &Props| Node::from("x"));
        render(&mut reconciler, root, component(&leaf).key("leaf"));

        let root_node = reconciler.roots[root].current;
        let child = reconciler.nodes[root_node].child.expect("component node");
        assert_eq!(reconciler.nodes[child].kind, WorkKind::FunctionComponent);
        assert_eq!(reconciler.nodes[child].key, Some(Key::from("leaf")));
    }

    #[test]
    fn test_unknown_root_rejected() {
        let (mut reconciler, root, _) = setup();
        reconciler.roots.remove(root);
        assert_eq!(
            reconciler.update_container(Node::Empty, root),
            Err(ReconcileError::UnknownRoot)
        );
    }

    #[test]
    fn test_schedule_callback_fires_on_update() {
        let (mut reconciler, root, _) = setup();
        let woken = Rc::new(RefCell::new(0));
        let woken_clone = woken.clone();
        reconciler.set_schedule_callback(move || *woken_clone.borrow_mut() += 1);

        reconciler.update_container(host("div"), root).expect("known root");
        assert_eq!(*woken.borrow(), 1);
        assert_eq!(reconciler.perform_scheduled_work(), Ok(1));
        assert_eq!(reconciler.perform_scheduled_work(), Ok(0), "nothing left");
    }
}
