//! Begin phase - descend into a node and produce its children.
//!
//! Dispatch is on [`WorkKind`]:
//!
//! - `Indeterminate` / `FunctionComponent`: run the component with hooks,
//!   reconcile what it returns. A first render reclassifies the node.
//! - `HostRoot`: apply the root queue (whole-tree replacement) and reconcile
//!   the resulting top-level description.
//! - `HostComponent`: reconcile the `children` prop, unless the host renders
//!   it as direct text.
//! - `HostText`: leaf.

use super::child_reconciler::ChildReconciler;
use super::hooks::HookContext;
use super::work_loop::Reconciler;
use super::work_node::{MemoizedState, NodeType, PendingWork};
use crate::element::{Node, Props};
use crate::error::ReconcileError;
use crate::host::HostConfig;
use crate::types::{NodeId, WorkKind};

impl<H: HostConfig> Reconciler<H> {
    /// Returns the first child to descend into, or `None` to start ascending.
    pub(super) fn begin_work(&mut self, wip: NodeId) -> Result<Option<NodeId>, ReconcileError> {
        let current = self.nodes[wip].alternate;
        match self.nodes[wip].kind {
            WorkKind::HostRoot => self.update_host_root(current, wip),
            WorkKind::HostComponent => self.update_host_component(current, wip),
            WorkKind::Indeterminate => self.mount_indeterminate_component(current, wip),
            WorkKind::FunctionComponent => self.update_function_component(current, wip),
            WorkKind::HostText => Ok(None),
        }
    }

    fn update_host_root(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
    ) -> Result<Option<NodeId>, ReconcileError> {
        let mut next = match &self.nodes[wip].memoized_state {
            MemoizedState::Element(node) => node.clone(),
            _ => Node::Empty,
        };
        if let PendingWork::Queue(queue) = self.nodes[wip].pending_work {
            if let Some(queue) = self.queues.get_mut(queue) {
                for update in queue.drain() {
                    match update.downcast::<Node>() {
                        Ok(node) => next = node,
                        Err(_) => log::warn!("[begin] root update without a description"),
                    }
                }
            }
        }
        self.nodes[wip].memoized_state = MemoizedState::Element(next.clone());
        self.reconcile_children(current, wip, &next)
    }

    fn update_host_component(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
    ) -> Result<Option<NodeId>, ReconcileError> {
        let node = &self.nodes[wip];
        let tag = node.node_type.tag().unwrap_or_default();
        let props = node.pending_props.element().cloned().unwrap_or_default();

        let next_children = if self.host.should_set_text_content(tag, &props) {
            Node::Empty
        } else {
            props.children().cloned().unwrap_or_default()
        };
        self.reconcile_children(current, wip, &next_children)
    }

    fn mount_indeterminate_component(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
    ) -> Result<Option<NodeId>, ReconcileError> {
        let children = self.render_with_hooks(current, wip)?;
        self.nodes[wip].kind = WorkKind::FunctionComponent;
        self.reconcile_children(current, wip, &children)
    }

    fn update_function_component(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
    ) -> Result<Option<NodeId>, ReconcileError> {
        let children = self.render_with_hooks(current, wip)?;
        self.reconcile_children(current, wip, &children)
    }

    /// Run the component under the mount or update hook table.
    ///
    /// Update is chosen when the committed buffer already holds a hook list.
    fn render_with_hooks(&mut self, current: Option<NodeId>, wip: NodeId) -> Result<Node, ReconcileError> {
        let NodeType::Component(component) = self.nodes[wip].node_type.clone() else {
            return Ok(Node::Empty);
        };
        let props: Props = self.nodes[wip].pending_props.element().cloned().unwrap_or_default();
        let previous = current.and_then(|current| match &self.nodes[current].memoized_state {
            MemoizedState::Hooks(hooks) => Some(hooks.clone()),
            _ => None,
        });

        log::trace!("[begin] render {component:?} ({wip:?})");
        let mut hooks = HookContext::new(
            component.name(),
            wip,
            previous,
            &mut self.queues,
            &self.buffer,
            self.config.check_hook_order,
        );
        let children = component.render(&mut hooks, &props);
        let records = hooks.finish()?;

        self.nodes[wip].memoized_state = MemoizedState::Hooks(records);
        Ok(children)
    }

    /// Reconcile with effect tracking when a committed buffer exists.
    fn reconcile_children(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        next_children: &Node,
    ) -> Result<Option<NodeId>, ReconcileError> {
        let check_keys = self.config.check_duplicate_keys;
        let child = match current {
            Some(current) => {
                let current_first_child = self.nodes[current].child;
                ChildReconciler::new(&mut self.nodes, true, check_keys).reconcile_child_fibers(
                    wip,
                    current_first_child,
                    next_children,
                )?
            }
            None => ChildReconciler::new(&mut self.nodes, false, check_keys)
                .reconcile_child_fibers(wip, None, next_children)?,
        };
        self.nodes[wip].child = child;
        Ok(child)
    }
}
