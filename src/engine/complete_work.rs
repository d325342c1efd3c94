//! Complete phase - ascend out of a node.
//!
//! Host elements get their instance here: on first creation the already
//! completed host descendants are appended in document order, on update the
//! prop patch is prepared and stored for commit. Every node then folds its
//! children's flags into `subtree_flags`.

use super::flags::WorkFlags;
use super::work_loop::Reconciler;
use super::work_node::PendingWork;
use crate::host::HostConfig;
use crate::types::{HostHandle, NodeId, WorkKind};

impl<H: HostConfig> Reconciler<H> {
    pub(super) fn complete_work(&mut self, wip: NodeId) {
        let current = self.nodes[wip].alternate;
        match self.nodes[wip].kind {
            WorkKind::HostComponent => self.complete_host_component(current, wip),
            WorkKind::HostText => self.complete_host_text(current, wip),
            WorkKind::HostRoot | WorkKind::FunctionComponent | WorkKind::Indeterminate => {}
        }
        self.bubble_properties(wip);
    }

    fn complete_host_component(&mut self, current: Option<NodeId>, wip: NodeId) {
        let node = &self.nodes[wip];
        let tag = node.node_type.tag().unwrap_or_default().to_owned();
        let new_props = node.pending_props.element().cloned().unwrap_or_default();

        match (current, node.state_node) {
            (Some(current), Some(handle)) => {
                let Some(old_props) = self.nodes[current].memoized_props.element().cloned() else {
                    return;
                };
                let payload = if old_props.same(&new_props) {
                    None
                } else {
                    self.host.prepare_update(handle, &tag, &old_props, &new_props)
                };
                let node = &mut self.nodes[wip];
                match payload {
                    Some(payload) => {
                        log::trace!("[complete] {wip:?} <{tag}> patch of {} entries", payload.len());
                        node.pending_work = PendingWork::Payload(payload);
                        node.flags |= WorkFlags::UPDATE;
                    }
                    None => node.pending_work = PendingWork::Empty,
                }
            }
            _ => {
                let handle = self.host.create_instance(&tag, &new_props);
                self.append_all_children(handle, wip);
                self.host.finalize_initial_children(handle, &tag, &new_props);
                self.nodes[wip].state_node = Some(handle);
            }
        }
    }

    fn complete_host_text(&mut self, current: Option<NodeId>, wip: NodeId) {
        let node = &self.nodes[wip];
        let new_text = node.pending_props.text().unwrap_or_default();

        match (current, node.state_node) {
            (Some(current), Some(_)) => {
                let old_text = self.nodes[current].memoized_props.text().unwrap_or_default();
                if old_text != new_text {
                    self.nodes[wip].flags |= WorkFlags::UPDATE;
                }
            }
            _ => {
                let handle = self.host.create_text_instance(new_text);
                self.nodes[wip].state_node = Some(handle);
            }
        }
    }

    /// Append the topmost host nodes below `wip` to `parent`, in order.
    ///
    /// Component nodes have no host instance of their own, so the walk
    /// descends through them.
    fn append_all_children(&mut self, parent: HostHandle, wip: NodeId) {
        let mut next = self.nodes[wip].child;
        while let Some(id) = next {
            let node = &self.nodes[id];
            if node.kind.is_host() {
                if let Some(handle) = node.state_node {
                    self.host.append_initial_child(parent, handle);
                }
            } else if let Some(child) = node.child {
                next = Some(child);
                continue;
            }

            let mut cursor = id;
            next = loop {
                if let Some(sibling) = self.nodes[cursor].sibling {
                    break Some(sibling);
                }
                match self.nodes[cursor].parent {
                    Some(up) if up != wip => cursor = up,
                    _ => break None,
                }
            };
        }
    }

    fn bubble_properties(&mut self, wip: NodeId) {
        let mut subtree_flags = WorkFlags::NONE;
        let mut child = self.nodes[wip].child;
        while let Some(id) = child {
            let node = &self.nodes[id];
            subtree_flags |= node.subtree_flags | node.flags;
            child = node.sibling;
        }
        self.nodes[wip].subtree_flags = subtree_flags;
    }
}
