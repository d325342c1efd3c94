//! Commit - apply the flagged effects of a finished work tree to the host.
//!
//! The walk only enters subtrees whose `subtree_flags` intersect
//! [`WorkFlags::MUTATION_MASK`]. Per node the order is:
//!
//! ```text
//! 1. child deletions   (host removal + arena release)
//! 2. children          (recursively, before the parent)
//! 3. placement         (insert before the next stable host sibling, or append)
//! 4. update            (prop payload or new text)
//! ```
//!
//! After the walk the root's current pointer flips to the finished tree.

use super::flags::WorkFlags;
use super::work_loop::Reconciler;
use super::work_node::{NodeType, PendingWork};
use crate::host::HostConfig;
use crate::types::{HostHandle, NodeId, RootId, WorkKind};

/// Effect counts of the most recent commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
}

impl CommitStats {
    /// True when the commit touched nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Nearest host ancestor: an element, or the root's container.
#[derive(Debug, Clone, Copy)]
struct HostParent {
    handle: HostHandle,
    is_container: bool,
}

impl<H: HostConfig> Reconciler<H> {
    pub(super) fn commit_root(&mut self, root: RootId) {
        let Some(finished) = self.roots.get_mut(root).and_then(|r| r.finished_work.take()) else {
            return;
        };

        self.last_commit = CommitStats::default();
        let node = &self.nodes[finished];
        if (node.flags | node.subtree_flags).intersects(WorkFlags::MUTATION_MASK) {
            self.commit_mutation_effects(finished);
        }
        self.roots[root].current = finished;

        let stats = self.last_commit;
        log::debug!(
            "[commit] {root:?}: {} placement(s), {} update(s), {} deletion(s)",
            stats.placements,
            stats.updates,
            stats.deletions
        );
    }

    fn commit_mutation_effects(&mut self, finished: NodeId) {
        let deletions = std::mem::take(&mut self.nodes[finished].deletions);
        for child in deletions {
            self.commit_deletion(finished, child);
        }

        if self.nodes[finished].subtree_flags.intersects(WorkFlags::MUTATION_MASK) {
            let mut child = self.nodes[finished].child;
            while let Some(id) = child {
                self.commit_mutation_effects(id);
                child = self.nodes[id].sibling;
            }
        }

        let flags = self.nodes[finished].flags;
        if flags.contains(WorkFlags::PLACEMENT) {
            self.commit_placement(finished);
        }
        if flags.contains(WorkFlags::UPDATE) {
            self.commit_update(finished);
        }
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    fn commit_update(&mut self, finished: NodeId) {
        let node = &self.nodes[finished];
        let Some(handle) = node.state_node else { return };
        match node.kind {
            WorkKind::HostComponent => {
                let PendingWork::Payload(payload) = &node.pending_work else { return };
                let tag = node.node_type.tag().unwrap_or_default();
                self.host.commit_update(handle, tag, payload);
                self.last_commit.updates += 1;
            }
            WorkKind::HostText => {
                let new_text = node.memoized_props.text().unwrap_or_default();
                let old_text = node
                    .alternate
                    .and_then(|current| self.nodes.get(current))
                    .and_then(|current| current.memoized_props.text())
                    .unwrap_or_default();
                self.host.commit_text_update(handle, old_text, new_text);
                self.last_commit.updates += 1;
            }
            WorkKind::HostRoot | WorkKind::FunctionComponent | WorkKind::Indeterminate => {}
        }
    }

    // -------------------------------------------------------------------------
    // Placement
    // -------------------------------------------------------------------------

    fn is_host_parent(&self, id: NodeId) -> bool {
        matches!(
            self.nodes[id].kind,
            WorkKind::HostComponent | WorkKind::HostRoot
        )
    }

    /// Nearest host ancestor starting at `from` itself.
    fn find_host_parent(&self, from: Option<NodeId>) -> Option<HostParent> {
        let mut next = from;
        while let Some(id) = next {
            let node = &self.nodes[id];
            if self.is_host_parent(id) {
                return node.state_node.map(|handle| HostParent {
                    handle,
                    is_container: node.kind == WorkKind::HostRoot,
                });
            }
            next = node.parent;
        }
        None
    }

    /// The host node to insert before: the first host node after `finished`
    /// in document order that is not itself about to be placed.
    fn get_host_sibling(&self, finished: NodeId) -> Option<HostHandle> {
        let mut node = finished;
        'siblings: loop {
            while self.nodes[node].sibling.is_none() {
                match self.nodes[node].parent {
                    Some(parent) if !self.is_host_parent(parent) => node = parent,
                    _ => return None,
                }
            }
            node = self.nodes[node].sibling?;

            while !self.nodes[node].kind.is_host() {
                if self.nodes[node].flags.contains(WorkFlags::PLACEMENT) {
                    continue 'siblings;
                }
                match self.nodes[node].child {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }

            if !self.nodes[node].flags.contains(WorkFlags::PLACEMENT) {
                return self.nodes[node].state_node;
            }
        }
    }

    fn commit_placement(&mut self, finished: NodeId) {
        let Some(parent) = self.find_host_parent(self.nodes[finished].parent) else {
            log::warn!("[commit] {finished:?} has no host parent");
            return;
        };
        let before = self.get_host_sibling(finished);
        self.insert_or_append_placement_node(finished, before, parent);
        self.last_commit.placements += 1;
    }

    fn insert_or_append_placement_node(
        &mut self,
        id: NodeId,
        before: Option<HostHandle>,
        parent: HostParent,
    ) {
        let node = &self.nodes[id];
        if node.kind.is_host() {
            let Some(handle) = node.state_node else { return };
            match (before, parent.is_container) {
                (Some(before), true) => {
                    self.host
                        .insert_in_container_before(parent.handle, handle, before)
                }
                (Some(before), false) => self.host.insert_before(parent.handle, handle, before),
                (None, true) => self.host.append_child_to_container(parent.handle, handle),
                (None, false) => self.host.append_child(parent.handle, handle),
            }
            return;
        }

        let mut child = node.child;
        while let Some(id) = child {
            self.insert_or_append_placement_node(id, before, parent);
            child = self.nodes[id].sibling;
        }
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    fn commit_deletion(&mut self, parent: NodeId, deleted: NodeId) {
        if !self.nodes.contains_key(deleted) {
            return;
        }
        match self.find_host_parent(Some(parent)) {
            Some(host_parent) => self.remove_host_nodes(host_parent, deleted),
            None => log::warn!("[commit] deletion of {deleted:?} has no host parent"),
        }
        self.release_subtree(deleted);
        self.last_commit.deletions += 1;
    }

    /// Detach the topmost host nodes of a deleted subtree. The host drops
    /// everything below them.
    fn remove_host_nodes(&mut self, parent: HostParent, id: NodeId) {
        let node = &self.nodes[id];
        if node.kind.is_host() {
            let Some(handle) = node.state_node else { return };
            if parent.is_container {
                self.host.remove_child_from_container(parent.handle, handle);
            } else {
                self.host.remove_child(parent.handle, handle);
            }
            return;
        }

        let mut child = node.child;
        while let Some(id) = child {
            self.remove_host_nodes(parent, id);
            child = self.nodes[id].sibling;
        }
    }

    /// Drop both buffers of every position in the subtree, and their queues.
    fn release_subtree(&mut self, deleted: NodeId) {
        let mut stack = vec![deleted];
        let mut released = Vec::new();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else { continue };
            stack.extend(node.child);
            if id != deleted {
                stack.extend(node.sibling);
            }
            released.push(id);
            released.extend(node.alternate);
        }

        for id in released {
            let Some(node) = self.nodes.remove(id) else { continue };
            debug_assert!(!matches!(node.node_type, NodeType::Root(_)));
            for queue in node.queues() {
                self.queues.remove(queue);
            }
        }
    }
}
