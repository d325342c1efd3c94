//! Keyed child reconciliation.
//!
//! Diffs the committed child list of a node against a new children
//! description and produces the work-in-progress child list, reusing pairs
//! where key and type match.
//!
//! One algorithm, two modes:
//!
//! - `track_effects = true` (updates): records placements and deletions.
//! - `track_effects = false` (first mount of a subtree): nothing exists in the
//!   host yet, so no effects are recorded at all.
//!
//! # Sequence algorithm
//!
//! ```text
//! 1. lockstep   old[i] <-> new[i] while keys line up
//! 2. old done   create the rest of new
//! 3. otherwise  map remaining old by key (or index), reuse-or-create per new
//!               entry, delete whatever stays in the map
//! ```
//!
//! Moves use the running `last_placed_index`: a reused node whose old index
//! is below it is flagged for placement. This is a single-pass heuristic, not
//! a minimal-move algorithm.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use slotmap::SlotMap;

use super::flags::WorkFlags;
use super::work_node::{create_work_in_progress, NodeProps, NodeType, WorkNode};
use crate::element::{Element, ElementType, Node};
use crate::error::ReconcileError;
use crate::types::{Key, NodeId, WorkKind};

/// Lookup slot for the map phase: explicit key, else old index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChildSlot {
    Key(Key),
    Index(usize),
}

impl ChildSlot {
    fn of(key: Option<&Key>, index: usize) -> Self {
        match key {
            Some(key) => Self::Key(key.clone()),
            None => Self::Index(index),
        }
    }
}

pub(crate) struct ChildReconciler<'a> {
    nodes: &'a mut SlotMap<NodeId, WorkNode>,
    track_effects: bool,
    check_duplicate_keys: bool,
}

impl<'a> ChildReconciler<'a> {
    pub fn new(
        nodes: &'a mut SlotMap<NodeId, WorkNode>,
        track_effects: bool,
        check_duplicate_keys: bool,
    ) -> Self {
        Self {
            nodes,
            track_effects,
            check_duplicate_keys,
        }
    }

    /// Reconcile `new_child` against the old list starting at
    /// `current_first_child`. Returns the first work-in-progress child.
    pub fn reconcile_child_fibers(
        &mut self,
        parent: NodeId,
        current_first_child: Option<NodeId>,
        new_child: &Node,
    ) -> Result<Option<NodeId>, ReconcileError> {
        match new_child {
            Node::Element(element) => {
                let child = self.reconcile_single_element(parent, current_first_child, element);
                Ok(Some(self.place_single_child(child)))
            }
            Node::Text(text) => {
                let child = self.reconcile_single_text_node(parent, current_first_child, text);
                Ok(Some(self.place_single_child(child)))
            }
            Node::List(items) => {
                let mut flat = Vec::with_capacity(items.len());
                flatten_into(items, &mut flat);
                self.reconcile_children_array(parent, current_first_child, &flat)
            }
            Node::Empty => {
                self.delete_remaining_children(parent, current_first_child);
                Ok(None)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Effects
    // -------------------------------------------------------------------------

    fn delete_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.track_effects {
            return;
        }
        log::trace!("[reconcile] delete {:?} (key {:?})", child, self.nodes[child].key);
        let parent = &mut self.nodes[parent];
        parent.deletions.push(child);
        parent.flags |= WorkFlags::CHILD_DELETION;
    }

    fn delete_remaining_children(&mut self, parent: NodeId, first: Option<NodeId>) {
        if !self.track_effects {
            return;
        }
        let mut child = first;
        while let Some(current) = child {
            child = self.nodes[current].sibling;
            self.delete_child(parent, current);
        }
    }

    /// Flag a single new child for insertion. Reused children stay put.
    fn place_single_child(&mut self, child: NodeId) -> NodeId {
        let node = &mut self.nodes[child];
        if self.track_effects && node.alternate.is_none() {
            node.flags |= WorkFlags::PLACEMENT;
        }
        child
    }

    fn place_child(&mut self, child: NodeId, last_placed_index: usize, new_index: usize) -> usize {
        self.nodes[child].index = new_index;
        if !self.track_effects {
            return last_placed_index;
        }
        match self.nodes[child].alternate {
            Some(current) => {
                let old_index = self.nodes[current].index;
                if old_index < last_placed_index {
                    log::trace!("[reconcile] move {child:?} from {old_index} to {new_index}");
                    self.nodes[child].flags |= WorkFlags::PLACEMENT;
                    last_placed_index
                } else {
                    old_index
                }
            }
            None => {
                self.nodes[child].flags |= WorkFlags::PLACEMENT;
                last_placed_index
            }
        }
    }

    // -------------------------------------------------------------------------
    // Node construction
    // -------------------------------------------------------------------------

    /// Work-in-progress clone of `current`, detached from its old siblings.
    fn use_fiber(&mut self, parent: NodeId, current: NodeId, props: NodeProps) -> NodeId {
        let clone = create_work_in_progress(self.nodes, current, props);
        let node = &mut self.nodes[clone];
        node.index = 0;
        node.sibling = None;
        node.parent = Some(parent);
        clone
    }

    /// Reuse `current` for `element`. The element's component value replaces
    /// the old one so the latest render function runs.
    fn use_element_fiber(&mut self, parent: NodeId, current: NodeId, element: &Element) -> NodeId {
        let clone = self.use_fiber(parent, current, NodeProps::Element(element.props.clone()));
        if let ElementType::Component(component) = &element.element_type {
            self.nodes[clone].node_type = NodeType::Component(component.clone());
        }
        clone
    }

    fn create_node(&mut self, parent: NodeId, mut node: WorkNode) -> NodeId {
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        log::trace!("[reconcile] create {id:?}");
        id
    }

    fn create_child(&mut self, parent: NodeId, new_child: &Node) -> Option<NodeId> {
        match new_child {
            Node::Text(text) => Some(self.create_node(parent, WorkNode::from_text(text.clone()))),
            Node::Element(element) => Some(self.create_node(parent, WorkNode::from_element(element))),
            Node::List(_) | Node::Empty => None,
        }
    }

    fn update_text_node(&mut self, parent: NodeId, current: Option<NodeId>, text: &Rc<str>) -> NodeId {
        match current {
            Some(current) if self.nodes[current].kind == WorkKind::HostText => {
                self.use_fiber(parent, current, NodeProps::Text(text.clone()))
            }
            _ => self.create_node(parent, WorkNode::from_text(text.clone())),
        }
    }

    fn update_element(&mut self, parent: NodeId, current: Option<NodeId>, element: &Element) -> NodeId {
        match current {
            Some(current) if self.nodes[current].node_type.matches(&element.element_type) => {
                log::trace!("[reconcile] reuse {current:?} (key {:?})", element.key);
                self.use_element_fiber(parent, current, element)
            }
            _ => self.create_node(parent, WorkNode::from_element(element)),
        }
    }

    // -------------------------------------------------------------------------
    // Single child
    // -------------------------------------------------------------------------

    fn reconcile_single_element(
        &mut self,
        parent: NodeId,
        current_first_child: Option<NodeId>,
        element: &Element,
    ) -> NodeId {
        let mut child = current_first_child;
        while let Some(current) = child {
            let node = &self.nodes[current];
            if node.key == element.key {
                if node.node_type.matches(&element.element_type) {
                    let rest = node.sibling;
                    self.delete_remaining_children(parent, rest);
                    return self.use_element_fiber(parent, current, element);
                }
                self.delete_remaining_children(parent, Some(current));
                break;
            }
            child = node.sibling;
            self.delete_child(parent, current);
        }
        self.create_node(parent, WorkNode::from_element(element))
    }

    fn reconcile_single_text_node(
        &mut self,
        parent: NodeId,
        current_first_child: Option<NodeId>,
        text: &Rc<str>,
    ) -> NodeId {
        if let Some(current) = current_first_child {
            if self.nodes[current].kind == WorkKind::HostText {
                let rest = self.nodes[current].sibling;
                self.delete_remaining_children(parent, rest);
                return self.use_fiber(parent, current, NodeProps::Text(text.clone()));
            }
        }
        self.delete_remaining_children(parent, current_first_child);
        self.create_node(parent, WorkNode::from_text(text.clone()))
    }

    // -------------------------------------------------------------------------
    // Sequence
    // -------------------------------------------------------------------------

    /// Lockstep slot match. `None` means the keys do not line up.
    fn update_slot(&mut self, parent: NodeId, old: Option<NodeId>, new_child: &Node) -> Option<NodeId> {
        let old_key = old.and_then(|old| self.nodes[old].key.clone());
        match new_child {
            Node::Text(text) => {
                if old_key.is_some() {
                    return None;
                }
                Some(self.update_text_node(parent, old, text))
            }
            Node::Element(element) => {
                if element.key != old_key {
                    return None;
                }
                Some(self.update_element(parent, old, element))
            }
            Node::List(_) | Node::Empty => None,
        }
    }

    fn update_from_map(
        &mut self,
        existing: &HashMap<ChildSlot, NodeId>,
        parent: NodeId,
        new_index: usize,
        new_child: &Node,
    ) -> Option<NodeId> {
        match new_child {
            Node::Text(text) => {
                let matched = existing.get(&ChildSlot::Index(new_index)).copied();
                Some(self.update_text_node(parent, matched, text))
            }
            Node::Element(element) => {
                let slot = ChildSlot::of(element.key.as_ref(), new_index);
                let matched = existing.get(&slot).copied();
                Some(self.update_element(parent, matched, element))
            }
            Node::List(_) | Node::Empty => None,
        }
    }

    /// Map the remaining old siblings by slot. Later siblings that collide
    /// with an earlier slot are returned separately so they still get deleted.
    fn map_remaining_children(&self, first: Option<NodeId>) -> (HashMap<ChildSlot, NodeId>, Vec<NodeId>) {
        let mut existing = HashMap::new();
        let mut shadowed = Vec::new();
        let mut child = first;
        while let Some(current) = child {
            let node = &self.nodes[current];
            let slot = ChildSlot::of(node.key.as_ref(), node.index);
            if existing.contains_key(&slot) {
                shadowed.push(current);
            } else {
                existing.insert(slot, current);
            }
            child = node.sibling;
        }
        (existing, shadowed)
    }

    fn check_keys(&self, children: &[Node]) -> Result<(), ReconcileError> {
        let mut seen = HashSet::new();
        for child in children {
            let Node::Element(element) = child else { continue };
            let Some(key) = &element.key else { continue };
            if !seen.insert(key) {
                if self.check_duplicate_keys {
                    return Err(ReconcileError::DuplicateKey { key: key.clone() });
                }
                log::warn!("[reconcile] duplicate sibling key {key:?}; later siblings are treated as new");
            }
        }
        Ok(())
    }

    fn reconcile_children_array(
        &mut self,
        parent: NodeId,
        current_first_child: Option<NodeId>,
        new_children: &[Node],
    ) -> Result<Option<NodeId>, ReconcileError> {
        self.check_keys(new_children)?;

        let mut first: Option<NodeId> = None;
        let mut previous: Option<NodeId> = None;
        let mut link = |nodes: &mut SlotMap<NodeId, WorkNode>, node: NodeId| {
            match previous {
                Some(prev) => nodes[prev].sibling = Some(node),
                None => first = Some(node),
            }
            previous = Some(node);
        };

        let mut old_fiber = current_first_child;
        let mut last_placed_index = 0;
        let mut new_index = 0;

        // 1. Lockstep.
        while let Some(old) = old_fiber {
            if new_index >= new_children.len() {
                break;
            }
            // An old index past the cursor means the old list had a gap here.
            let (slot_old, next_old) = if self.nodes[old].index > new_index {
                (None, Some(old))
            } else {
                (Some(old), self.nodes[old].sibling)
            };
            let Some(new_fiber) = self.update_slot(parent, slot_old, &new_children[new_index]) else {
                break;
            };
            if let Some(old) = slot_old {
                if self.nodes[new_fiber].alternate.is_none() {
                    // Same slot, different type: the old node goes.
                    self.delete_child(parent, old);
                }
            }
            last_placed_index = self.place_child(new_fiber, last_placed_index, new_index);
            link(self.nodes, new_fiber);
            old_fiber = next_old;
            new_index += 1;
        }

        if new_index == new_children.len() {
            self.delete_remaining_children(parent, old_fiber);
            return Ok(first);
        }

        // 2. Old list exhausted.
        if old_fiber.is_none() {
            for (index, child) in new_children.iter().enumerate().skip(new_index) {
                let Some(new_fiber) = self.create_child(parent, child) else { continue };
                last_placed_index = self.place_child(new_fiber, last_placed_index, index);
                link(self.nodes, new_fiber);
            }
            return Ok(first);
        }

        // 3. Map phase.
        let (mut existing, shadowed) = self.map_remaining_children(old_fiber);
        for (index, child) in new_children.iter().enumerate().skip(new_index) {
            let Some(new_fiber) = self.update_from_map(&existing, parent, index, child) else {
                continue;
            };
            if self.track_effects && self.nodes[new_fiber].alternate.is_some() {
                let slot = match child {
                    Node::Element(element) => ChildSlot::of(element.key.as_ref(), index),
                    _ => ChildSlot::Index(index),
                };
                existing.remove(&slot);
            }
            last_placed_index = self.place_child(new_fiber, last_placed_index, index);
            link(self.nodes, new_fiber);
        }

        if self.track_effects {
            let mut leftover: Vec<NodeId> = existing.into_values().chain(shadowed).collect();
            leftover.sort_by_key(|id| self.nodes[*id].index);
            for child in leftover {
                self.delete_child(parent, child);
            }
        }

        Ok(first)
    }
}

/// Flatten nested lists. Empty entries keep their position so implicit index
/// keys stay stable when an entry is conditionally absent.
fn flatten_into(items: &[Node], out: &mut Vec<Node>) {
    for item in items {
        match item {
            Node::List(inner) => flatten_into(inner, out),
            other => out.push(other.clone()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
