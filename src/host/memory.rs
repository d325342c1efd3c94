//! In-memory host document.
//!
//! Host nodes live in a flat `Vec` indexed by [`HostHandle`]. Released indices
//! go back to a free pool and are reused by later creations, so a handle is
//! only meaningful while its node is live.
//!
//! Every adapter call is appended to an operation log. Tests use the log to
//! count mutations per pass:
//!
//! ```ignore
//! host.clear_ops();
//! reconciler.perform_scheduled_work()?;
//! assert!(reconciler.host().ops().is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

use super::events::{dispatch_event, is_listener_prop, EventHandler, EventTargetTree};
use super::props_diff::{PropPatch, UpdatePayload};
use super::HostConfig;
use crate::element::{PropValue, Props, Style, CHILDREN, STYLE};
use crate::types::HostHandle;

// =============================================================================
// Operation Log
// =============================================================================

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateInstance { handle: HostHandle, tag: String },
    CreateText { handle: HostHandle, text: String },
    AppendInitialChild { parent: HostHandle, child: HostHandle },
    FinalizeInitialChildren { handle: HostHandle },
    CommitUpdate { handle: HostHandle, entries: usize },
    CommitTextUpdate { handle: HostHandle, text: String },
    AppendChild { parent: HostHandle, child: HostHandle },
    InsertBefore { parent: HostHandle, child: HostHandle, before: HostHandle },
    RemoveChild { parent: HostHandle, child: HostHandle },
}

impl HostOp {
    /// True for operations that change an already attached tree.
    pub fn is_commit_mutation(&self) -> bool {
        matches!(
            self,
            Self::CommitUpdate { .. }
                | Self::CommitTextUpdate { .. }
                | Self::AppendChild { .. }
                | Self::InsertBefore { .. }
                | Self::RemoveChild { .. }
        )
    }
}

// =============================================================================
// Host Nodes
// =============================================================================

/// What a host node is.
#[derive(Debug, Clone, PartialEq)]
pub enum HostNodeKind {
    Container,
    Element(Rc<str>),
    Text(String),
}

#[derive(Debug, Clone)]
struct HostNode {
    kind: HostNodeKind,
    parent: Option<HostHandle>,
    children: Vec<HostHandle>,
    attributes: BTreeMap<String, PropValue>,
    style: Style,
    /// Direct text of an element whose `children` prop is text.
    text_content: Option<String>,
}

impl HostNode {
    fn new(kind: HostNodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            style: Style::new(),
            text_content: None,
        }
    }
}

// =============================================================================
// Memory Host
// =============================================================================

/// A host document kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<Option<HostNode>>,
    free_indices: Vec<usize>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container to mount a root into.
    pub fn create_container(&mut self) -> HostHandle {
        self.allocate(HostNode::new(HostNodeKind::Container))
    }

    // -------------------------------------------------------------------------
    // Index pool
    // -------------------------------------------------------------------------

    fn allocate(&mut self, node: HostNode) -> HostHandle {
        if let Some(index) = self.free_indices.pop() {
            self.nodes[index] = Some(node);
            HostHandle::new(index)
        } else {
            self.nodes.push(Some(node));
            HostHandle::new(self.nodes.len() - 1)
        }
    }

    /// Release a node and everything below it back to the pool.
    fn release(&mut self, handle: HostHandle) {
        let Some(node) = self.nodes.get_mut(handle.index()).and_then(Option::take) else {
            log::warn!("[memory-host] release of dead handle {handle:?}");
            return;
        };
        for child in node.children {
            self.release(child);
        }
        self.free_indices.push(handle.index());
    }

    fn node(&self, handle: HostHandle) -> Option<&HostNode> {
        self.nodes.get(handle.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, handle: HostHandle) -> Option<&mut HostNode> {
        self.nodes.get_mut(handle.index()).and_then(Option::as_mut)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Every adapter call since the last `clear_ops`.
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Drain the operation log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of live host nodes, containers included.
    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_live(&self, handle: HostHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn kind(&self, handle: HostHandle) -> Option<&HostNodeKind> {
        self.node(handle).map(|node| &node.kind)
    }

    /// Element tag, `None` for text nodes and containers.
    pub fn tag(&self, handle: HostHandle) -> Option<&str> {
        match self.kind(handle) {
            Some(HostNodeKind::Element(tag)) => Some(tag),
            _ => None,
        }
    }

    pub fn parent(&self, handle: HostHandle) -> Option<HostHandle> {
        self.node(handle).and_then(|node| node.parent)
    }

    /// Attached children in document order.
    pub fn children(&self, handle: HostHandle) -> &[HostHandle] {
        self.node(handle).map_or(&[], |node| node.children.as_slice())
    }

    pub fn attribute(&self, handle: HostHandle, name: &str) -> Option<&PropValue> {
        self.node(handle).and_then(|node| node.attributes.get(name))
    }

    pub fn style(&self, handle: HostHandle) -> Option<&Style> {
        self.node(handle).map(|node| &node.style)
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, handle: HostHandle) -> String {
        let mut out = String::new();
        self.collect_text(handle, &mut out);
        out
    }

    fn collect_text(&self, handle: HostHandle, out: &mut String) {
        let Some(node) = self.node(handle) else { return };
        match &node.kind {
            HostNodeKind::Text(text) => out.push_str(text),
            _ => {
                if let Some(text) = &node.text_content {
                    out.push_str(text);
                }
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Serialize a subtree as markup. A container serializes only its children.
    pub fn to_markup(&self, handle: HostHandle) -> String {
        let mut out = String::new();
        self.write_markup(handle, &mut out);
        out
    }

    fn write_markup(&self, handle: HostHandle, out: &mut String) {
        let Some(node) = self.node(handle) else { return };
        match &node.kind {
            HostNodeKind::Text(text) => out.push_str(text),
            HostNodeKind::Container => {
                for child in &node.children {
                    self.write_markup(*child, out);
                }
            }
            HostNodeKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &node.attributes {
                    if let Some(text) = value.as_text() {
                        let _ = write!(out, " {name}=\"{text}\"");
                    }
                }
                if !node.style.is_empty() {
                    let style: Vec<String> = node
                        .style
                        .iter()
                        .map(|(field, value)| format!("{field}:{value}"))
                        .collect();
                    let _ = write!(out, " style=\"{}\"", style.join(";"));
                }
                out.push('>');
                if let Some(text) = &node.text_content {
                    out.push_str(text);
                }
                for child in &node.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    /// Dispatch a host event at `target`. Returns the number of listeners run.
    pub fn dispatch(&self, target: HostHandle, event: &str, detail: Option<String>) -> usize {
        dispatch_event(self, target, event, detail)
    }

    /// Depth-first search for the first element carrying `name` as an attribute.
    pub fn find_by_attribute(&self, root: HostHandle, name: &str) -> Option<HostHandle> {
        let node = self.node(root)?;
        if node.attributes.contains_key(name) {
            return Some(root);
        }
        node.children
            .iter()
            .find_map(|child| self.find_by_attribute(*child, name))
    }

    // -------------------------------------------------------------------------
    // Tree edits
    // -------------------------------------------------------------------------

    fn detach(&mut self, child: HostHandle) {
        let Some(parent) = self.parent(child) else { return };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
    }

    fn attach(&mut self, parent: HostHandle, child: HostHandle, before: Option<HostHandle>) {
        self.detach(child);
        let Some(node) = self.node_mut(parent) else {
            log::warn!("[memory-host] attach to dead parent {parent:?}");
            return;
        };
        let position = before
            .and_then(|before| node.children.iter().position(|c| *c == before))
            .unwrap_or(node.children.len());
        node.children.insert(position, child);
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = Some(parent);
        }
    }

    fn remove(&mut self, parent: HostHandle, child: HostHandle) {
        if self.parent(child) != Some(parent) {
            log::warn!("[memory-host] {child:?} is not a child of {parent:?}");
        }
        self.detach(child);
        self.release(child);
    }

    fn apply_props(&mut self, handle: HostHandle, props: &Props) {
        let Some(node) = self.node_mut(handle) else { return };
        for (name, value) in props.iter() {
            match (name, value) {
                (_, PropValue::Null) => {}
                (CHILDREN, value) => node.text_content = value.as_text(),
                (STYLE, PropValue::Style(style)) => node.style = style.clone(),
                (name, value) => {
                    node.attributes.insert(name.to_string(), value.clone());
                }
            }
        }
    }

    fn apply_payload(&mut self, handle: HostHandle, payload: &UpdatePayload) {
        let Some(node) = self.node_mut(handle) else { return };
        for (name, patch) in payload.iter() {
            match patch {
                PropPatch::Remove if name == CHILDREN => node.text_content = None,
                PropPatch::Remove => {
                    node.attributes.remove(name);
                }
                PropPatch::Set(value) if name == CHILDREN => node.text_content = value.as_text(),
                PropPatch::Set(value) => {
                    node.attributes.insert(name.to_string(), value.clone());
                }
                PropPatch::Style(fields) => {
                    for (field, value) in fields {
                        if value.is_empty() {
                            node.style.remove(field);
                        } else {
                            node.style.insert(field.clone(), value.clone());
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// HostConfig
// =============================================================================

impl HostConfig for MemoryHost {
    fn create_instance(&mut self, tag: &str, _props: &Props) -> HostHandle {
        let handle = self.allocate(HostNode::new(HostNodeKind::Element(Rc::from(tag))));
        self.ops.push(HostOp::CreateInstance {
            handle,
            tag: tag.to_string(),
        });
        handle
    }

    fn create_text_instance(&mut self, text: &str) -> HostHandle {
        let handle = self.allocate(HostNode::new(HostNodeKind::Text(text.to_string())));
        self.ops.push(HostOp::CreateText {
            handle,
            text: text.to_string(),
        });
        handle
    }

    fn append_initial_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.attach(parent, child, None);
        self.ops.push(HostOp::AppendInitialChild { parent, child });
    }

    fn finalize_initial_children(&mut self, handle: HostHandle, _tag: &str, props: &Props) {
        self.apply_props(handle, props);
        self.ops.push(HostOp::FinalizeInitialChildren { handle });
    }

    fn commit_update(&mut self, handle: HostHandle, _tag: &str, payload: &UpdatePayload) {
        self.apply_payload(handle, payload);
        self.ops.push(HostOp::CommitUpdate {
            handle,
            entries: payload.len(),
        });
    }

    fn commit_text_update(&mut self, handle: HostHandle, _old_text: &str, new_text: &str) {
        if let Some(node) = self.node_mut(handle) {
            node.kind = HostNodeKind::Text(new_text.to_string());
        }
        self.ops.push(HostOp::CommitTextUpdate {
            handle,
            text: new_text.to_string(),
        });
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.attach(parent, child, None);
        self.ops.push(HostOp::AppendChild { parent, child });
    }

    fn insert_before(&mut self, parent: HostHandle, child: HostHandle, before: HostHandle) {
        self.attach(parent, child, Some(before));
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            before,
        });
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.remove(parent, child);
        self.ops.push(HostOp::RemoveChild { parent, child });
    }

    fn append_child_to_container(&mut self, container: HostHandle, child: HostHandle) {
        self.append_child(container, child);
    }

    fn insert_in_container_before(
        &mut self,
        container: HostHandle,
        child: HostHandle,
        before: HostHandle,
    ) {
        self.insert_before(container, child, before);
    }

    fn remove_child_from_container(&mut self, container: HostHandle, child: HostHandle) {
        self.remove_child(container, child);
    }
}

impl EventTargetTree for MemoryHost {
    fn parent_of(&self, handle: HostHandle) -> Option<HostHandle> {
        self.parent(handle)
    }

    fn listener(&self, handle: HostHandle, prop_name: &str) -> Option<EventHandler> {
        debug_assert!(is_listener_prop(prop_name));
        match self.attribute(handle, prop_name) {
            Some(PropValue::Handler(handler)) => Some(handler.clone()),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
