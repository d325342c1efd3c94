//! Work nodes - one tree position, double buffered.
//!
//! Each position is represented by two [`WorkNode`]s linked through
//! `alternate`: the committed ("current") buffer and the work-in-progress
//! buffer. Both live in the reconciler's arena and swap roles on every
//! commit. A pair is only removed when its position is deleted.

use std::rc::Rc;

use slotmap::SlotMap;
use smallvec::SmallVec;

use super::flags::WorkFlags;
use super::hooks::HookRecord;
use crate::element::{Component, Element, ElementType, Node, Props};
use crate::host::UpdatePayload;
use crate::types::{HostHandle, Key, NodeId, QueueId, RootId, WorkKind};

// =============================================================================
// Node Fields
// =============================================================================

/// What a node instantiates.
#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    /// Root of a mounted tree; carries its own root id for parent-walk lookup.
    Root(RootId),
    Host(Rc<str>),
    Component(Component),
    Text,
}

impl NodeType {
    /// True when an element of `element_type` can reuse a node of this type.
    pub fn matches(&self, element_type: &ElementType) -> bool {
        match (self, element_type) {
            (Self::Host(tag), ElementType::Host(other)) => tag == other,
            (Self::Component(component), ElementType::Component(other)) => component == other,
            _ => false,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Host(tag) => Some(tag),
            _ => None,
        }
    }
}

/// Props a node renders with.
#[derive(Debug, Clone, Default)]
pub(crate) enum NodeProps {
    #[default]
    Empty,
    Element(Props),
    Text(Rc<str>),
}

impl NodeProps {
    pub fn element(&self) -> Option<&Props> {
        match self {
            Self::Element(props) => Some(props),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Per-kind state kept across renders.
#[derive(Debug, Clone, Default)]
pub(crate) enum MemoizedState {
    #[default]
    None,
    /// Root: the last top-level description.
    Element(Node),
    /// Function component: hook records in call order.
    Hooks(Vec<HookRecord>),
}

/// Per-kind pending work.
#[derive(Debug, Clone, Default)]
pub(crate) enum PendingWork {
    #[default]
    Empty,
    /// Root: queue of whole-tree replacement updates.
    Queue(QueueId),
    /// Host element: patch computed in the complete phase.
    Payload(UpdatePayload),
}

// =============================================================================
// Work Node
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct WorkNode {
    pub kind: WorkKind,
    pub key: Option<Key>,
    pub node_type: NodeType,
    /// Host element/text handle, or the container for a root.
    pub state_node: Option<HostHandle>,

    pub parent: Option<NodeId>,
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,
    pub index: usize,

    pub pending_props: NodeProps,
    pub memoized_props: NodeProps,
    pub memoized_state: MemoizedState,
    pub pending_work: PendingWork,

    pub flags: WorkFlags,
    pub subtree_flags: WorkFlags,
    pub alternate: Option<NodeId>,
    pub deletions: SmallVec<[NodeId; 2]>,
}

impl WorkNode {
    fn new(kind: WorkKind, node_type: NodeType, key: Option<Key>, pending_props: NodeProps) -> Self {
        Self {
            kind,
            key,
            node_type,
            state_node: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            pending_props,
            memoized_props: NodeProps::Empty,
            memoized_state: MemoizedState::None,
            pending_work: PendingWork::Empty,
            flags: WorkFlags::NONE,
            subtree_flags: WorkFlags::NONE,
            alternate: None,
            deletions: SmallVec::new(),
        }
    }

    /// The committed root node of a fresh container.
    pub fn new_root(root: RootId, container: HostHandle, queue: QueueId) -> Self {
        let mut node = Self::new(WorkKind::HostRoot, NodeType::Root(root), None, NodeProps::Empty);
        node.state_node = Some(container);
        node.pending_work = PendingWork::Queue(queue);
        node.memoized_state = MemoizedState::Element(Node::Empty);
        node
    }

    pub fn from_element(element: &Element) -> Self {
        let (kind, node_type) = match &element.element_type {
            ElementType::Host(tag) => (WorkKind::HostComponent, NodeType::Host(tag.clone())),
            ElementType::Component(component) => {
                (WorkKind::Indeterminate, NodeType::Component(component.clone()))
            }
        };
        Self::new(
            kind,
            node_type,
            element.key.clone(),
            NodeProps::Element(element.props.clone()),
        )
    }

    pub fn from_text(text: Rc<str>) -> Self {
        Self::new(WorkKind::HostText, NodeType::Text, None, NodeProps::Text(text))
    }

    /// Every queue referenced by this buffer.
    pub fn queues(&self) -> impl Iterator<Item = QueueId> + '_ {
        let hooks = match &self.memoized_state {
            MemoizedState::Hooks(hooks) => hooks.as_slice(),
            _ => &[],
        };
        let root = match self.pending_work {
            PendingWork::Queue(queue) => Some(queue),
            _ => None,
        };
        hooks.iter().map(|hook| hook.queue).chain(root)
    }
}

// =============================================================================
// Double Buffering
// =============================================================================

/// Get the work-in-progress buffer for `current`, allocating it on first use.
///
/// A reused buffer has its flags and deletions reset. Both paths copy the
/// committed child list, props, state, pending work, sibling and index.
pub(crate) fn create_work_in_progress(
    nodes: &mut SlotMap<NodeId, WorkNode>,
    current: NodeId,
    pending_props: NodeProps,
) -> NodeId {
    let existing = nodes[current].alternate.filter(|alt| nodes.contains_key(*alt));
    let wip = match existing {
        Some(wip) => {
            let node = &mut nodes[wip];
            node.pending_props = pending_props;
            node.flags = WorkFlags::NONE;
            node.subtree_flags = WorkFlags::NONE;
            node.deletions.clear();
            wip
        }
        None => {
            let source = &nodes[current];
            let mut node = WorkNode::new(
                source.kind,
                source.node_type.clone(),
                source.key.clone(),
                pending_props,
            );
            node.state_node = source.state_node;
            node.alternate = Some(current);
            let wip = nodes.insert(node);
            nodes[current].alternate = Some(wip);
            wip
        }
    };

    let source = &nodes[current];
    let (kind, child, sibling, index) = (source.kind, source.child, source.sibling, source.index);
    let memoized_props = source.memoized_props.clone();
    let memoized_state = source.memoized_state.clone();
    let pending_work = source.pending_work.clone();

    let node = &mut nodes[wip];
    node.kind = kind;
    node.child = child;
    node.sibling = sibling;
    node.index = index;
    node.memoized_props = memoized_props;
    node.memoized_state = memoized_state;
    node.pending_work = pending_work;
    wip
}

// =============================================================================
// Tests
// =============================================================================
