//! Host adapters - where the reconciler's decisions become real nodes.
//!
//! The engine never touches native primitives directly. It calls a
//! [`HostConfig`] implementation for:
//!
//! - Instance creation (`create_instance`, `create_text_instance`)
//! - First-mount assembly (`append_initial_child`, `finalize_initial_children`)
//! - Update preparation (`prepare_update`, `should_set_text_content`)
//! - Commit mutations (`commit_update`, `commit_text_update`, and the
//!   append/insert/remove operations for elements and containers)
//!
//! Two adapters ship with the crate:
//!
//! - [`memory::MemoryHost`] - an in-memory document with an operation log
//! - [`terminal::TerminalHost`] - the memory document laid out and painted to a terminal

pub mod events;
pub mod memory;
pub mod props_diff;
pub mod terminal;

pub use events::{dispatch_event, EventHandler, EventTargetTree, HostEvent};
pub use memory::{HostOp, MemoryHost};
pub use props_diff::{diff_properties, PropPatch, UpdatePayload};
pub use terminal::{Frame, TerminalHost, TerminalSize};

use crate::element::{PropValue, Props, CHILDREN};
use crate::types::HostHandle;

// =============================================================================
// Host Config
// =============================================================================

/// Capability set a native host supplies to the reconciler.
///
/// All operations are infallible from the engine's point of view. Handles are
/// minted by the host and treated as opaque.
pub trait HostConfig {
    /// Create an element with no children attached.
    fn create_instance(&mut self, tag: &str, props: &Props) -> HostHandle;

    /// Create a text leaf.
    fn create_text_instance(&mut self, text: &str) -> HostHandle;

    /// Attach a child in document order while a parent is first being built.
    fn append_initial_child(&mut self, parent: HostHandle, child: HostHandle);

    /// Apply the full initial property set once, after the initial children.
    fn finalize_initial_children(&mut self, handle: HostHandle, tag: &str, props: &Props);

    /// Compute the patch between two prop sets. `None` means nothing to do.
    fn prepare_update(
        &self,
        _handle: HostHandle,
        _tag: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<UpdatePayload> {
        diff_properties(old_props, new_props)
    }

    /// True when the element renders its `children` prop as direct text
    /// instead of child nodes.
    fn should_set_text_content(&self, _tag: &str, props: &Props) -> bool {
        props.get(CHILDREN).is_some_and(PropValue::is_textual_children)
    }

    /// Apply a non-empty patch during commit.
    fn commit_update(&mut self, handle: HostHandle, tag: &str, payload: &UpdatePayload);

    /// Replace the content of an existing text leaf.
    fn commit_text_update(&mut self, handle: HostHandle, old_text: &str, new_text: &str);

    fn append_child(&mut self, parent: HostHandle, child: HostHandle);

    fn insert_before(&mut self, parent: HostHandle, child: HostHandle, before: HostHandle);

    /// Detach `child` from `parent`. The host may release the whole subtree.
    fn remove_child(&mut self, parent: HostHandle, child: HostHandle);

    fn append_child_to_container(&mut self, container: HostHandle, child: HostHandle);

    fn insert_in_container_before(
        &mut self,
        container: HostHandle,
        child: HostHandle,
        before: HostHandle,
    );

    fn remove_child_from_container(&mut self, container: HostHandle, child: HostHandle);
}
