//! Error type for render passes.
//!
//! The reconciler assumes well-formed description trees. The variants here
//! cover the caller contracts it can still check cheaply: hook call order,
//! sibling key uniqueness and updates aimed at detached nodes.

use thiserror::Error;

use crate::types::Key;

/// A render pass failed before it could be committed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The hook at `position` was called with a different state/action shape
    /// than in the previous render of the same component.
    #[error("hook #{position} in `{component}` changed shape between renders")]
    HookOrderMismatch {
        component: &'static str,
        position: usize,
    },

    /// A component called a different number of hooks than in its previous render.
    #[error("`{component}` rendered {found} hooks, previous render had {expected}")]
    HookCountMismatch {
        component: &'static str,
        expected: usize,
        found: usize,
    },

    /// Two siblings in one child sequence share a key.
    #[error("duplicate sibling key {key:?}")]
    DuplicateKey { key: Key },

    /// A buffered update targets a node that is no longer attached to a root.
    #[error("state update targets a node that is no longer mounted")]
    DetachedUpdateTarget,

    /// A root handle that this reconciler does not own.
    #[error("unknown root handle")]
    UnknownRoot,
}
