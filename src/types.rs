//! Core types for spark-reconciler.
//!
//! These are the small identity types everything else builds on: sibling keys,
//! opaque host handles, arena keys and the closed set of work-node kinds.

use std::fmt;
use std::rc::Rc;

// =============================================================================
// Arena Keys
// =============================================================================

slotmap::new_key_type! {
    /// Key of a work node in the reconciler's node arena.
    pub struct NodeId;

    /// Key of a hook update queue in the reconciler's queue arena.
    pub struct QueueId;

    /// Key of a root (one mounted container) owned by a reconciler.
    pub struct RootId;
}

// =============================================================================
// Key
// =============================================================================

/// Identity token for a description among its siblings.
///
/// Keys are compared by value and are cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    /// Create a key from anything string-like.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Rc::from(key.as_ref()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self(Rc::from(value))
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Self::new(value.to_string())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::new(value.to_string())
    }
}

// =============================================================================
// Host Handle
// =============================================================================

/// Opaque reference to a materialized host primitive (element, text or container).
///
/// Host adapters mint handles; the reconciler only stores and hands them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(usize);

impl HostHandle {
    /// Wrap an adapter-defined index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The adapter-defined index behind this handle.
    pub const fn index(self) -> usize {
        self.0
    }
}

// =============================================================================
// Work Kind
// =============================================================================

/// What a work node represents.
///
/// Dispatch in the begin and complete phases matches on this exhaustively, so
/// adding a kind is a compile-time decision in every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// A component function whose kind has been confirmed by a first render.
    FunctionComponent,
    /// A component that has not rendered yet.
    Indeterminate,
    /// The top of a mounted tree.
    HostRoot,
    /// A native element (`div`, `box`, ...).
    HostComponent,
    /// A native text leaf.
    HostText,
}

impl WorkKind {
    /// True for kinds that own a host handle.
    #[inline]
    pub const fn is_host(self) -> bool {
        matches!(self, Self::HostComponent | Self::HostText)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_by_value() {
        let a = Key::from("item");
        let b = Key::from(String::from("item"));
        assert_eq!(a, b);
        assert_ne!(a, Key::from("other"));
        assert_eq!(Key::from(3usize), Key::from("3"));
    }

    #[test]
    fn test_host_handle_roundtrip_index() {
        let handle = HostHandle::new(42);
        assert_eq!(handle.index(), 42);
    }

    #[test]
    fn test_work_kind_is_host() {
        assert!(WorkKind::HostComponent.is_host());
        assert!(WorkKind::HostText.is_host());
        assert!(!WorkKind::HostRoot.is_host());
        assert!(!WorkKind::FunctionComponent.is_host());
        assert!(!WorkKind::Indeterminate.is_host());
    }
}
