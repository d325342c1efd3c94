//! # spark-reconciler
//!
//! Incremental tree reconciler for declarative UIs.
//!
//! Callers describe what the UI should look like as a tree of [`Node`]s. The
//! reconciler diffs each new description against the tree it committed last,
//! keeps local component state across renders, and applies the minimal set of
//! creations, moves, property updates and deletions to a host through the
//! [`HostConfig`] adapter.
//!
//! ## Architecture
//!
//! ```text
//! update_container / Dispatch -> update buffer -> perform_scheduled_work
//!     -> begin / complete (work-in-progress tree) -> commit (host mutations)
//! ```
//!
//! Every position in the tree is backed by two work nodes: the committed one
//! and a work-in-progress copy, swapped when a pass commits.
//!
//! ## Modules
//!
//! - [`types`] - Keys, host handles, arena ids, work-node kinds
//! - [`element`] - Description trees: `Node`, `Element`, `Component`, `Props`
//! - [`engine`] - Reconciler, child diff, hooks, update queues, commit
//! - [`host`] - Host adapter trait, property diff, memory and terminal hosts
//! - [`pipeline`] - Terminal mount loop
//! - [`error`] - `ReconcileError`

pub mod element;
pub mod engine;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use element::{
    component, host, Component, Element, ElementBuilder, ElementType, Node, PropValue, Props,
    Style, CHILDREN, STYLE,
};

pub use engine::{
    CommitStats, Dispatch, HookContext, Reconciler, ReconcilerConfig, Update, UpdateQueue,
    WorkFlags,
};

pub use error::ReconcileError;

pub use host::{
    diff_properties, dispatch_event, EventHandler, EventTargetTree, HostConfig, HostEvent,
    HostOp, MemoryHost, PropPatch, TerminalHost, UpdatePayload,
};

pub use pipeline::{mount, run, tick, unmount, MountConfig, MountHandle, RenderMode};
