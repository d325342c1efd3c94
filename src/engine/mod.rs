//! Reconciliation engine.
//!
//! - Work nodes: double-buffered tree positions in a slotmap arena
//! - Child reconciler: keyed diff of a child list against a new description
//! - Begin / complete phases: per-kind descent and ascent
//! - Work loop: one synchronous pass, walked through parent links
//! - Commit: deletions, placements and updates applied to the host
//! - Update queue: shared append buffer drained into per-state rings
//! - Hooks: positional component state
//!
//! # Example
//!
//! ```ignore
//! let mut host = MemoryHost::new();
//! let container = host.create_container();
//! let mut reconciler = Reconciler::new(host);
//! let root = reconciler.create_container(container);
//!
//! reconciler.update_container(host("div").child("hi"), root)?;
//! reconciler.perform_scheduled_work()?;
//! ```

mod begin_work;
mod child_reconciler;
mod commit_work;
mod complete_work;
mod config;
mod flags;
mod hooks;
mod update_queue;
mod work_loop;
mod work_node;

pub use commit_work::CommitStats;
pub use config::ReconcilerConfig;
pub use flags::WorkFlags;
pub use hooks::{Dispatch, HookContext};
pub use update_queue::{Update, UpdateQueue};
pub use work_loop::Reconciler;
