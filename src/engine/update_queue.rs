//! Update queues and the shared append buffer that feeds them.
//!
//! Two layers:
//!
//! - [`UpdateBuffer`] - one flat, append-only list of `(target, queue, update)`
//!   entries per reconciler. Dispatchers append here from anywhere (event
//!   handlers included) and never touch a queue directly.
//! - [`UpdateQueue`] - a per-state ring of pending updates. The buffer is
//!   drained into the rings once at the start of every render pass.
//!
//! Appending and draining never interleave: a dispatch during a pass only
//! buffers, and the next pass picks it up. Within one queue, updates are
//! applied in enqueue order.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::types::{NodeId, QueueId};

// =============================================================================
// Update
// =============================================================================

/// One pending state change. The payload is a hook action or, for a root
/// queue, the next top-level description.
pub struct Update {
    payload: Box<dyn Any>,
}

impl Update {
    pub fn new<T: Any>(payload: T) -> Self {
        Self {
            payload: Box::new(payload),
        }
    }

    /// Take the payload back out, or return the update if the type is wrong.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        self.payload
            .downcast::<T>()
            .map(|payload| *payload)
            .map_err(|payload| Self { payload })
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Update")
    }
}

// =============================================================================
// Update Queue
// =============================================================================

/// Pending updates for one piece of state, oldest first.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    pending: VecDeque<Update>,
}

impl UpdateQueue {
    /// Splice an update in at the tail.
    pub fn enqueue(&mut self, update: Update) {
        self.pending.push_back(update);
    }

    /// Remove and yield every pending update in enqueue order.
    pub fn drain(&mut self) -> impl Iterator<Item = Update> + '_ {
        self.pending.drain(..)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// =============================================================================
// Update Buffer
// =============================================================================

/// A buffered update waiting for the next drain.
#[derive(Debug)]
pub(crate) struct BufferedUpdate {
    pub target: NodeId,
    pub queue: QueueId,
    pub update: Update,
}

/// Append-only buffer shared between a reconciler and its dispatchers.
#[derive(Default)]
pub(crate) struct UpdateBuffer {
    entries: Vec<BufferedUpdate>,
    schedule_callback: Option<Rc<dyn Fn()>>,
}

pub(crate) type SharedBuffer = Rc<RefCell<UpdateBuffer>>;

impl UpdateBuffer {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hand over every buffered entry and reset the buffer to length zero.
    pub fn take(&mut self) -> Vec<BufferedUpdate> {
        std::mem::take(&mut self.entries)
    }

    pub fn set_schedule_callback(&mut self, callback: Option<Rc<dyn Fn()>>) {
        self.schedule_callback = callback;
    }
}

/// Append an update and wake the scheduler, if one is listening.
///
/// The callback runs after the buffer borrow is released so it may inspect
/// the reconciler's scheduling state.
pub(crate) fn enqueue_update(buffer: &SharedBuffer, target: NodeId, queue: QueueId, update: Update) {
    let callback = {
        let mut buffer = buffer.borrow_mut();
        buffer.entries.push(BufferedUpdate {
            target,
            queue,
            update,
        });
        buffer.schedule_callback.clone()
    };
    if let Some(callback) = callback {
        callback();
    }
}

// =============================================================================
// Tests
// =============================================================================
