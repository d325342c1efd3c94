//! Local state for function components.
//!
//! Hook identity is positional: the Nth hook call in a render owns the Nth
//! [`HookRecord`] of the previous render. Records live in an indexed list on
//! the work node, and the [`HookContext`] walks it with a cursor.
//!
//! # Dispatch tables
//!
//! - **Mount** (no previous hook list): allocate a record and an empty queue,
//!   store the initial state.
//! - **Update**: take the record at the cursor, fold every queued action into
//!   the state in enqueue order, clear the queue.
//!
//! Both return the state together with a [`Dispatch`] that buffers actions for
//! the next pass.
//!
//! # Example
//!
//! ```ignore
//! fn counter(hooks: &mut HookContext<'_>, _: &Props) -> Node {
//!     let (count, dispatch) = hooks.use_reducer(|n: &i64, delta: i64| n + delta, 0);
//!     host("text")
//!         .on("click", move |_| dispatch.dispatch(1))
//!         .child(count)
//!         .into()
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use slotmap::SlotMap;

use super::update_queue::{enqueue_update, SharedBuffer, Update, UpdateBuffer, UpdateQueue};
use crate::error::ReconcileError;
use crate::types::{NodeId, QueueId};

// =============================================================================
// Hook Record
// =============================================================================

/// One unit of component-local state.
#[derive(Clone)]
pub(crate) struct HookRecord {
    pub state: Rc<dyn Any>,
    pub queue: QueueId,
    /// `TypeId` of `(state, action)`; detects a hook that changed between renders.
    pub shape: TypeId,
}

impl fmt::Debug for HookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRecord")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookMode {
    Mount,
    Update,
}

// =============================================================================
// Dispatch
// =============================================================================

/// Sends actions to one hook's queue.
///
/// Dispatching only buffers the action and wakes the scheduler. The state
/// changes on the next render pass.
pub struct Dispatch<A> {
    target: NodeId,
    queue: QueueId,
    buffer: Weak<std::cell::RefCell<UpdateBuffer>>,
    _action: PhantomData<fn(A)>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            queue: self.queue,
            buffer: self.buffer.clone(),
            _action: PhantomData,
        }
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("target", &self.target)
            .field("queue", &self.queue)
            .finish()
    }
}

impl<A: 'static> Dispatch<A> {
    pub fn dispatch(&self, action: A) {
        let Some(buffer) = self.buffer.upgrade() else {
            log::warn!("[hooks] dispatch after the reconciler was dropped");
            return;
        };
        enqueue_update(&buffer, self.target, self.queue, Update::new(action));
    }
}

// =============================================================================
// Hook Context
// =============================================================================

/// Per-render hook cursor handed to a component's render function.
pub struct HookContext<'a> {
    component: &'static str,
    node: NodeId,
    mode: HookMode,
    previous: Vec<HookRecord>,
    hooks: Vec<HookRecord>,
    queues: &'a mut SlotMap<QueueId, UpdateQueue>,
    buffer: &'a SharedBuffer,
    check_order: bool,
    fault: Option<ReconcileError>,
}

impl<'a> HookContext<'a> {
    /// `previous` is `None` on mount.
    pub(crate) fn new(
        component: &'static str,
        node: NodeId,
        previous: Option<Vec<HookRecord>>,
        queues: &'a mut SlotMap<QueueId, UpdateQueue>,
        buffer: &'a SharedBuffer,
        check_order: bool,
    ) -> Self {
        let mode = if previous.is_some() {
            HookMode::Update
        } else {
            HookMode::Mount
        };
        Self {
            component,
            node,
            mode,
            previous: previous.unwrap_or_default(),
            hooks: Vec::new(),
            queues,
            buffer,
            check_order,
            fault: None,
        }
    }

    /// Reducer-driven state.
    ///
    /// Returns the current state and a dispatcher. Actions dispatched before a
    /// render are applied in order: two increments on `0` give `2`.
    pub fn use_reducer<S, A, R>(&mut self, reducer: R, initial: S) -> (S, Dispatch<A>)
    where
        S: Clone + 'static,
        A: 'static,
        R: Fn(&S, A) -> S,
    {
        let shape = TypeId::of::<(S, A)>();
        let (state, queue) = match self.mode {
            HookMode::Mount => self.mount_reducer(initial),
            HookMode::Update => match self.previous_record(shape) {
                Some(record) => self.update_reducer(record, reducer, initial),
                None => self.mount_reducer(initial),
            },
        };

        self.hooks.push(HookRecord {
            state: Rc::new(state.clone()),
            queue,
            shape,
        });

        let dispatch = Dispatch {
            target: self.node,
            queue,
            buffer: Rc::downgrade(self.buffer),
            _action: PhantomData,
        };
        (state, dispatch)
    }

    /// Plain state: every dispatched value replaces the previous one.
    pub fn use_state<S: Clone + 'static>(&mut self, initial: S) -> (S, Dispatch<S>) {
        self.use_reducer(|_: &S, next: S| next, initial)
    }

    fn mount_reducer<S>(&mut self, initial: S) -> (S, QueueId) {
        let queue = self.queues.insert(UpdateQueue::default());
        (initial, queue)
    }

    /// The previous record at the cursor, if it has the same shape.
    ///
    /// A missing or mismatched record is a fault when order checking is on,
    /// and a warning (followed by a fresh mount) when it is off.
    fn previous_record(&mut self, shape: TypeId) -> Option<HookRecord> {
        let position = self.hooks.len();
        let fault = match self.previous.get(position) {
            Some(record) if record.shape == shape => return Some(record.clone()),
            Some(record) => {
                if !self.check_order {
                    // Re-mounted below; the stale queue has no reader left.
                    self.queues.remove(record.queue);
                }
                ReconcileError::HookOrderMismatch {
                    component: self.component,
                    position,
                }
            }
            None => ReconcileError::HookCountMismatch {
                component: self.component,
                expected: self.previous.len(),
                found: position + 1,
            },
        };
        self.record_fault(fault);
        None
    }

    fn update_reducer<S, A, R>(&mut self, record: HookRecord, reducer: R, initial: S) -> (S, QueueId)
    where
        S: Clone + 'static,
        A: 'static,
        R: Fn(&S, A) -> S,
    {
        let mut state = match record.state.downcast_ref::<S>() {
            Some(state) => state.clone(),
            None => initial,
        };

        match self.queues.get_mut(record.queue) {
            Some(queue) => {
                for update in queue.drain() {
                    match update.downcast::<A>() {
                        Ok(action) => state = reducer(&state, action),
                        Err(_) => log::warn!(
                            "[hooks] dropped action of unexpected type in `{}`",
                            self.component
                        ),
                    }
                }
            }
            None => log::warn!("[hooks] queue of `{}` is gone", self.component),
        }

        (state, record.queue)
    }

    fn record_fault(&mut self, fault: ReconcileError) {
        if self.check_order {
            if self.fault.is_none() {
                self.fault = Some(fault);
            }
        } else {
            log::warn!("[hooks] {fault}; re-mounting the hook");
        }
    }

    /// Close the render. Fails on a recorded fault or a changed hook count.
    pub(crate) fn finish(mut self) -> Result<Vec<HookRecord>, ReconcileError> {
        if let Some(fault) = self.fault.take() {
            self.release_fresh_queues();
            return Err(fault);
        }
        if self.mode == HookMode::Update && self.hooks.len() < self.previous.len() {
            let fault = ReconcileError::HookCountMismatch {
                component: self.component,
                expected: self.previous.len(),
                found: self.hooks.len(),
            };
            if self.check_order {
                self.release_fresh_queues();
                return Err(fault);
            }
            log::warn!("[hooks] {fault}; dropping trailing hooks");
            for record in &self.previous[self.hooks.len()..] {
                self.queues.remove(record.queue);
            }
        }
        Ok(self.hooks)
    }

    /// Drop the queues mounted during a render that is being discarded.
    fn release_fresh_queues(&mut self) {
        for record in &self.hooks {
            if !self.previous.iter().any(|old| old.queue == record.queue) {
                self.queues.remove(record.queue);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
