//! Host-side event dispatch with capture and bubble phases.
//!
//! Listeners are ordinary props on host elements: `onClick` listens in the
//! bubble phase, `onClickCapture` in the capture phase. Dispatch collects the
//! listeners on the path from the target up to the outermost host ancestor,
//! then runs capture listeners outermost-first and bubble listeners
//! innermost-first.
//!
//! Handlers receive a [`HostEvent`] and may stop propagation. They cannot run
//! a render pass; state dispatchers called from a handler only buffer updates.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::types::HostHandle;

// =============================================================================
// Handler & Event
// =============================================================================

/// A listener stored in a prop. Compared by identity.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&HostEvent)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&HostEvent) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &HostEvent) {
        (self.0)(event)
    }

    /// Same closure allocation.
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

/// The event object passed to listeners.
#[derive(Debug)]
pub struct HostEvent {
    name: String,
    target: HostHandle,
    current_target: Cell<HostHandle>,
    detail: Option<String>,
    propagation_stopped: Cell<bool>,
}

impl HostEvent {
    pub fn new(name: impl Into<String>, target: HostHandle, detail: Option<String>) -> Self {
        Self {
            name: name.into(),
            target,
            current_target: Cell::new(target),
            detail,
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> HostHandle {
        self.target
    }

    /// The node whose listener is currently running.
    pub fn current_target(&self) -> HostHandle {
        self.current_target.get()
    }

    /// Free-form payload (the key name for `keydown`).
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

/// Prop name for a listener: `("click", false)` -> `onClick`,
/// `("click", true)` -> `onClickCapture`.
pub fn listener_prop_name(event: &str, capture: bool) -> String {
    let mut name = String::with_capacity(event.len() + 9);
    name.push_str("on");
    let mut chars = event.chars();
    if let Some(first) = chars.next() {
        name.extend(first.to_uppercase());
        name.push_str(chars.as_str());
    }
    if capture {
        name.push_str("Capture");
    }
    name
}

/// True if a prop name looks like a listener (`onX...`).
pub fn is_listener_prop(name: &str) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..].chars().next().is_some_and(char::is_uppercase)
}

// =============================================================================
// Dispatch
// =============================================================================

/// What dispatch needs from a host document.
pub trait EventTargetTree {
    /// Host parent of `handle`, `None` at the container.
    fn parent_of(&self, handle: HostHandle) -> Option<HostHandle>;

    /// The listener stored under `prop_name` on `handle`.
    fn listener(&self, handle: HostHandle, prop_name: &str) -> Option<EventHandler>;
}

struct DispatchListener {
    current_target: HostHandle,
    handler: EventHandler,
}

/// Collect one phase's listeners, target first.
fn accumulate_single_phase_listeners(
    tree: &impl EventTargetTree,
    target: HostHandle,
    prop_name: &str,
) -> Vec<DispatchListener> {
    let mut listeners = Vec::new();
    let mut node = Some(target);
    while let Some(handle) = node {
        if let Some(handler) = tree.listener(handle, prop_name) {
            listeners.push(DispatchListener {
                current_target: handle,
                handler,
            });
        }
        node = tree.parent_of(handle);
    }
    listeners
}

/// Dispatch `name` at `target`. Returns the number of listeners that ran.
pub fn dispatch_event(
    tree: &impl EventTargetTree,
    target: HostHandle,
    name: &str,
    detail: Option<String>,
) -> usize {
    let event = HostEvent::new(name, target, detail);
    let capture = accumulate_single_phase_listeners(tree, target, &listener_prop_name(name, true));
    let bubble = accumulate_single_phase_listeners(tree, target, &listener_prop_name(name, false));

    let mut invoked = 0;
    for listener in capture.iter().rev().chain(bubble.iter()) {
        if event.is_propagation_stopped() {
            break;
        }
        event.current_target.set(listener.current_target);
        listener.handler.call(&event);
        invoked += 1;
    }

    log::trace!("[events] dispatched {name} at {target:?}: {invoked} listener(s)");
    invoked
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Linear chain 0 <- 1 <- 2 (2 is the innermost).
    #[derive(Default)]
    struct Chain {
        listeners: HashMap<(usize, String), EventHandler>,
    }

    impl EventTargetTree for Chain {
        fn parent_of(&self, handle: HostHandle) -> Option<HostHandle> {
            handle.index().checked_sub(1).map(HostHandle::new)
        }

        fn listener(&self, handle: HostHandle, prop_name: &str) -> Option<EventHandler> {
            self.listeners
                .get(&(handle.index(), prop_name.to_string()))
                .cloned()
        }
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> EventHandler {
        let log = log.clone();
        EventHandler::new(move |_| log.borrow_mut().push(label.to_string()))
    }

    #[test]
    fn test_listener_prop_names() {
        assert_eq!(listener_prop_name("click", false), "onClick");
        assert_eq!(listener_prop_name("click", true), "onClickCapture");
        assert!(is_listener_prop("onClick"));
        assert!(!is_listener_prop("one"));
        assert!(!is_listener_prop("on"));
    }

    #[test]
    fn test_capture_then_bubble_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut tree = Chain::default();
        tree.listeners.insert((0, "onClickCapture".into()), recorder(&log, "outer-capture"));
        tree.listeners.insert((2, "onClickCapture".into()), recorder(&log, "inner-capture"));
        tree.listeners.insert((0, "onClick".into()), recorder(&log, "outer-bubble"));
        tree.listeners.insert((2, "onClick".into()), recorder(&log, "inner-bubble"));

        let invoked = dispatch_event(&tree, HostHandle::new(2), "click", None);

        assert_eq!(invoked, 4);
        assert_eq!(
            *log.borrow(),
            vec!["outer-capture", "inner-capture", "inner-bubble", "outer-bubble"]
        );
    }

    #[test]
    fn test_stop_propagation_halts_dispatch() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut tree = Chain::default();
        let log_inner = log.clone();
        tree.listeners.insert(
            (2, "onClick".into()),
            EventHandler::new(move |event| {
                log_inner.borrow_mut().push("inner".to_string());
                event.stop_propagation();
            }),
        );
        tree.listeners.insert((1, "onClick".into()), recorder(&log, "middle"));

        dispatch_event(&tree, HostHandle::new(2), "click", None);
        assert_eq!(*log.borrow(), vec!["inner"]);
    }

    #[test]
    fn test_current_target_tracks_listener_owner() {
        let seen = Rc::new(Cell::new(None));
        let seen_clone = seen.clone();
        let mut tree = Chain::default();
        tree.listeners.insert(
            (1, "onKeydown".into()),
            EventHandler::new(move |event| {
                seen_clone.set(Some((event.target(), event.current_target())));
            }),
        );

        dispatch_event(&tree, HostHandle::new(2), "keydown", Some("a".into()));
        assert_eq!(seen.get(), Some((HostHandle::new(2), HostHandle::new(1))));
    }
}
